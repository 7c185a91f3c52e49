// Retry/backoff policy, adapted from the dead-letter queue's backoff
// strategy but simplified to the single exponential strategy the
// specification calls for (base 2s, default 3 attempts), with jitter.

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
            multiplier: 2.0,
            max_delay_secs: 300,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the given (zero-indexed) retry attempt, with up to
    /// ±20% jitter to avoid every failed job in a batch retrying in lockstep.
    pub fn delay_secs(&self, attempt: u32) -> u64 {
        let raw = (self.base_delay_secs as f64) * self.multiplier.powi(attempt as i32);
        let mut delay = raw.min(self.max_delay_secs as f64) as u64;

        if self.jitter {
            let jitter_range = (delay as f64 * 0.2) as i64;
            if jitter_range > 0 {
                let offset = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
                delay = (delay as i64 + offset).max(0) as u64;
            }
        }

        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_spec_constants() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_secs, 2);
    }

    #[test]
    fn stops_retrying_after_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn delay_grows_exponentially_and_respects_cap() {
        let policy = RetryPolicy { jitter: false, ..RetryPolicy::default() };
        assert_eq!(policy.delay_secs(0), 2);
        assert_eq!(policy.delay_secs(1), 4);
        assert_eq!(policy.delay_secs(2), 8);
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            let base = RetryPolicy { jitter: false, ..policy }.delay_secs(attempt) as f64;
            let jittered = policy.delay_secs(attempt) as f64;
            assert!((jittered - base).abs() <= base * 0.2 + 1.0);
        }
    }
}
