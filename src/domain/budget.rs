use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The monthly object-store spend ledger guarded by the cost controller.
/// Thresholds mirror the teacher's `BudgetConfig` (`warning_threshold` /
/// `critical_threshold`) under the names the specification uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// `YYYY-MM`, the ledger period this row covers.
    pub period: String,

    pub monthly_limit_usd: Decimal,
    #[serde(default)]
    pub spent_usd: Decimal,

    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f32,
    #[serde(default = "default_emergency_threshold")]
    pub emergency_threshold: f32,

    #[serde(default)]
    pub emergency_mode: bool,

    pub updated_at: DateTime<Utc>,
}

fn default_alert_threshold() -> f32 {
    0.80
}

fn default_emergency_threshold() -> f32 {
    0.95
}

impl Budget {
    pub fn new(period: impl Into<String>, monthly_limit_usd: Decimal) -> Self {
        Self {
            period: period.into(),
            monthly_limit_usd,
            spent_usd: Decimal::ZERO,
            alert_threshold: default_alert_threshold(),
            emergency_threshold: default_emergency_threshold(),
            emergency_mode: false,
            updated_at: Utc::now(),
        }
    }

    pub fn utilization(&self) -> f32 {
        if self.monthly_limit_usd.is_zero() {
            return 1.0;
        }
        (self.spent_usd / self.monthly_limit_usd)
            .to_string()
            .parse()
            .unwrap_or(1.0)
    }

    pub fn is_alerting(&self) -> bool {
        self.utilization() >= self.alert_threshold
    }

    pub fn is_over_emergency_threshold(&self) -> bool {
        self.utilization() >= self.emergency_threshold
    }

    pub fn record_spend(&mut self, amount_usd: Decimal) {
        self.spent_usd += amount_usd;
        self.updated_at = Utc::now();
        if self.is_over_emergency_threshold() {
            self.emergency_mode = true;
        }
    }

    pub fn remaining_usd(&self) -> Decimal {
        (self.monthly_limit_usd - self.spent_usd).max(Decimal::ZERO)
    }
}

/// In-memory token bucket state, persisted alongside the budget so a
/// process restart does not grant a fresh burst of capacity.
#[derive(Debug, Clone, Copy)]
pub struct TokenBucketState {
    pub tokens: f64,
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl TokenBucketState {
    pub fn new(capacity: f64, refill_per_min: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: refill_per_min / 60.0,
        }
    }

    pub fn refill(&mut self, elapsed_secs: f64) {
        self.tokens = (self.tokens + elapsed_secs * self.refill_per_sec).min(self.capacity);
    }

    pub fn try_take(&mut self, cost: f64) -> bool {
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }
}
