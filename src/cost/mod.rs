//! Cost controller: a token bucket plus a monthly budget ledger guarding
//! every object-store operation. Every stage that touches the object store
//! must route the call through `CostController::check_and_execute` rather
//! than calling the store directly.

use std::sync::Arc;

use chrono::TimeZone;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::budget::{Budget, TokenBucketState};
use crate::domain::error::IngestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectStoreOp {
    Put,
    Get,
    Delete,
    List,
}

impl ObjectStoreOp {
    /// Byte-proportional cost estimate in USD, used only to advance the
    /// budget ledger; real billing reconciliation happens out of band.
    /// `PUT = base + bytes * transfer`, `GET = base + bytes * transfer`,
    /// `DELETE = 0`, `LIST = base` (it never moves object bytes).
    pub fn estimated_cost_usd(&self, estimated_bytes: u64) -> Decimal {
        let base_request = Decimal::new(5, 6); // $0.000005
        let base_get = Decimal::new(4, 7); // $0.0000004
        let transfer_per_byte = Decimal::new(2, 8); // $0.00000002/byte
        let bytes = Decimal::from(estimated_bytes);
        match self {
            ObjectStoreOp::Put => base_request + bytes * transfer_per_byte,
            ObjectStoreOp::Get => base_get + bytes * transfer_per_byte,
            ObjectStoreOp::Delete => Decimal::ZERO,
            ObjectStoreOp::List => base_request,
        }
    }

    /// Token-bucket cost, distinct from the dollar estimate: `List` is
    /// heavier on request-rate limits than on spend.
    pub fn token_cost(&self) -> f64 {
        match self {
            ObjectStoreOp::Put => 5.0,
            ObjectStoreOp::Get => 1.0,
            ObjectStoreOp::Delete => 1.0,
            ObjectStoreOp::List => 10.0,
        }
    }
}

struct Inner {
    bucket: TokenBucketState,
    budget: Budget,
    last_refill: std::time::Instant,
}

/// Shared, clonable handle. Internally a single `tokio::sync::Mutex` guards
/// both the token bucket and the budget ledger so a `check_and_execute` call
/// is atomic across the two gates, the way the specification's
/// `checkAndExecute` is meant to read.
#[derive(Clone)]
pub struct CostController {
    inner: Arc<Mutex<Inner>>,
}

pub struct CostReport {
    pub period: String,
    pub spent_usd: Decimal,
    pub monthly_limit_usd: Decimal,
    pub utilization: f32,
    pub emergency_mode: bool,
    pub tokens_available: f64,
}

impl CostController {
    pub fn new(budget: Budget, bucket_capacity: f64, refill_per_min: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                bucket: TokenBucketState::new(bucket_capacity, refill_per_min),
                budget,
                last_refill: std::time::Instant::now(),
            })),
        }
    }

    /// Atomically checks the token bucket and the monthly budget, then runs
    /// `op_fn` if both allow it. On success the estimated cost is recorded
    /// against the ledger before the future resolves, not after, so a
    /// caller that never awaits the result still can't starve the budget.
    pub async fn check_and_execute<F, Fut, T>(
        &self,
        op: ObjectStoreOp,
        estimated_bytes: u64,
        op_fn: F,
    ) -> Result<T, IngestError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, IngestError>>,
    {
        {
            let mut guard = self.inner.lock().await;
            let elapsed = guard.last_refill.elapsed().as_secs_f64();
            guard.bucket.refill(elapsed);
            guard.last_refill = std::time::Instant::now();

            if guard.budget.emergency_mode || guard.budget.is_over_emergency_threshold() {
                warn!(period = %guard.budget.period, "object store call denied: emergency budget mode");
                return Err(IngestError::BudgetExceeded {
                    retry_after_secs: seconds_until_next_month(),
                });
            }

            if !guard.bucket.try_take(op.token_cost()) {
                let deficit = op.token_cost() - guard.bucket.tokens;
                let retry_after = (deficit / guard.bucket.refill_per_sec).ceil().max(1.0) as u64;
                return Err(IngestError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }

            guard.budget.record_spend(op.estimated_cost_usd(estimated_bytes));
            if guard.budget.is_alerting() {
                warn!(
                    period = %guard.budget.period,
                    utilization = guard.budget.utilization(),
                    "object store spend crossed the alert threshold"
                );
            }
        }

        op_fn().await
    }

    pub async fn report(&self) -> CostReport {
        let guard = self.inner.lock().await;
        CostReport {
            period: guard.budget.period.clone(),
            spent_usd: guard.budget.spent_usd,
            monthly_limit_usd: guard.budget.monthly_limit_usd,
            utilization: guard.budget.utilization(),
            emergency_mode: guard.budget.emergency_mode,
            tokens_available: guard.bucket.tokens,
        }
    }

    /// Resets the ledger at the start of a new billing period, carrying the
    /// configured limit and thresholds forward.
    pub async fn roll_period(&self, new_period: impl Into<String>) {
        let mut guard = self.inner.lock().await;
        let limit = guard.budget.monthly_limit_usd;
        let alert = guard.budget.alert_threshold;
        let emergency = guard.budget.emergency_threshold;
        let mut budget = Budget::new(new_period, limit);
        budget.alert_threshold = alert;
        budget.emergency_threshold = emergency;
        guard.budget = budget;
    }
}

fn seconds_until_next_month() -> u64 {
    use chrono::{Datelike, Utc};
    let now = Utc::now();
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let next = chrono::Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (next - now).num_seconds().max(0) as u64
}
