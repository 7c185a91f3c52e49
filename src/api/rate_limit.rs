//! Per-IP sliding-window rate limiter. Grounded on a sibling repo's
//! `middleware::rate_limit` shape (two counters plus a window start each),
//! but keyed off this crate's `RateLimitConfig { per_hour, per_day }` and
//! backed by `std::sync::Mutex` since this workspace doesn't carry
//! `parking_lot`.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::config::RateLimitConfig;

use super::errors::ApiError;

struct Window {
    count: u32,
    started_at: Instant,
}

struct Entry {
    hour: Window,
    day: Window,
}

impl Entry {
    fn new(now: Instant) -> Self {
        Self { hour: Window { count: 0, started_at: now }, day: Window { count: 0, started_at: now } }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, Entry>>>,
}

enum Verdict {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration, limit: u32 },
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, state: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn check(&self, ip: IpAddr) -> Verdict {
        const HOUR: Duration = Duration::from_secs(3600);
        const DAY: Duration = Duration::from_secs(86_400);

        let now = Instant::now();
        let mut guard = self.state.lock().unwrap();
        let entry = guard.entry(ip).or_insert_with(|| Entry::new(now));

        if now.duration_since(entry.hour.started_at) >= HOUR {
            entry.hour = Window { count: 0, started_at: now };
        }
        if now.duration_since(entry.day.started_at) >= DAY {
            entry.day = Window { count: 0, started_at: now };
        }

        entry.hour.count += 1;
        entry.day.count += 1;

        if entry.day.count > self.config.per_day {
            let retry_after = (entry.day.started_at + DAY).saturating_duration_since(now);
            return Verdict::Exceeded { retry_after, limit: self.config.per_day };
        }
        if entry.hour.count > self.config.per_hour {
            let retry_after = (entry.hour.started_at + HOUR).saturating_duration_since(now);
            return Verdict::Exceeded { retry_after, limit: self.config.per_hour };
        }

        Verdict::Allowed { remaining: self.config.per_hour.saturating_sub(entry.hour.count) }
    }

    /// Drops entries that have been idle for two full days, so the map
    /// doesn't grow without bound under a long-running process.
    pub fn evict_stale(&self) {
        let now = Instant::now();
        self.state.lock().unwrap().retain(|_, entry| now.duration_since(entry.day.started_at) < Duration::from_secs(172_800));
    }
}

pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.check(addr.ip()) {
        Verdict::Allowed { .. } => next.run(request).await,
        Verdict::Exceeded { retry_after, limit } => {
            warn!(ip = %addr.ip(), "rate limit exceeded");
            ApiError::RateLimited { retry_after_secs: retry_after.as_secs().max(1), limit, remaining: 0 }
                .into_response()
        }
    }
}
