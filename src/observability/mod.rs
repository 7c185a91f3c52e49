//! Structured logging/tracing setup and the shared shutdown flag the
//! `/health` endpoint reads (see `api::routes::health`).

pub mod logging;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flipped once graceful shutdown begins; `/health` reports 503 from then
/// on so orchestrators stop routing new traffic during the drain window.
#[derive(Clone, Default)]
pub struct ShutdownState(Arc<AtomicBool>);

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
