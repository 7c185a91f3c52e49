//! Ingestion-control HTTP API: the one surface this crate promises to keep
//! stable, per the system's external-interfaces contract. Grounded on the
//! teacher's `ingestion::webhook` module for router/state/error shape.

pub mod errors;
pub mod models;
pub mod rate_limit;
pub mod routes;

pub use errors::ApiError;
pub use rate_limit::RateLimiter;
pub use routes::{create_routes, AppState};
