//! venue-ingest - event-driven ingestion pipeline for multi-source business
//! listings (bars, restaurants).
//!
//! Raw Collection, Standardization, Deduplication, and Photo Materialization
//! run as four coordinated stages connected by an in-process event bus, with
//! a cost controller gating every object-store operation. See `SPEC_FULL.md`
//! for the full component design.

pub mod api;
pub mod collector;
pub mod config;
pub mod cost;
pub mod deals;
pub mod dedup;
pub mod domain;
pub mod events;
pub mod matching;
pub mod metrics;
pub mod objectstore;
pub mod observability;
pub mod photos;
pub mod queue;
pub mod standardize;
pub mod storage;

pub use domain::{
    Address, Budget, Business, CollectionJobKind, Deal, GeoPoint, IngestError, OpenHours,
    Operation, OperationStage, OperationStatus, Photo, PhotoStatus, PhotoVariant, RawBusiness,
    Result, Source, SourceBinding, StandardizedBusiness, TokenBucketState,
};

pub use config::Config;

pub use cost::{CostController, CostReport, ObjectStoreOp};

pub use storage::{
    BudgetRepository, BusinessRepository, DatabasePool, InMemoryRepository, OperationRepository,
    PhotoRepository, RawBusinessRepository, SqliteJobQueue, StandardizedRepository,
};

pub use objectstore::{LocalObjectStore, ObjectStore};
#[cfg(feature = "s3")]
pub use objectstore::S3ObjectStore;

pub use events::{Event, EventBus, EventTag};

pub use queue::{InMemoryJobQueue, Job, JobQueue, JobStatus, QueueStats, RetryPolicy};

pub use collector::{CollectorClient, RawCollector};

pub use standardize::{extract_for_source, Standardizer};

pub use dedup::{Deduplicator, MergeOutcome};

pub use photos::PhotoProcessor;

pub use observability::ShutdownState;

pub use api::{create_routes, AppState, RateLimiter};

/// Library version, read from the crate's own manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes process-wide tracing and metrics from a loaded `Config`.
/// Safe to call once at the top of the composition root; a second call
/// is a no-op error the caller can ignore.
pub fn init(config: &Config) -> Result<()> {
    let _ = observability::logging::init_tracing(&config.logging);
    Ok(())
}
