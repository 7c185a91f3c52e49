// Storage layer: connection pooling, row models, repository traits with
// SQLite implementations, and an in-memory test double.

pub mod database;
pub mod memory;
pub mod models;
pub mod repository;

pub use database::{DatabaseConfig, DatabasePool, DatabaseType, PoolStats, SqlitePool};

#[cfg(feature = "postgres")]
pub use database::PostgresPool;

pub use memory::InMemoryRepository;

pub use repository::{
    BudgetRepository, BusinessRepository, OperationRepository, PhotoRepository,
    RawBusinessRepository, SqliteBudgetRepository, SqliteBusinessRepository,
    SqliteJobQueue, SqliteOperationRepository, SqlitePhotoRepository, SqliteRawBusinessRepository,
    SqliteStandardizedRepository, StandardizedRepository,
};
