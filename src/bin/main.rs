// Composition root: loads configuration, wires Raw Collection,
// Standardization, Deduplication, and Photo Materialization to the event
// bus, starts the job worker pool, and serves the ingestion-control API
// until a shutdown signal arrives.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use venue_ingest::api::{create_routes, AppState, RateLimiter};
use venue_ingest::collector::google::GooglePlacesClient;
use venue_ingest::collector::yelp::YelpClient;
use venue_ingest::collector::{CollectorClient, RawCollector};
use venue_ingest::config::Config;
use venue_ingest::cost::CostController;
use venue_ingest::dedup::Deduplicator;
use venue_ingest::domain::{Budget, Operation, OperationStage, Source};
use venue_ingest::events::{EventBus, EventTag};
use venue_ingest::observability::ShutdownState;
use venue_ingest::photos::PhotoProcessor;
use venue_ingest::queue::{self, RetryPolicy};
use venue_ingest::standardize::Standardizer;
use venue_ingest::storage::{
    self, BudgetRepository, OperationRepository, RawBusinessRepository, StandardizedRepository,
};

#[cfg(feature = "s3")]
use venue_ingest::objectstore::S3ObjectStore;
#[cfg(not(feature = "s3"))]
use venue_ingest::objectstore::LocalObjectStore;

#[cfg(feature = "s3")]
type ObjectStoreImpl = S3ObjectStore;
#[cfg(not(feature = "s3"))]
type ObjectStoreImpl = LocalObjectStore;

/// Concurrency cap and per-second rate cap for the job worker pool. Not
/// exposed as config: these bound how hard this process hammers its own
/// CPU/network, not a business-level policy like the budget or rate limit.
const WORKER_CONCURRENCY: usize = 4;
const WORKER_MAX_JOBS_PER_SEC: u32 = 5;
const SHUTDOWN_DRAIN_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "venue-ingest")]
#[command(about = "Event-driven ingestion pipeline for multi-source business listings", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to ./config.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion-control API and job workers (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;

    venue_ingest::init(&config).context("failed to initialize tracing")?;
    info!(version = venue_ingest::VERSION, "starting venue-ingest");

    if let Err(e) = venue_ingest::metrics::init_metrics(&config.metrics) {
        error!(error = %e, "failed to initialize metrics exporter, continuing without it");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Migrate => run_migrations(&config).await,
        Commands::Serve => serve(config).await,
    }
}

fn database_config(config: &Config) -> storage::DatabaseConfig {
    storage::DatabaseConfig {
        database_type: storage::DatabaseType::Sqlite,
        url: config.database.url.clone(),
        max_connections: config.database.pool_size,
        ..Default::default()
    }
}

async fn run_migrations(config: &Config) -> Result<()> {
    let db_config = database_config(config);
    storage::SqlitePool::new(&db_config).await.context("failed to open database / run migrations")?;
    info!("migrations applied");
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let db_config = database_config(&config);
    let sqlite_pool = storage::SqlitePool::new(&db_config).await.context("failed to open database")?;
    let pool = sqlite_pool.pool().clone();

    let raw_repo = Arc::new(storage::SqliteRawBusinessRepository::new(pool.clone()));
    let standardized_repo = Arc::new(storage::SqliteStandardizedRepository::new(pool.clone()));
    let business_repo = Arc::new(storage::SqliteBusinessRepository::new(pool.clone()));
    let photo_repo = Arc::new(storage::SqlitePhotoRepository::new(pool.clone()));
    let budget_repo = Arc::new(storage::SqliteBudgetRepository::new(pool.clone()));
    let job_queue = Arc::new(storage::SqliteJobQueue::new(pool.clone()));
    let operation_repo = Arc::new(storage::SqliteOperationRepository::new(pool.clone()));

    let budget = load_or_create_budget(&config, budget_repo.as_ref()).await?;
    let cost = CostController::new(budget, 100.0, 60.0);

    #[cfg(feature = "s3")]
    let object_store = {
        let bucket = config
            .object_store
            .bucket
            .clone()
            .context("OBJECT_STORE_BUCKET is required when built with the s3 feature")?;
        Arc::new(ObjectStoreImpl::from_env(bucket).await)
    };
    #[cfg(not(feature = "s3"))]
    let object_store = Arc::new(ObjectStoreImpl::new(PathBuf::from(&config.object_store.local_dir)));

    let bus = EventBus::new();

    let standardizer = Arc::new(Standardizer::new(standardized_repo.clone(), bus.clone()));
    let deduplicator = Arc::new(Deduplicator::new(business_repo.clone(), bus.clone()));
    let photo_processor = Arc::new(PhotoProcessor::new(photo_repo.clone(), object_store.clone(), cost.clone(), bus.clone()));

    wire_pipeline_stages(
        &bus,
        raw_repo.clone(),
        standardized_repo.clone(),
        standardizer,
        deduplicator,
        photo_processor,
        operation_repo.clone(),
    )
    .await;

    let collector_clients = build_collector_clients(&config);
    let raw_collector = Arc::new(RawCollector::new(collector_clients, raw_repo.clone(), bus.clone()));

    let shutdown_token = CancellationToken::new();
    let worker_handle = {
        let queue = job_queue.clone();
        let raw_collector = raw_collector.clone();
        let operation_repo = operation_repo.clone();
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move {
            queue::run_workers(
                queue,
                move |job| {
                    let raw_collector = raw_collector.clone();
                    let operation_repo = operation_repo.clone();
                    async move {
                        let attempt = job.attempt;
                        let op = Operation::start(OperationStage::Collect, job.id, attempt);
                        let result = raw_collector.run_job(&job).await;
                        let op = match &result {
                            Ok(_) => op.succeed(),
                            Err(e) => op.fail(e.to_string()),
                        };
                        if let Err(e) = operation_repo.record(&op).await {
                            tracing::warn!(error = %e, "failed to record collect operation audit row");
                        }
                        result.map(|_| ())
                    }
                },
                WORKER_CONCURRENCY,
                WORKER_MAX_JOBS_PER_SEC,
                RetryPolicy::default(),
                shutdown_token,
            )
            .await;
        })
    };

    let shutdown_state = ShutdownState::new();
    let rate_limiter = RateLimiter::new(config.rate_limit.clone());
    spawn_rate_limit_eviction(rate_limiter.clone(), shutdown_token.clone());

    let app_state = AppState {
        queue: job_queue,
        businesses: business_repo,
        photos: photo_repo,
        shutdown: shutdown_state.clone(),
    };
    let app = create_routes(app_state, rate_limiter, &config.api.frontend_url);

    let addr: SocketAddr = ([0, 0, 0, 0], config.api.port).into();
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind API listener")?;
    info!(addr = %listener.local_addr()?, "ingestion-control API listening");

    let signal_shutdown_token = shutdown_token.clone();
    let signal_shutdown_state = shutdown_state.clone();
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received, draining in-flight work");
            signal_shutdown_state.begin_shutdown();
            signal_shutdown_token.cancel();
        });

    if let Err(e) = server.await {
        error!(error = %e, "ingestion-control API server error");
    }

    if tokio::time::timeout(Duration::from_secs(SHUTDOWN_DRAIN_SECS), worker_handle).await.is_err() {
        info!(seconds = SHUTDOWN_DRAIN_SECS, "worker pool did not quiesce within the drain deadline, exiting anyway");
    }

    sqlite_pool.close().await;
    info!("venue-ingest shut down cleanly");
    Ok(())
}

async fn load_or_create_budget(config: &Config, budget_repo: &impl BudgetRepository) -> Result<Budget> {
    let period = chrono::Utc::now().format("%Y-%m").to_string();

    if let Some(budget) = budget_repo.get(&period).await.context("failed to load budget ledger")? {
        return Ok(budget);
    }

    let monthly_limit = Decimal::try_from(config.budget.monthly_usd).unwrap_or(Decimal::new(2000, 2));
    let mut budget = Budget::new(period, monthly_limit);
    budget.alert_threshold = config.budget.alert_threshold;
    budget.emergency_threshold = config.budget.emergency_threshold;
    budget_repo.upsert(&budget).await.context("failed to seed budget ledger")?;
    Ok(budget)
}

fn build_collector_clients(config: &Config) -> Vec<Arc<dyn CollectorClient>> {
    let mut clients: Vec<Arc<dyn CollectorClient>> = Vec::new();

    if let Some(key) = &config.upstream.google_places_api_key {
        clients.push(Arc::new(GooglePlacesClient::new(key.clone())));
    } else {
        info!(source = %Source::Google, "no API key configured, this source will never be dispatched");
    }

    if let Some(key) = &config.upstream.yelp_api_key {
        clients.push(Arc::new(YelpClient::new(key.clone())));
    } else {
        info!(source = %Source::Yelp, "no API key configured, this source will never be dispatched");
    }

    clients
}

/// Subscribes each stage to the event published by the stage before it:
/// `raw.collected` -> Standardizer, `standardized` -> Deduplicator,
/// `deduplicated` -> Photo Processor. Each handler re-fetches its input by
/// id rather than carrying the full record on the event, so the event bus
/// payloads stay small and every stage's read path is exercised the same
/// way a direct API call would exercise it.
async fn wire_pipeline_stages<RR, SR, OR>(
    bus: &EventBus,
    raw_repo: Arc<RR>,
    standardized_repo: Arc<SR>,
    standardizer: Arc<Standardizer<SR>>,
    deduplicator: Arc<Deduplicator<storage::SqliteBusinessRepository>>,
    photo_processor: Arc<PhotoProcessor<storage::SqlitePhotoRepository, ObjectStoreImpl>>,
    operation_repo: Arc<OR>,
) where
    RR: RawBusinessRepository + 'static,
    SR: StandardizedRepository + 'static,
    OR: OperationRepository + 'static,
{
    {
        let raw_repo = raw_repo.clone();
        let standardizer = standardizer.clone();
        let operation_repo = operation_repo.clone();
        bus.subscribe(EventTag::RawCollected, move |event| {
            let raw_repo = raw_repo.clone();
            let standardizer = standardizer.clone();
            let operation_repo = operation_repo.clone();
            async move {
                let source: Source = serde_json::from_value(event.payload["source"].clone())?;
                let external_id = event.payload["externalId"].as_str().unwrap_or_default().to_string();
                if let Some(raw) = raw_repo.get_by_source_external_id(source, &external_id).await? {
                    let op = Operation::start(OperationStage::Standardize, raw.id, 0);
                    let result = standardizer.standardize(&raw).await;
                    let op = match &result {
                        Ok(_) => op.succeed(),
                        Err(e) => op.fail(e.to_string()),
                    };
                    if let Err(e) = operation_repo.record(&op).await {
                        tracing::warn!(error = %e, "failed to record standardize operation audit row");
                    }
                    result?;
                }
                Ok(())
            }
        })
        .await;
    }

    {
        let standardized_repo = standardized_repo.clone();
        let deduplicator = deduplicator.clone();
        let operation_repo = operation_repo.clone();
        bus.subscribe(EventTag::Standardized, move |event| {
            let standardized_repo = standardized_repo.clone();
            let deduplicator = deduplicator.clone();
            let operation_repo = operation_repo.clone();
            async move {
                let id: uuid::Uuid = serde_json::from_value(event.payload["standardizedBusinessId"].clone())?;
                if let Some(standardized) = standardized_repo.get(id).await? {
                    let op = Operation::start(OperationStage::Dedup, id, 0);
                    let result = deduplicator.deduplicate(&standardized).await;
                    let op = match &result {
                        Ok(_) => op.succeed(),
                        Err(e) => op.fail(e.to_string()),
                    };
                    if let Err(e) = operation_repo.record(&op).await {
                        tracing::warn!(error = %e, "failed to record dedup operation audit row");
                    }
                    result?;
                }
                Ok(())
            }
        })
        .await;
    }

    {
        let photo_processor = photo_processor.clone();
        let operation_repo = operation_repo.clone();
        bus.subscribe(EventTag::Deduplicated, move |event| {
            let photo_processor = photo_processor.clone();
            let operation_repo = operation_repo.clone();
            async move {
                let business_id: uuid::Uuid = serde_json::from_value(event.payload["businessId"].clone())?;
                let op = Operation::start(OperationStage::Photos, business_id, 0);
                let result = photo_processor.process_business(business_id).await;
                let op = match &result {
                    Ok(_) => op.succeed(),
                    Err(e) => op.fail(e.to_string()),
                };
                if let Err(e) = operation_repo.record(&op).await {
                    tracing::warn!(error = %e, "failed to record photos operation audit row");
                }
                result?;
                Ok(())
            }
        })
        .await;
    }
}

fn spawn_rate_limit_eviction(rate_limiter: RateLimiter, shutdown_token: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => break,
                _ = ticker.tick() => rate_limiter.evict_stale(),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
