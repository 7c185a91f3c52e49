//! Raw Collector: per-source job handlers that call an upstream search
//! API, upsert every result as a `RawBusiness`, and emit one
//! `raw.collected` per record. Adding a third upstream means implementing
//! `CollectorClient`, not touching the job dispatch or worker loop.

pub mod google;
pub mod yelp;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::error::Result;
use crate::domain::raw::RawBusiness;
use crate::domain::source::{CollectionJobKind, Source};
use crate::events::{Event, EventBus, EventTag};
use crate::queue::Job;
use crate::storage::RawBusinessRepository;

pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

/// One page of search results plus an optional continuation token.
pub struct SearchPage {
    pub results: Vec<(String, serde_json::Value)>,
    pub next_page_token: Option<String>,
}

/// What a per-provider client needs to support for the Raw Collector to
/// drive it through both job kinds.
#[async_trait]
pub trait CollectorClient: Send + Sync {
    fn source(&self) -> Source;
    async fn search_nearby_page(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
        page_token: Option<&str>,
    ) -> Result<SearchPage>;
    async fn place_details(&self, external_id: &str) -> Result<serde_json::Value>;
}

pub struct RawCollector<R> {
    clients: Vec<Arc<dyn CollectorClient>>,
    repo: Arc<R>,
    bus: EventBus,
}

impl<R> RawCollector<R>
where
    R: RawBusinessRepository,
{
    pub fn new(clients: Vec<Arc<dyn CollectorClient>>, repo: Arc<R>, bus: EventBus) -> Self {
        Self { clients, repo, bus }
    }

    fn client_for(&self, source: Source) -> Option<&Arc<dyn CollectorClient>> {
        self.clients.iter().find(|c| c.source() == source)
    }

    /// Executes one claimed job to completion. Returns the number of
    /// `RawBusiness` records upserted.
    pub async fn run_job(&self, job: &Job) -> Result<usize> {
        match &job.kind {
            CollectionJobKind::SearchNearby { source, lat, lng, radius_meters } => {
                self.search_nearby(job.id, *source, *lat, *lng, *radius_meters).await
            }
            CollectionJobKind::PlaceDetails { source, external_id } => {
                self.place_details(job.id, *source, external_id).await
            }
        }
    }

    async fn search_nearby(
        &self,
        job_id: uuid::Uuid,
        source: Source,
        lat: f64,
        lng: f64,
        radius_meters: u32,
    ) -> Result<usize> {
        let client = self
            .client_for(source)
            .ok_or_else(|| crate::domain::error::IngestError::config(format!("no collector client for {source}")))?
            .clone();

        let mut page_token: Option<String> = None;
        let mut total = 0usize;

        loop {
            let page = client.search_nearby_page(lat, lng, radius_meters, page_token.as_deref()).await?;
            for (external_id, payload) in page.results {
                self.upsert_and_publish(job_id, source, external_id, payload).await?;
                total += 1;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(job_id = %job_id, source = %source, total, "search_nearby job complete");
        Ok(total)
    }

    async fn place_details(&self, job_id: uuid::Uuid, source: Source, external_id: &str) -> Result<usize> {
        let client = self
            .client_for(source)
            .ok_or_else(|| crate::domain::error::IngestError::config(format!("no collector client for {source}")))?
            .clone();

        let payload = client.place_details(external_id).await?;
        self.upsert_and_publish(job_id, source, external_id.to_string(), payload).await?;
        Ok(1)
    }

    async fn upsert_and_publish(
        &self,
        job_id: uuid::Uuid,
        source: Source,
        external_id: String,
        payload: serde_json::Value,
    ) -> Result<()> {
        let existing = self.repo.get_by_source_external_id(source, &external_id).await?;
        let record = match existing {
            Some(mut prior) => {
                prior.raw_payload = payload;
                prior.fetch_count += 1;
                prior.job_id = job_id;
                prior.fetched_at = chrono::Utc::now();
                prior
            }
            None => RawBusiness::new(source, external_id, job_id, payload),
        };

        if let Err(e) = record.validate() {
            warn!(external_id = %record.external_id, error = %e, "skipping invalid raw record");
            return Ok(());
        }

        self.repo.insert(&record).await?;

        self.bus
            .publish(Event::new(
                EventTag::RawCollected,
                serde_json::json!({
                    "rawBusinessId": record.id,
                    "source": record.source,
                    "externalId": record.external_id,
                }),
            ))
            .await;

        Ok(())
    }
}

/// Resolves a curated city name to a handful of search-seed coordinates.
/// Covers the handful of markets exercised by the ingestion-control API's
/// `/data-collection/google/search/city` endpoint; unknown cities return
/// `None` so the caller can surface the 404 `availableCities` response.
pub fn resolve_city(city: &str) -> Option<Vec<(f64, f64)>> {
    match city.to_lowercase().as_str() {
        "chicago" => Some(vec![(41.8781, -87.6298), (41.9000, -87.6500), (41.8500, -87.6700)]),
        "new york" | "nyc" => Some(vec![(40.7128, -74.0060), (40.7580, -73.9855), (40.6782, -73.9442)]),
        "san francisco" | "sf" => Some(vec![(37.7749, -122.4194), (37.7849, -122.4094)]),
        _ => None,
    }
}

pub const AVAILABLE_CITIES: &[&str] = &["chicago", "new york", "san francisco"];

/// Jobs in a bulk enqueue are staggered ~1s apart to avoid bursting the
/// upstream rate limit, per the Raw Collector's queue contract.
pub const BULK_STAGGER_MILLIS: i64 = 1_000;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryRepository;
    use std::sync::Mutex as StdMutex;

    struct StubClient {
        source: Source,
        pages: StdMutex<Vec<SearchPage>>,
    }

    #[async_trait]
    impl CollectorClient for StubClient {
        fn source(&self) -> Source {
            self.source
        }

        async fn search_nearby_page(
            &self,
            _lat: f64,
            _lng: f64,
            _radius_meters: u32,
            _page_token: Option<&str>,
        ) -> Result<SearchPage> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(SearchPage { results: vec![], next_page_token: None });
            }
            Ok(pages.remove(0))
        }

        async fn place_details(&self, external_id: &str) -> Result<serde_json::Value> {
            Ok(serde_json::json!({ "id": external_id }))
        }
    }

    #[tokio::test]
    async fn search_nearby_follows_pagination_until_exhausted() {
        let client: Arc<dyn CollectorClient> = Arc::new(StubClient {
            source: Source::Google,
            pages: StdMutex::new(vec![
                SearchPage {
                    results: vec![("a".into(), serde_json::json!({"n":1}))],
                    next_page_token: Some("p2".into()),
                },
                SearchPage {
                    results: vec![("b".into(), serde_json::json!({"n":2}))],
                    next_page_token: None,
                },
            ]),
        });
        let repo = Arc::new(InMemoryRepository::new());
        let collector = RawCollector::new(vec![client], repo.clone(), EventBus::new());

        let job = Job::new(
            CollectionJobKind::SearchNearby { source: Source::Google, lat: 1.0, lng: 2.0, radius_meters: 500 },
            3,
        );
        let total = collector.run_job(&job).await.unwrap();

        assert_eq!(total, 2);
        assert!(repo.get_by_source_external_id(Source::Google, "a").await.unwrap().is_some());
        assert!(repo.get_by_source_external_id(Source::Google, "b").await.unwrap().is_some());
    }

    #[test]
    fn unknown_city_resolves_to_none() {
        assert!(resolve_city("atlantis").is_none());
        assert!(resolve_city("Chicago").is_some());
    }
}
