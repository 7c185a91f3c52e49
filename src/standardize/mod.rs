//! Standardizer: turns a `RawBusiness` into a `StandardizedBusiness` using
//! the extractor for its source, then persists and publishes `standardized`.
//!
//! Each source gets its own extractor rather than a shared "best effort"
//! mapping, since Google and Yelp disagree on nearly every field shape
//! (addressComponents vs. flat location fields, nested displayName vs. a
//! bare name string) and forcing them through one struct would mean either
//! extractor silently tolerating the other's quirks.

pub mod google;
pub mod normalize;
pub mod yelp;

use std::sync::Arc;

use tracing::info;

use crate::domain::error::Result;
use crate::domain::raw::RawBusiness;
use crate::domain::source::Source;
use crate::domain::standardized::StandardizedBusiness;
use crate::events::{Event, EventBus, EventTag};
use crate::storage::StandardizedRepository;

/// Extracts a `StandardizedBusiness` out of one source's raw payload shape.
pub trait SourceExtractor {
    fn extract(raw: &RawBusiness) -> Result<StandardizedBusiness>;
}

pub fn extract_for_source(raw: &RawBusiness) -> Result<StandardizedBusiness> {
    match raw.source {
        Source::Google => google::extract(raw),
        Source::Yelp => yelp::extract(raw),
    }
}

pub struct Standardizer<R> {
    repo: Arc<R>,
    bus: EventBus,
}

impl<R> Standardizer<R>
where
    R: StandardizedRepository,
{
    pub fn new(repo: Arc<R>, bus: EventBus) -> Self {
        Self { repo, bus }
    }

    /// Extracts, validates, and persists one raw record, then publishes
    /// `standardized`. Safe to call more than once for the same raw record;
    /// callers key idempotency off `raw_business_id` downstream.
    pub async fn standardize(&self, raw: &RawBusiness) -> Result<StandardizedBusiness> {
        raw.validate()?;
        let standardized = extract_for_source(raw)?;
        standardized.validate()?;

        self.repo.insert(&standardized).await?;

        self.bus
            .publish(Event::new(
                EventTag::Standardized,
                serde_json::json!({
                    "standardizedBusinessId": standardized.id,
                    "rawBusinessId": raw.id,
                    "source": raw.source,
                }),
            ))
            .await;

        info!(
            standardized_id = %standardized.id,
            raw_id = %raw.id,
            source = %raw.source,
            "standardized raw business"
        );
        Ok(standardized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryRepository;
    use uuid::Uuid;

    fn google_raw() -> RawBusiness {
        RawBusiness::new(
            Source::Google,
            "place-1".into(),
            Uuid::new_v4(),
            serde_json::json!({
                "displayName": { "text": "Joe's Pizza" },
                "addressComponents": [],
                "location": { "latitude": 39.78, "longitude": -89.65 },
                "types": []
            }),
        )
    }

    #[tokio::test]
    async fn standardizes_and_publishes() {
        let repo = Arc::new(InMemoryRepository::new());
        let bus = EventBus::new();
        let received = Arc::new(tokio::sync::Mutex::new(false));
        let r = received.clone();
        bus.subscribe(EventTag::Standardized, move |_| {
            let r = r.clone();
            async move {
                *r.lock().await = true;
                Ok(())
            }
        })
        .await;

        let standardizer = Standardizer::new(repo.clone(), bus);
        let raw = google_raw();
        let result = standardizer.standardize(&raw).await.unwrap();

        assert_eq!(result.name, "Joe's Pizza");
        assert!(repo.get(result.id).await.unwrap().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(*received.lock().await);
    }
}
