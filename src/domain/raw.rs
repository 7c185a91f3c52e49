use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{IngestError, Result};
use super::source::Source;

/// The unmodified payload returned by an upstream provider for one place,
/// captured before any normalization happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBusiness {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub source: Source,

    /// The id the upstream provider uses for this place (placeId, businessId, ...).
    pub external_id: String,

    /// The job that produced this fetch, for traceability back to the collector run.
    pub job_id: Uuid,

    /// Opaque upstream payload, stored as received.
    pub raw_payload: serde_json::Value,

    /// How many times this external id has been re-fetched (re-collection is
    /// idempotent on `(source, external_id)` but we still track churn).
    #[serde(default)]
    pub fetch_count: u32,

    /// When this `(source, externalId)` was first collected; unlike
    /// `fetched_at`, a refetch never moves this forward.
    #[serde(default = "Utc::now")]
    pub first_seen_at: DateTime<Utc>,

    pub fetched_at: DateTime<Utc>,
}

impl RawBusiness {
    pub fn new(
        source: Source,
        external_id: String,
        job_id: Uuid,
        raw_payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source,
            external_id,
            job_id,
            raw_payload,
            fetch_count: 1,
            first_seen_at: now,
            fetched_at: now,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.external_id.trim().is_empty() {
            return Err(IngestError::validation("external_id must not be empty"));
        }
        if self.raw_payload.is_null() {
            return Err(IngestError::validation("raw_payload must not be null"));
        }
        Ok(())
    }
}
