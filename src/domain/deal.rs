use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A promotional offer extracted from a business's operating-hours or
/// description text (a "happy hour" style recurring discount). Disabled by
/// default behind the `deals` feature; see the `deals` module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub business_id: Uuid,

    /// 0 (Sunday) .. 6 (Saturday), or `None` for a deal that runs every day.
    pub day_of_week: Option<u8>,
    pub start_time: String,
    pub end_time: String,

    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Which extractor produced this row, e.g. `"regex:happy_hour"`.
    pub extracted_by: String,
    /// Extractor-reported confidence in `[0, 1]`.
    pub confidence: f32,
    /// The raw text span the extractor matched against, kept for audit.
    pub source_text: String,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl Deal {
    pub fn validate(&self) -> crate::domain::error::Result<()> {
        use crate::domain::error::IngestError;
        if self.title.trim().is_empty() {
            return Err(IngestError::validation("deal title must not be empty"));
        }
        if self.title.chars().count() > 100 {
            return Err(IngestError::validation("deal title must be at most 100 characters"));
        }
        if let Some(day) = self.day_of_week {
            if day > 6 {
                return Err(IngestError::validation("day_of_week must be 0-6"));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(IngestError::validation("confidence must be in [0, 1]"));
        }
        Ok(())
    }
}
