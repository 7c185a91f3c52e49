use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{IngestError, Result};
use super::source::Source;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "US".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenHours {
    /// 0 = Sunday .. 6 = Saturday, matching the teacher's day-index convention
    /// for other recurring-schedule fields in the corpus.
    pub day_of_week: u8,
    pub open_time: String,
    pub close_time: String,
}

/// The canonical per-source shape produced by a `SourceExtractor`, before
/// deduplication merges it into a `Business`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardizedBusiness {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub source: Source,
    pub external_id: String,
    pub raw_business_id: Uuid,

    pub name: String,
    pub address: Address,
    pub location: GeoPoint,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub hours: Vec<OpenHours>,

    /// Derived from `categories` by `standardize::normalize::classify_categories`.
    #[serde(default)]
    pub is_bar: bool,
    #[serde(default)]
    pub is_restaurant: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,

    #[serde(default)]
    pub photo_refs: Vec<String>,

    pub standardized_at: DateTime<Utc>,
}

impl StandardizedBusiness {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(IngestError::validation("name must not be empty"));
        }
        if !(-90.0..=90.0).contains(&self.location.lat) {
            return Err(IngestError::validation("latitude out of range"));
        }
        if !(-180.0..=180.0).contains(&self.location.lng) {
            return Err(IngestError::validation("longitude out of range"));
        }
        if let Some(level) = self.price_level {
            if level > 4 {
                return Err(IngestError::validation("price_level must be 0-4"));
            }
        }
        Ok(())
    }
}
