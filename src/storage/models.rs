// Database row models (SQLx FromRow), kept distinct from the domain types
// so storage-format decisions (timestamps as RFC3339 strings, JSON blobs
// for nested structures) don't leak into the rest of the crate.

use serde_json::Value as JsonValue;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RawBusinessRow {
    pub id: String,
    pub source: String,
    pub external_id: String,
    pub job_id: String,
    pub raw_payload: JsonValue,
    pub fetch_count: i64,
    pub first_seen_at: String,
    pub fetched_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct StandardizedBusinessRow {
    pub id: String,
    pub source: String,
    pub external_id: String,
    pub raw_business_id: String,
    pub name: String,
    pub address: JsonValue,
    pub lat: f64,
    pub lng: f64,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub categories: JsonValue,
    pub hours: JsonValue,
    pub is_bar: bool,
    pub is_restaurant: bool,
    pub price_level: Option<i64>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub photo_refs: JsonValue,
    pub standardized_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct BusinessRow {
    pub id: String,
    pub name: String,
    pub address: JsonValue,
    pub lat: f64,
    pub lng: f64,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub categories: JsonValue,
    pub hours: JsonValue,
    pub is_bar: bool,
    pub is_restaurant: bool,
    pub price_level: Option<i64>,
    pub rating: Option<f64>,
    pub rating_google: Option<f64>,
    pub rating_yelp: Option<f64>,
    pub review_count: Option<i64>,
    pub merge_count: i64,
    pub confidence: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct SourceBindingRow {
    pub id: String,
    pub business_id: String,
    pub source: String,
    pub external_id: String,
    pub match_confidence: f64,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct PhotoRow {
    pub id: String,
    pub business_id: String,
    pub source_ref: String,
    pub status: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub checksum_sha256: Option<String>,
    pub storage_keys: JsonValue,
    pub failure_reason: Option<String>,
    pub main_photo: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct OperationRow {
    pub id: String,
    pub stage: String,
    pub status: String,
    pub entity_id: String,
    pub attempt: i64,
    pub error_message: Option<String>,
    pub request_id: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BudgetRow {
    pub period: String,
    pub monthly_limit_usd: String,
    pub spent_usd: String,
    pub alert_threshold: f64,
    pub emergency_threshold: f64,
    pub emergency_mode: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub kind: JsonValue,
    pub status: String,
    pub attempt: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub run_after: String,
    pub created_at: String,
    pub updated_at: String,
}
