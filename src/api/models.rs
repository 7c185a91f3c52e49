//! Request/response DTOs for the ingestion-control API. Field names follow
//! the wire contract's camelCase exactly; internal types stay snake_case and
//! convert at the edge, the same split the teacher draws between
//! `UsageWebhookPayload` (wire) and `UsageRecord` (domain).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::business::Business;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchNearbyRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub radius: Option<u32>,
    /// Accepted for wire-shape compatibility; neither collector client
    /// threads place-type filters through to the upstream search call yet.
    #[serde(default)]
    pub included_types: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_types: Option<Vec<String>>,
    #[serde(default)]
    pub max_result_count: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchNearbyResponse {
    pub job_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub options: Option<BulkLocationOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLocationOptions {
    #[serde(default)]
    pub radius: Option<u32>,
    #[serde(default)]
    pub included_types: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSearchRequest {
    pub locations: Vec<BulkLocation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSearchResponse {
    pub job_ids: Vec<Uuid>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitySearchRequest {
    pub city: String,
    #[serde(default)]
    pub included_types: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_types: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityNotFoundResponse {
    pub available_cities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct BusinessListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub with_photos_only: bool,
    #[serde(default)]
    pub page: Option<i64>,
}

fn default_limit() -> i64 {
    20
}

impl BusinessListQuery {
    /// `page` overrides `offset` when present, 1-indexed per the wire
    /// contract (`page=1` is the first page).
    pub fn effective_offset(&self) -> i64 {
        match self.page {
            Some(page) if page > 0 => (page - 1) * self.limit.max(1),
            _ => self.offset.max(0),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessListResponse {
    pub businesses: Vec<Business>,
    pub count: usize,
    pub total_count: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

impl BusinessListResponse {
    pub fn new(businesses: Vec<Business>, total_count: i64, limit: i64, offset: i64) -> Self {
        let limit = limit.max(1);
        let page = offset / limit + 1;
        let total_pages = ((total_count as f64) / (limit as f64)).ceil().max(1.0) as i64;
        let has_more = offset + (businesses.len() as i64) < total_count;
        Self { count: businesses.len(), businesses, total_count, page, total_pages, has_more }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationSearchQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius: f64,
    #[serde(default)]
    pub with_deals_only: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSearchResponse {
    pub results: Vec<Business>,
    pub count: usize,
    pub search_criteria: LocationSearchCriteria,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSearchCriteria {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
    pub with_deals_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct CategorySearchQuery {
    #[serde(default)]
    pub is_bar: Option<bool>,
    #[serde(default)]
    pub is_restaurant: Option<bool>,
    #[serde(default)]
    pub with_deals_only: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySearchResponse {
    pub results: Vec<Business>,
    pub count: usize,
    pub category: String,
    pub filters: CategorySearchFilters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySearchFilters {
    pub is_bar: Option<bool>,
    pub is_restaurant: Option<bool>,
    pub with_deals_only: bool,
}
