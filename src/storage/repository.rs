// Repository traits and SQLite implementations. Uses runtime-checked
// `sqlx::query`/`query_as` rather than the `query!`/`query_as!` macros, so
// the crate builds without a live database available at compile time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::business::{Business, SourceBinding};
use crate::domain::budget::Budget;
use crate::domain::error::{IngestError, Result};
use crate::domain::operation::Operation;
use crate::domain::photo::{Photo, PhotoStatus, PhotoVariant};
use crate::domain::raw::RawBusiness;
use crate::domain::source::Source;
use crate::domain::standardized::{GeoPoint, StandardizedBusiness};

use crate::queue::{Job, JobQueue, JobStatus, QueueStats, RetryPolicy};

use super::models::{
    BudgetRow, BusinessRow, JobRow, OperationRow, PhotoRow, RawBusinessRow, SourceBindingRow,
    StandardizedBusinessRow,
};

#[async_trait]
pub trait RawBusinessRepository: Send + Sync {
    async fn insert(&self, record: &RawBusiness) -> Result<()>;
    async fn get_by_source_external_id(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<RawBusiness>>;
}

#[async_trait]
pub trait StandardizedRepository: Send + Sync {
    async fn insert(&self, record: &StandardizedBusiness) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<StandardizedBusiness>>;
}

#[async_trait]
pub trait BusinessRepository: Send + Sync {
    async fn insert(&self, business: &Business) -> Result<()>;
    async fn update(&self, business: &Business) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Business>>;
    /// Coarse spatial prefilter: all businesses whose location falls within
    /// a bounding box around `center`, for the matching library to score.
    async fn find_near(&self, center: GeoPoint, radius_meters: f64) -> Result<Vec<Business>>;
    async fn add_source_binding(&self, binding: &SourceBinding) -> Result<()>;
    async fn find_binding(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<SourceBinding>>;
    async fn list_bindings_for_business(&self, business_id: Uuid) -> Result<Vec<SourceBinding>>;
    /// Page through all businesses, newest first. Returns the page alongside
    /// the total row count so callers can build pagination metadata without
    /// a second round trip.
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Business>, i64)>;
    /// Same as `list`, restricted to businesses whose category list contains
    /// `category` (case-sensitive, matching how categories are normalized
    /// at standardization time).
    async fn list_by_category(
        &self,
        category: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Business>, i64)>;
}

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn insert(&self, photo: &Photo) -> Result<()>;
    async fn update(&self, photo: &Photo) -> Result<()>;
    async fn list_for_business(&self, business_id: Uuid) -> Result<Vec<Photo>>;
}

#[async_trait]
pub trait OperationRepository: Send + Sync {
    async fn record(&self, operation: &Operation) -> Result<()>;
}

#[async_trait]
pub trait BudgetRepository: Send + Sync {
    async fn get(&self, period: &str) -> Result<Option<Budget>>;
    async fn upsert(&self, budget: &Budget) -> Result<()>;
}

pub struct SqliteRawBusinessRepository {
    pool: SqlitePool,
}

impl SqliteRawBusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_raw_business(row: RawBusinessRow) -> Result<RawBusiness> {
    Ok(RawBusiness {
        id: Uuid::parse_str(&row.id).map_err(|e| IngestError::internal(e.to_string()))?,
        source: row.source.parse()?,
        external_id: row.external_id,
        job_id: Uuid::parse_str(&row.job_id).map_err(|e| IngestError::internal(e.to_string()))?,
        raw_payload: row.raw_payload,
        fetch_count: row.fetch_count as u32,
        first_seen_at: parse_timestamp(&row.first_seen_at)?,
        fetched_at: parse_timestamp(&row.fetched_at)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IngestError::internal(format!("bad timestamp '{s}': {e}")))
}

#[async_trait]
impl RawBusinessRepository for SqliteRawBusinessRepository {
    async fn insert(&self, record: &RawBusiness) -> Result<()> {
        sqlx::query(
            "INSERT INTO raw_businesses
                (id, source, external_id, job_id, raw_payload, fetch_count, first_seen_at, fetched_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source, external_id) DO UPDATE SET
                raw_payload = excluded.raw_payload,
                fetch_count = raw_businesses.fetch_count + 1,
                fetched_at = excluded.fetched_at",
        )
        .bind(record.id.to_string())
        .bind(record.source.as_str())
        .bind(&record.external_id)
        .bind(record.job_id.to_string())
        .bind(&record.raw_payload)
        .bind(record.fetch_count as i64)
        .bind(record.first_seen_at.to_rfc3339())
        .bind(record.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_source_external_id(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<RawBusiness>> {
        let row = sqlx::query_as::<_, RawBusinessRow>(
            "SELECT id, source, external_id, job_id, raw_payload, fetch_count, first_seen_at, fetched_at
             FROM raw_businesses WHERE source = ? AND external_id = ?",
        )
        .bind(source.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_raw_business).transpose()
    }
}

pub struct SqliteStandardizedRepository {
    pool: SqlitePool,
}

impl SqliteStandardizedRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_standardized(row: StandardizedBusinessRow) -> Result<StandardizedBusiness> {
    Ok(StandardizedBusiness {
        id: Uuid::parse_str(&row.id).map_err(|e| IngestError::internal(e.to_string()))?,
        source: row.source.parse()?,
        external_id: row.external_id,
        raw_business_id: Uuid::parse_str(&row.raw_business_id)
            .map_err(|e| IngestError::internal(e.to_string()))?,
        name: row.name,
        address: serde_json::from_value(row.address)?,
        location: GeoPoint { lat: row.lat, lng: row.lng },
        phone: row.phone,
        website: row.website,
        categories: serde_json::from_value(row.categories)?,
        hours: serde_json::from_value(row.hours)?,
        is_bar: row.is_bar,
        is_restaurant: row.is_restaurant,
        price_level: row.price_level.map(|p| p as u8),
        rating: row.rating.map(|r| r as f32),
        review_count: row.review_count.map(|c| c as u32),
        photo_refs: serde_json::from_value(row.photo_refs)?,
        standardized_at: parse_timestamp(&row.standardized_at)?,
    })
}

#[async_trait]
impl StandardizedRepository for SqliteStandardizedRepository {
    async fn insert(&self, record: &StandardizedBusiness) -> Result<()> {
        sqlx::query(
            "INSERT INTO standardized_businesses
                (id, source, external_id, raw_business_id, name, address, lat, lng,
                 phone, website, categories, hours, is_bar, is_restaurant, price_level,
                 rating, review_count, photo_refs, standardized_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.source.as_str())
        .bind(&record.external_id)
        .bind(record.raw_business_id.to_string())
        .bind(&record.name)
        .bind(serde_json::to_value(&record.address)?)
        .bind(record.location.lat)
        .bind(record.location.lng)
        .bind(&record.phone)
        .bind(&record.website)
        .bind(serde_json::to_value(&record.categories)?)
        .bind(serde_json::to_value(&record.hours)?)
        .bind(record.is_bar)
        .bind(record.is_restaurant)
        .bind(record.price_level.map(|p| p as i64))
        .bind(record.rating.map(|r| r as f64))
        .bind(record.review_count.map(|c| c as i64))
        .bind(serde_json::to_value(&record.photo_refs)?)
        .bind(record.standardized_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StandardizedBusiness>> {
        let row = sqlx::query_as::<_, StandardizedBusinessRow>(
            "SELECT id, source, external_id, raw_business_id, name, address, lat, lng,
                    phone, website, categories, hours, is_bar, is_restaurant, price_level,
                    rating, review_count, photo_refs, standardized_at
             FROM standardized_businesses WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_standardized).transpose()
    }
}

pub struct SqliteBusinessRepository {
    pool: SqlitePool,
}

impl SqliteBusinessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_business(row: BusinessRow) -> Result<Business> {
    Ok(Business {
        id: Uuid::parse_str(&row.id).map_err(|e| IngestError::internal(e.to_string()))?,
        name: row.name,
        address: serde_json::from_value(row.address)?,
        location: GeoPoint { lat: row.lat, lng: row.lng },
        phone: row.phone,
        website: row.website,
        categories: serde_json::from_value(row.categories)?,
        hours: serde_json::from_value(row.hours)?,
        is_bar: row.is_bar,
        is_restaurant: row.is_restaurant,
        price_level: row.price_level.map(|p| p as u8),
        rating: row.rating.map(|r| r as f32),
        rating_google: row.rating_google.map(|r| r as f32),
        rating_yelp: row.rating_yelp.map(|r| r as f32),
        review_count: row.review_count.map(|c| c as u32),
        merge_count: row.merge_count as u32,
        confidence: row.confidence as f32,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

fn row_to_binding(row: SourceBindingRow) -> Result<SourceBinding> {
    Ok(SourceBinding {
        id: Uuid::parse_str(&row.id).map_err(|e| IngestError::internal(e.to_string()))?,
        business_id: Uuid::parse_str(&row.business_id)
            .map_err(|e| IngestError::internal(e.to_string()))?,
        source: row.source.parse()?,
        external_id: row.external_id,
        match_confidence: row.match_confidence as f32,
        first_seen_at: parse_timestamp(&row.first_seen_at)?,
        last_seen_at: parse_timestamp(&row.last_seen_at)?,
    })
}

#[async_trait]
impl BusinessRepository for SqliteBusinessRepository {
    async fn insert(&self, business: &Business) -> Result<()> {
        sqlx::query(
            "INSERT INTO businesses
                (id, name, address, lat, lng, phone, website, categories, hours,
                 is_bar, is_restaurant, price_level, rating, rating_google, rating_yelp,
                 review_count, merge_count, confidence, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(business.id.to_string())
        .bind(&business.name)
        .bind(serde_json::to_value(&business.address)?)
        .bind(business.location.lat)
        .bind(business.location.lng)
        .bind(&business.phone)
        .bind(&business.website)
        .bind(serde_json::to_value(&business.categories)?)
        .bind(serde_json::to_value(&business.hours)?)
        .bind(business.is_bar)
        .bind(business.is_restaurant)
        .bind(business.price_level.map(|p| p as i64))
        .bind(business.rating.map(|r| r as f64))
        .bind(business.rating_google.map(|r| r as f64))
        .bind(business.rating_yelp.map(|r| r as f64))
        .bind(business.review_count.map(|c| c as i64))
        .bind(business.merge_count as i64)
        .bind(business.confidence as f64)
        .bind(business.created_at.to_rfc3339())
        .bind(business.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, business: &Business) -> Result<()> {
        sqlx::query(
            "UPDATE businesses SET name = ?, address = ?, lat = ?, lng = ?, phone = ?,
                website = ?, categories = ?, hours = ?, is_bar = ?, is_restaurant = ?,
                price_level = ?, rating = ?, rating_google = ?, rating_yelp = ?,
                review_count = ?, merge_count = ?, confidence = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&business.name)
        .bind(serde_json::to_value(&business.address)?)
        .bind(business.location.lat)
        .bind(business.location.lng)
        .bind(&business.phone)
        .bind(&business.website)
        .bind(serde_json::to_value(&business.categories)?)
        .bind(serde_json::to_value(&business.hours)?)
        .bind(business.is_bar)
        .bind(business.is_restaurant)
        .bind(business.price_level.map(|p| p as i64))
        .bind(business.rating.map(|r| r as f64))
        .bind(business.rating_google.map(|r| r as f64))
        .bind(business.rating_yelp.map(|r| r as f64))
        .bind(business.review_count.map(|c| c as i64))
        .bind(business.merge_count as i64)
        .bind(business.confidence as f64)
        .bind(business.updated_at.to_rfc3339())
        .bind(business.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Business>> {
        let row = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, address, lat, lng, phone, website, categories, hours,
                    is_bar, is_restaurant, price_level, rating, rating_google, rating_yelp,
                    review_count, merge_count, confidence, created_at, updated_at
             FROM businesses WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_business).transpose()
    }

    async fn find_near(&self, center: GeoPoint, radius_meters: f64) -> Result<Vec<Business>> {
        // One degree of latitude is ~111km; widen generously since this is
        // only a prefilter ahead of the matching library's haversine check.
        let lat_delta = radius_meters / 111_000.0;
        let lng_delta = radius_meters / (111_000.0 * center.lat.to_radians().cos().abs().max(0.1));

        let rows = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, address, lat, lng, phone, website, categories, hours,
                    is_bar, is_restaurant, price_level, rating, rating_google, rating_yelp,
                    review_count, merge_count, confidence, created_at, updated_at
             FROM businesses WHERE lat BETWEEN ? AND ? AND lng BETWEEN ? AND ?",
        )
        .bind(center.lat - lat_delta)
        .bind(center.lat + lat_delta)
        .bind(center.lng - lng_delta)
        .bind(center.lng + lng_delta)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_business).collect()
    }

    async fn add_source_binding(&self, binding: &SourceBinding) -> Result<()> {
        sqlx::query(
            "INSERT INTO source_bindings
                (id, business_id, source, external_id, match_confidence, first_seen_at, last_seen_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source, external_id) DO UPDATE SET
                business_id = excluded.business_id,
                match_confidence = excluded.match_confidence,
                last_seen_at = excluded.last_seen_at",
        )
        .bind(binding.id.to_string())
        .bind(binding.business_id.to_string())
        .bind(binding.source.as_str())
        .bind(&binding.external_id)
        .bind(binding.match_confidence as f64)
        .bind(binding.first_seen_at.to_rfc3339())
        .bind(binding.last_seen_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_binding(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<SourceBinding>> {
        let row = sqlx::query_as::<_, SourceBindingRow>(
            "SELECT id, business_id, source, external_id, match_confidence, first_seen_at, last_seen_at
             FROM source_bindings WHERE source = ? AND external_id = ?",
        )
        .bind(source.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_binding).transpose()
    }

    async fn list_bindings_for_business(&self, business_id: Uuid) -> Result<Vec<SourceBinding>> {
        let rows = sqlx::query_as::<_, SourceBindingRow>(
            "SELECT id, business_id, source, external_id, match_confidence, first_seen_at, last_seen_at
             FROM source_bindings WHERE business_id = ?",
        )
        .bind(business_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_binding).collect()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Business>, i64)> {
        let rows = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, address, lat, lng, phone, website, categories, hours,
                    is_bar, is_restaurant, price_level, rating, rating_google, rating_yelp,
                    review_count, merge_count, confidence, created_at, updated_at
             FROM businesses ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM businesses")
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(row_to_business).collect::<Result<Vec<_>>>()?, total.0))
    }

    async fn list_by_category(
        &self,
        category: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Business>, i64)> {
        let pattern = format!("%\"{category}\"%");

        let rows = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, name, address, lat, lng, phone, website, categories, hours,
                    is_bar, is_restaurant, price_level, rating, rating_google, rating_yelp,
                    review_count, merge_count, confidence, created_at, updated_at
             FROM businesses WHERE categories LIKE ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM businesses WHERE categories LIKE ?")
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok((rows.into_iter().map(row_to_business).collect::<Result<Vec<_>>>()?, total.0))
    }
}

pub struct SqlitePhotoRepository {
    pool: SqlitePool,
}

impl SqlitePhotoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_photo(row: PhotoRow) -> Result<Photo> {
    let status = match row.status.as_str() {
        "pending" => PhotoStatus::Pending,
        "processing" => PhotoStatus::Processing,
        "ready" => PhotoStatus::Ready,
        "failed" => PhotoStatus::Failed,
        other => return Err(IngestError::internal(format!("unknown photo status {other}"))),
    };
    let storage_keys_raw: std::collections::HashMap<String, String> =
        serde_json::from_value(row.storage_keys)?;
    let mut storage_keys = std::collections::HashMap::new();
    for (k, v) in storage_keys_raw {
        let variant = match k.as_str() {
            "thumbnail" => PhotoVariant::Thumbnail,
            "small" => PhotoVariant::Small,
            "medium" => PhotoVariant::Medium,
            "large" => PhotoVariant::Large,
            "original" => PhotoVariant::Original,
            other => return Err(IngestError::internal(format!("unknown photo variant {other}"))),
        };
        storage_keys.insert(variant, v);
    }

    Ok(Photo {
        id: Uuid::parse_str(&row.id).map_err(|e| IngestError::internal(e.to_string()))?,
        business_id: Uuid::parse_str(&row.business_id)
            .map_err(|e| IngestError::internal(e.to_string()))?,
        source_ref: row.source_ref,
        status,
        width: row.width.map(|w| w as u32),
        height: row.height.map(|h| h as u32),
        checksum_sha256: row.checksum_sha256,
        storage_keys,
        failure_reason: row.failure_reason,
        main_photo: row.main_photo,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

fn photo_status_str(status: PhotoStatus) -> &'static str {
    match status {
        PhotoStatus::Pending => "pending",
        PhotoStatus::Processing => "processing",
        PhotoStatus::Ready => "ready",
        PhotoStatus::Failed => "failed",
    }
}

fn storage_keys_to_json(
    photo: &Photo,
) -> Result<serde_json::Value> {
    let map: std::collections::HashMap<&'static str, &String> = photo
        .storage_keys
        .iter()
        .map(|(variant, key)| (variant.suffix().unwrap_or("original"), key))
        .collect();
    Ok(serde_json::to_value(map)?)
}

#[async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn insert(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            "INSERT INTO photos
                (id, business_id, source_ref, status, width, height, checksum_sha256,
                 storage_keys, failure_reason, main_photo, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(photo.id.to_string())
        .bind(photo.business_id.to_string())
        .bind(&photo.source_ref)
        .bind(photo_status_str(photo.status))
        .bind(photo.width.map(|w| w as i64))
        .bind(photo.height.map(|h| h as i64))
        .bind(&photo.checksum_sha256)
        .bind(storage_keys_to_json(photo)?)
        .bind(&photo.failure_reason)
        .bind(photo.main_photo)
        .bind(photo.created_at.to_rfc3339())
        .bind(photo.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            "UPDATE photos SET status = ?, width = ?, height = ?, checksum_sha256 = ?,
                storage_keys = ?, failure_reason = ?, main_photo = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(photo_status_str(photo.status))
        .bind(photo.width.map(|w| w as i64))
        .bind(photo.height.map(|h| h as i64))
        .bind(&photo.checksum_sha256)
        .bind(storage_keys_to_json(photo)?)
        .bind(&photo.failure_reason)
        .bind(photo.main_photo)
        .bind(photo.updated_at.to_rfc3339())
        .bind(photo.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_business(&self, business_id: Uuid) -> Result<Vec<Photo>> {
        let rows = sqlx::query_as::<_, PhotoRow>(
            "SELECT id, business_id, source_ref, status, width, height, checksum_sha256,
                    storage_keys, failure_reason, main_photo, created_at, updated_at
             FROM photos WHERE business_id = ?",
        )
        .bind(business_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_photo).collect()
    }
}

pub struct SqliteOperationRepository {
    pool: SqlitePool,
}

impl SqliteOperationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationRepository for SqliteOperationRepository {
    async fn record(&self, operation: &Operation) -> Result<()> {
        sqlx::query(
            "INSERT INTO operations
                (id, stage, status, entity_id, attempt, error_message, request_id,
                 started_at, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(operation.id.to_string())
        .bind(format!("{:?}", operation.stage).to_lowercase())
        .bind(format!("{:?}", operation.status).to_lowercase())
        .bind(operation.entity_id.to_string())
        .bind(operation.attempt as i64)
        .bind(&operation.error_message)
        .bind(&operation.request_id)
        .bind(operation.started_at.to_rfc3339())
        .bind(operation.finished_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct SqliteBudgetRepository {
    pool: SqlitePool,
}

impl SqliteBudgetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_budget(row: BudgetRow) -> Result<Budget> {
    Ok(Budget {
        period: row.period,
        monthly_limit_usd: row
            .monthly_limit_usd
            .parse::<Decimal>()
            .map_err(|e| IngestError::internal(e.to_string()))?,
        spent_usd: row
            .spent_usd
            .parse::<Decimal>()
            .map_err(|e| IngestError::internal(e.to_string()))?,
        alert_threshold: row.alert_threshold as f32,
        emergency_threshold: row.emergency_threshold as f32,
        emergency_mode: row.emergency_mode,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

#[async_trait]
impl BudgetRepository for SqliteBudgetRepository {
    async fn get(&self, period: &str) -> Result<Option<Budget>> {
        let row = sqlx::query_as::<_, BudgetRow>(
            "SELECT period, monthly_limit_usd, spent_usd, alert_threshold,
                    emergency_threshold, emergency_mode, updated_at
             FROM budgets WHERE period = ?",
        )
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_budget).transpose()
    }

    async fn upsert(&self, budget: &Budget) -> Result<()> {
        sqlx::query(
            "INSERT INTO budgets
                (period, monthly_limit_usd, spent_usd, alert_threshold, emergency_threshold,
                 emergency_mode, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(period) DO UPDATE SET
                spent_usd = excluded.spent_usd,
                emergency_mode = excluded.emergency_mode,
                updated_at = excluded.updated_at",
        )
        .bind(&budget.period)
        .bind(budget.monthly_limit_usd.to_string())
        .bind(budget.spent_usd.to_string())
        .bind(budget.alert_threshold as f64)
        .bind(budget.emergency_threshold as f64)
        .bind(budget.emergency_mode)
        .bind(budget.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Succeeded => "succeeded",
        JobStatus::Failed => "failed",
    }
}

fn row_to_job(row: JobRow) -> Result<Job> {
    let status = match row.status.as_str() {
        "pending" => JobStatus::Pending,
        "running" => JobStatus::Running,
        "succeeded" => JobStatus::Succeeded,
        "failed" => JobStatus::Failed,
        other => return Err(IngestError::internal(format!("unknown job status: {other}"))),
    };

    Ok(Job {
        id: Uuid::parse_str(&row.id).map_err(|e| IngestError::internal(e.to_string()))?,
        kind: serde_json::from_value(row.kind)?,
        status,
        attempt: row.attempt as u32,
        max_attempts: row.max_attempts as u32,
        last_error: row.last_error,
        run_after: parse_timestamp(&row.run_after)?,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

/// SQLite-backed durable job queue, persisting what `InMemoryJobQueue` keeps
/// in a `VecDeque` into the `jobs` table so queued work survives a restart.
pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        sqlx::query(
            "INSERT INTO jobs
                (id, kind, status, attempt, max_attempts, last_error, run_after, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(serde_json::to_value(&job.kind)?)
        .bind(job_status_str(job.status))
        .bind(job.attempt as i64)
        .bind(job.max_attempts as i64)
        .bind(&job.last_error)
        .bind(job.run_after.to_rfc3339())
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_ready(&self) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, kind, status, attempt, max_attempts, last_error, run_after, created_at, updated_at
             FROM jobs WHERE status = 'pending' AND run_after <= ?
             ORDER BY run_after ASC LIMIT 1",
        )
        .bind(now.to_rfc3339())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let new_attempt = row.attempt + 1;
        sqlx::query("UPDATE jobs SET status = 'running', attempt = ?, updated_at = ? WHERE id = ?")
            .bind(new_attempt)
            .bind(now.to_rfc3339())
            .bind(&row.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut job = row_to_job(row)?;
        job.status = JobStatus::Running;
        job.attempt = new_attempt as u32;
        job.updated_at = now;
        Ok(Some(job))
    }

    async fn complete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE jobs SET status = 'succeeded', updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(IngestError::JobNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: String, policy: &RetryPolicy) -> Result<()> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, kind, status, attempt, max_attempts, last_error, run_after, created_at, updated_at
             FROM jobs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| IngestError::JobNotFound(id.to_string()))?;

        let now = Utc::now();
        if policy.should_retry(row.attempt as u32) {
            let run_after = now + chrono::Duration::seconds(policy.delay_secs(row.attempt as u32) as i64);
            sqlx::query(
                "UPDATE jobs SET status = 'pending', last_error = ?, run_after = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&error)
            .bind(run_after.to_rfc3339())
            .bind(now.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE jobs SET status = 'failed', last_error = ?, updated_at = ? WHERE id = ?")
                .bind(&error)
                .bind(now.to_rfc3339())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn depth(&self) -> usize {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0) as usize
    }

    async fn stats(&self) -> QueueStats {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .unwrap_or_default();

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            match status.as_str() {
                "pending" => stats.waiting = count as usize,
                "running" => stats.active = count as usize,
                "succeeded" => stats.completed = count as usize,
                "failed" => stats.failed = count as usize,
                _ => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod sqlite_job_queue_tests {
    use super::*;
    use crate::domain::source::CollectionJobKind;
    use crate::storage::database::{DatabaseConfig, SqlitePool as DbPool};

    async fn test_pool() -> SqlitePool {
        // A plain "sqlite::memory:" URL hands out a fresh, empty database per
        // connection, so the pool is pinned to a single connection here —
        // otherwise migrations applied on one connection would be invisible
        // to queries served from another.
        let mut config = DatabaseConfig::sqlite_memory();
        config.max_connections = 1;
        config.min_connections = 1;
        let pool = DbPool::new(&config).await.expect("in-memory pool with migrations");
        pool.pool().clone()
    }

    fn sample_job() -> Job {
        Job::new(
            CollectionJobKind::PlaceDetails { source: Source::Google, external_id: "abc123".to_string() },
            3,
        )
    }

    #[tokio::test]
    async fn enqueue_then_claim_returns_the_job_running() {
        let pool = test_pool().await;
        let queue = SqliteJobQueue::new(pool);
        let job = sample_job();
        let job_id = job.id;

        queue.enqueue(job).await.unwrap();
        assert_eq!(queue.depth().await, 1);

        let claimed = queue.claim_ready().await.unwrap().expect("job is ready");
        assert_eq!(claimed.id, job_id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempt, 1);
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn claim_ready_skips_jobs_not_yet_due() {
        let pool = test_pool().await;
        let queue = SqliteJobQueue::new(pool);
        let job = sample_job().with_stagger(60_000);

        queue.enqueue(job).await.unwrap();
        assert!(queue.claim_ready().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_marks_job_succeeded() {
        let pool = test_pool().await;
        let queue = SqliteJobQueue::new(pool);
        let job = sample_job();
        let job_id = job.id;

        queue.enqueue(job).await.unwrap();
        queue.claim_ready().await.unwrap();
        queue.complete(job_id).await.unwrap();

        let stats = queue.stats().await;
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.waiting, 0);
    }

    #[tokio::test]
    async fn complete_unknown_job_errors() {
        let pool = test_pool().await;
        let queue = SqliteJobQueue::new(pool);
        assert!(queue.complete(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn fail_reschedules_while_attempts_remain() {
        let pool = test_pool().await;
        let queue = SqliteJobQueue::new(pool);
        let job = sample_job();
        let job_id = job.id;
        let policy = RetryPolicy { jitter: false, ..RetryPolicy::default() };

        queue.enqueue(job).await.unwrap();
        queue.claim_ready().await.unwrap();
        queue.fail(job_id, "upstream timeout".to_string(), &policy).await.unwrap();

        let stats = queue.stats().await;
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.failed, 0);
        assert!(queue.claim_ready().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_moves_to_failed_once_attempts_are_exhausted() {
        let pool = test_pool().await;
        let queue = SqliteJobQueue::new(pool);
        let job = sample_job();
        let job_id = job.id;
        let policy = RetryPolicy { max_attempts: 1, jitter: false, ..RetryPolicy::default() };

        queue.enqueue(job).await.unwrap();
        queue.claim_ready().await.unwrap();
        queue.fail(job_id, "permanent failure".to_string(), &policy).await.unwrap();

        let stats = queue.stats().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.waiting, 0);
    }

    #[tokio::test]
    async fn claim_ready_is_fifo_by_run_after() {
        let pool = test_pool().await;
        let queue = SqliteJobQueue::new(pool);

        let older = sample_job();
        let older_id = older.id;
        let newer = sample_job().with_stagger(1_000);

        queue.enqueue(newer).await.unwrap();
        queue.enqueue(older).await.unwrap();

        let claimed = queue.claim_ready().await.unwrap().expect("oldest job is ready");
        assert_eq!(claimed.id, older_id);
    }
}
