//! Ingestion-control HTTP API: enqueue collection jobs, inspect queue
//! depth, and browse the deduplicated catalog. Router composition follows
//! the teacher's webhook server (`ServiceBuilder` + `TraceLayer` +
//! `CorsLayer`, state threaded through `axum::extract::State`).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::collector::{resolve_city, AVAILABLE_CITIES, BULK_STAGGER_MILLIS};
use crate::domain::source::{CollectionJobKind, Source};
use crate::observability::ShutdownState;
use crate::queue::{Job, JobQueue};
use crate::storage::{BusinessRepository, PhotoRepository};

use super::errors::ApiError;
use super::models::*;
use super::rate_limit::{rate_limit_middleware, RateLimiter};

const DEFAULT_SEARCH_RADIUS_METERS: u32 = 1_500;
const MAX_RADIUS_METERS: f64 = 50_000.0;
const DEFAULT_COLLECTION_ATTEMPTS: u32 = 3;
const DEFAULT_CATEGORY_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn JobQueue>,
    pub businesses: Arc<dyn BusinessRepository>,
    pub photos: Arc<dyn PhotoRepository>,
    pub shutdown: ShutdownState,
}

pub fn create_routes(state: AppState, rate_limiter: RateLimiter, frontend_url: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(frontend_url.parse().expect("valid FRONTEND_URL")))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let rate_limited = Router::new()
        .route("/data-collection/google/search", post(search_nearby))
        .route("/data-collection/google/search/bulk", post(search_bulk))
        .route("/data-collection/google/search/city", post(search_city))
        .route("/data-collection/google/queue/stats", get(queue_stats))
        .route("/businesses", get(list_businesses))
        .route("/businesses/:id", get(get_business))
        .route("/businesses/search/location", get(search_location))
        .route("/businesses/search/category/:category", get(search_by_category))
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(rate_limited)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO)))
                .layer(cors),
        )
}

fn validate_lat_lng(lat: f64, lng: f64) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::validation(format!("latitude {lat} out of range [-90, 90]")));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::validation(format!("longitude {lng} out of range [-180, 180]")));
    }
    Ok(())
}

fn validate_radius_meters(radius: f64) -> Result<(), ApiError> {
    if !(radius > 0.0 && radius <= MAX_RADIUS_METERS) {
        return Err(ApiError::validation(format!(
            "radius {radius}m out of range (0, {MAX_RADIUS_METERS}]"
        )));
    }
    Ok(())
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if state.shutdown.is_shutting_down() {
        return Err(ApiError::ShuttingDown);
    }
    Ok((StatusCode::OK, Json(serde_json::json!({"status": "healthy", "service": "venue-ingest"}))))
}

async fn search_nearby(
    State(state): State<AppState>,
    Json(req): Json<SearchNearbyRequest>,
) -> Result<(StatusCode, Json<SearchNearbyResponse>), ApiError> {
    validate_lat_lng(req.latitude, req.longitude)?;
    let radius = req.radius.unwrap_or(DEFAULT_SEARCH_RADIUS_METERS);
    validate_radius_meters(radius as f64)?;

    let job = Job::new(
        CollectionJobKind::SearchNearby {
            source: Source::Google,
            lat: req.latitude,
            lng: req.longitude,
            radius_meters: radius,
        },
        DEFAULT_COLLECTION_ATTEMPTS,
    );
    let job_id = job.id;
    state.queue.enqueue(job).await?;

    info!(job_id = %job_id, lat = req.latitude, lng = req.longitude, "enqueued searchNearby job");
    Ok((StatusCode::ACCEPTED, Json(SearchNearbyResponse { job_id, status: "queued" })))
}

async fn search_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkSearchRequest>,
) -> Result<(StatusCode, Json<BulkSearchResponse>), ApiError> {
    let mut job_ids = Vec::with_capacity(req.locations.len());

    for (index, location) in req.locations.iter().enumerate() {
        validate_lat_lng(location.latitude, location.longitude)?;
        let radius = location.options.as_ref().and_then(|o| o.radius).unwrap_or(DEFAULT_SEARCH_RADIUS_METERS);
        validate_radius_meters(radius as f64)?;

        let job = Job::new(
            CollectionJobKind::SearchNearby {
                source: Source::Google,
                lat: location.latitude,
                lng: location.longitude,
                radius_meters: radius,
            },
            DEFAULT_COLLECTION_ATTEMPTS,
        )
        .with_stagger(index as i64 * BULK_STAGGER_MILLIS);

        job_ids.push(job.id);
        state.queue.enqueue(job).await?;
    }

    info!(count = job_ids.len(), "enqueued bulk searchNearby jobs");
    Ok((StatusCode::ACCEPTED, Json(BulkSearchResponse { count: job_ids.len(), job_ids })))
}

async fn search_city(
    State(state): State<AppState>,
    Json(req): Json<CitySearchRequest>,
) -> Result<(StatusCode, Json<BulkSearchResponse>), (StatusCode, Json<CityNotFoundResponse>)> {
    let Some(seeds) = resolve_city(&req.city) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(CityNotFoundResponse { available_cities: AVAILABLE_CITIES.to_vec() }),
        ));
    };

    let mut job_ids = Vec::with_capacity(seeds.len());
    for (index, (lat, lng)) in seeds.into_iter().enumerate() {
        let job = Job::new(
            CollectionJobKind::SearchNearby {
                source: Source::Google,
                lat,
                lng,
                radius_meters: DEFAULT_SEARCH_RADIUS_METERS,
            },
            DEFAULT_COLLECTION_ATTEMPTS,
        )
        .with_stagger(index as i64 * BULK_STAGGER_MILLIS);

        job_ids.push(job.id);
        if state.queue.enqueue(job).await.is_err() {
            break;
        }
    }

    info!(city = %req.city, count = job_ids.len(), "enqueued city search jobs");
    Ok((StatusCode::ACCEPTED, Json(BulkSearchResponse { count: job_ids.len(), job_ids })))
}

async fn queue_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.queue.stats().await)
}

async fn list_businesses(
    State(state): State<AppState>,
    Query(query): Query<BusinessListQuery>,
) -> Result<Json<BusinessListResponse>, ApiError> {
    let limit = query.limit.clamp(1, 200);
    let offset = query.effective_offset();
    let (mut businesses, total_count) = state.businesses.list(limit, offset).await?;

    if query.with_photos_only {
        let mut with_photos = Vec::with_capacity(businesses.len());
        for business in businesses.into_iter() {
            if !state.photos.list_for_business(business.id).await?.is_empty() {
                with_photos.push(business);
            }
        }
        businesses = with_photos;
    }

    Ok(Json(BusinessListResponse::new(businesses, total_count, limit, offset)))
}

async fn get_business(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<crate::domain::business::Business>, ApiError> {
    state
        .businesses
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("business not found: {id}")))
}

async fn search_location(
    State(state): State<AppState>,
    Query(query): Query<LocationSearchQuery>,
) -> Result<Json<LocationSearchResponse>, ApiError> {
    validate_lat_lng(query.lat, query.lng)?;
    let radius_meters = query.radius * 1_000.0;
    validate_radius_meters(radius_meters)?;

    let mut results = state
        .businesses
        .find_near(crate::domain::standardized::GeoPoint { lat: query.lat, lng: query.lng }, radius_meters)
        .await?;

    if let Some(limit) = query.limit {
        results.truncate(limit);
    }

    // `withDealsOnly` is accepted but not yet enforced: no `DealRepository`
    // exists to join against.
    Ok(Json(LocationSearchResponse {
        count: results.len(),
        results,
        search_criteria: LocationSearchCriteria {
            lat: query.lat,
            lng: query.lng,
            radius_km: query.radius,
            with_deals_only: query.with_deals_only,
        },
    }))
}

async fn search_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<CategorySearchQuery>,
) -> Result<Json<CategorySearchResponse>, ApiError> {
    let (mut results, _total) = state
        .businesses
        .list_by_category(&category, DEFAULT_CATEGORY_PAGE_SIZE, 0)
        .await?;

    if let Some(is_bar) = query.is_bar {
        results.retain(|b| b.is_bar == is_bar);
    }
    if let Some(is_restaurant) = query.is_restaurant {
        results.retain(|b| b.is_restaurant == is_restaurant);
    }

    Ok(Json(CategorySearchResponse {
        count: results.len(),
        results,
        category,
        filters: CategorySearchFilters {
            is_bar: query.is_bar,
            is_restaurant: query.is_restaurant,
            with_deals_only: query.with_deals_only,
        },
    }))
}
