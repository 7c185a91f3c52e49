//! The single error type every handler in this module returns. Mirrors the
//! teacher's `ingestion::webhook::AppError` pattern: one enum, one
//! `IntoResponse` impl, JSON body, rate-limit headers attached where they
//! apply.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::error::IngestError;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    RateLimited { retry_after_secs: u64, limit: u32, remaining: u32 },
    ShuttingDown,
    Internal(String),
}

impl ApiError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        ApiError::Validation(msg.into())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(msg) => ApiError::Validation(msg),
            IngestError::BusinessNotFound(id) => ApiError::NotFound(format!("business not found: {id}")),
            IngestError::PhotoNotFound(id) => ApiError::NotFound(format!("photo not found: {id}")),
            IngestError::RateLimited { retry_after_secs } => {
                ApiError::RateLimited { retry_after_secs, limit: 0, remaining: 0 }
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, rate_limit) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::RateLimited { retry_after_secs, limit, remaining } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
                Some((retry_after_secs, limit, remaining)),
            ),
            ApiError::ShuttingDown => {
                (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down".to_string(), None)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        let mut response = (status, body).into_response();

        if let Some((retry_after_secs, limit, remaining)) = rate_limit {
            let headers = response.headers_mut();
            headers.insert("Retry-After", retry_after_secs.to_string().parse().unwrap());
            headers.insert("X-RateLimit-Limit", limit.to_string().parse().unwrap());
            headers.insert("X-RateLimit-Remaining", remaining.to_string().parse().unwrap());
        }

        response
    }
}
