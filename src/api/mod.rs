//! API layer -- axum routes, handlers, and error mapping.

mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use self::state::AppState;
use crate::detect::DetectError;

/// Serialized size budget per metric point when sizing the body limit.
const BODY_BYTES_PER_POINT: usize = 512;
/// Room for the rest of the request (rules, thresholds, options).
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Largest request body accepted, derived from the configured batch limit.
pub fn body_limit(max_points: usize) -> usize {
    max_points
        .saturating_mul(BODY_BYTES_PER_POINT)
        .saturating_add(BODY_OVERHEAD_BYTES)
}

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.engine.defaults().max_points_per_request);
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request validation failed")]
    Validation(Vec<String>),

    #[error("request body too large")]
    PayloadTooLarge(String),

    #[error("detection did not finish before the request deadline")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DetectError> for ApiError {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::InvalidRequest { errors } => ApiError::Validation(errors),
            DetectError::Cancelled => ApiError::Timeout,
            DetectError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, errors.clone()),
            ApiError::PayloadTooLarge(detail) => (StatusCode::PAYLOAD_TOO_LARGE, vec![detail.clone()]),
            ApiError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, Vec::new()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "detection request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
            }
        };
        let message = match self {
            ApiError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
            "details": details,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));
        (status, body).into_response()
    }
}
