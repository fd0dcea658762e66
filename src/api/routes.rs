//! API route definitions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::state::AppState;
use super::ApiError;
use crate::detect::request::{Action, DetectionRequest, DetectionResponse};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/anomaly-detection", post(detect))
        .route("/anomaly-detection/defaults", get(defaults))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn detect(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let Json(body) = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(e.body_text())
        } else {
            ApiError::Validation(vec![format!("body: {}", e.body_text())])
        }
    })?;
    let request: DetectionRequest =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(vec![format!("body: {}", e)]))?;

    let response = run_engine(&state, request).await?;
    Ok(Json(response))
}

async fn defaults(State(state): State<AppState>) -> Result<Json<DetectionResponse>, ApiError> {
    let response = run_engine(&state, DetectionRequest::new(Action::Configure)).await?;
    Ok(Json(response))
}

/// Run the engine on the blocking pool, cancelling it once the request
/// deadline passes.
async fn run_engine(state: &AppState, request: DetectionRequest) -> Result<DetectionResponse, ApiError> {
    let action = request.action;
    let points = request.data.len();
    info!(%action, points, "detection request received");

    let token = CancellationToken::new();
    let deadline = {
        let token = token.clone();
        let timeout = state.request_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(?timeout, "detection deadline reached, cancelling");
            token.cancel();
        })
    };

    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || engine.handle(request, Utc::now(), &token)).await;
    deadline.abort();

    let response = result.map_err(|e| ApiError::Internal(format!("detection task failed: {}", e)))??;
    Ok(response)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
