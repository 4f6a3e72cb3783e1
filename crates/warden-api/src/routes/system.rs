//! System endpoints: probes, the JWK set, and Prometheus metrics.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use warden_jose::JwkSet;

use crate::error::AppError;
use crate::state::AppState;

/// Public keys of all three pairs, for off-box verification.
#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    tag = "system",
    responses((status = 200, description = "JWK set with kids 1, 2 and 3")),
)]
pub async fn jwks(State(state): State<AppState>) -> Json<JwkSet> {
    Json(state.provider.jwks())
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "system",
    responses((status = 200, description = "Process is up")),
)]
pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP" }))
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "system",
    responses((status = 200, description = "Ready to serve traffic")),
)]
pub async fn readiness() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP" }))
}

/// Prometheus text exposition of the request and token counters.
pub async fn metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state
        .metrics
        .gather_and_encode()
        .map_err(AppError::Internal)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}
