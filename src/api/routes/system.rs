//! System handlers: health, OpenAPI, sweeps and feed preview.

use super::PreviewQuery;
use crate::Result;
use crate::api::AppState;
use crate::types::{CandidateEntry, SweepReport};
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sweeping": state.bridge.is_sweeping(),
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/api/v1/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI 3 specification")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// POST /sweep - Run one reconciliation sweep now
#[utoipa::path(
    post,
    path = "/api/v1/sweep",
    tag = "system",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 409, description = "A sweep is already running", body = crate::error::ApiError)
    )
)]
pub async fn trigger_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    Ok(Json(state.bridge.sweep().await?))
}

/// GET /feeds/preview - Fetch a feed and list its magnet entries without storing them
///
/// Unreachable or unparseable feeds yield an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/feeds/preview",
    tag = "system",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Magnet entries in feed order", body = Vec<CandidateEntry>),
        (status = 400, description = "Invalid feed URL", body = crate::error::ApiError)
    )
)]
pub async fn preview_feed(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<Vec<CandidateEntry>>> {
    Ok(Json(state.bridge.preview_feed(&query.url).await?))
}
