//! Link handlers.

use super::DownloadStarted;
use crate::Result;
use crate::api::AppState;
use crate::api::auth::Owner;
use crate::types::{Link, LinkId, LinkQuery, Page, RetryReport, RetryRequest};
use axum::{
    Json,
    extract::{Path, Query, State},
};

/// GET /links - List the caller's links, newest first
///
/// Downloading links on the page are polled before the page is returned.
#[utoipa::path(
    get,
    path = "/api/v1/links",
    tag = "links",
    params(LinkQuery),
    responses(
        (status = 200, description = "One page of links", body = crate::types::LinkPage),
        (status = 400, description = "Invalid paging", body = crate::error::ApiError),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn list_links(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<LinkQuery>,
) -> Result<Json<Page<Link>>> {
    Ok(Json(state.bridge.list_links(owner, &query).await?))
}

/// POST /links/:id/download - Submit one link now
#[utoipa::path(
    post,
    path = "/api/v1/links/{id}/download",
    tag = "links",
    params(("id" = i64, Path, description = "Link ID")),
    responses(
        (status = 200, description = "Remote task created", body = DownloadStarted),
        (status = 404, description = "Link not found", body = crate::error::ApiError),
        (status = 409, description = "Link is already downloading or completed", body = crate::error::ApiError),
        (status = 502, description = "Submission failed; the link is now failed", body = crate::error::ApiError)
    )
)]
pub async fn create_download(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<LinkId>,
) -> Result<Json<DownloadStarted>> {
    let task_id = state.bridge.create_download(owner, id).await?;
    Ok(Json(DownloadStarted {
        link_id: id,
        task_id,
    }))
}

/// POST /links/retry - Retry failed links
///
/// `link_ids` wins over `subscription_ids`; with neither, every failed link
/// of the caller is retried.
#[utoipa::path(
    post,
    path = "/api/v1/links/retry",
    tag = "links",
    request_body = RetryRequest,
    responses(
        (status = 200, description = "Per-link retry outcomes", body = RetryReport)
    )
)]
pub async fn retry_links(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<RetryRequest>,
) -> Result<Json<RetryReport>> {
    Ok(Json(state.bridge.retry_links(owner, &request).await?))
}
