//! Subscription management handlers.

use super::{RefreshQuery, SubscriptionSearchQuery};
use crate::Result;
use crate::api::AppState;
use crate::api::auth::Owner;
use crate::types::{NewSubscription, RefreshResult, Subscription, SubscriptionId, SubscriptionPatch};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// GET /subscriptions - List the caller's subscriptions
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    params(SubscriptionSearchQuery),
    responses(
        (status = 200, description = "Subscriptions, newest first", body = Vec<Subscription>),
        (status = 401, description = "Missing or invalid owner"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<SubscriptionSearchQuery>,
) -> Result<Json<Vec<Subscription>>> {
    let subscriptions = state
        .bridge
        .list_subscriptions(owner, query.search.as_deref())
        .await?;
    Ok(Json(subscriptions))
}

/// POST /subscriptions - Create a subscription and its cloud folder
#[utoipa::path(
    post,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    request_body = NewSubscription,
    responses(
        (status = 201, description = "Subscription created", body = Subscription),
        (status = 400, description = "Invalid subscription", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid owner"),
        (status = 502, description = "Cloud folder could not be created", body = crate::error::ApiError)
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<NewSubscription>,
) -> Result<impl IntoResponse> {
    let subscription = state.bridge.create_subscription(owner, request).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// GET /subscriptions/:id - Get one subscription
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/{id}",
    tag = "subscriptions",
    params(("id" = i64, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Subscription", body = Subscription),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn get_subscription(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SubscriptionId>,
) -> Result<Json<Subscription>> {
    Ok(Json(state.bridge.get_subscription(owner, id).await?))
}

/// PUT /subscriptions/:id - Update a subscription
///
/// Absent fields are left unchanged.
#[utoipa::path(
    put,
    path = "/api/v1/subscriptions/{id}",
    tag = "subscriptions",
    params(("id" = i64, Path, description = "Subscription ID")),
    request_body = SubscriptionPatch,
    responses(
        (status = 200, description = "Updated subscription", body = Subscription),
        (status = 400, description = "Invalid update", body = crate::error::ApiError),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn update_subscription(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SubscriptionId>,
    Json(patch): Json<SubscriptionPatch>,
) -> Result<Json<Subscription>> {
    Ok(Json(state.bridge.update_subscription(owner, id, patch).await?))
}

/// DELETE /subscriptions/:id - Delete a subscription and its links
#[utoipa::path(
    delete,
    path = "/api/v1/subscriptions/{id}",
    tag = "subscriptions",
    params(("id" = i64, Path, description = "Subscription ID")),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn delete_subscription(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SubscriptionId>,
) -> Result<StatusCode> {
    state.bridge.delete_subscription(owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /subscriptions/:id/toggle - Flip the active flag
#[utoipa::path(
    patch,
    path = "/api/v1/subscriptions/{id}/toggle",
    tag = "subscriptions",
    params(("id" = i64, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Updated subscription", body = Subscription),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn toggle_subscription(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SubscriptionId>,
) -> Result<Json<Subscription>> {
    Ok(Json(state.bridge.toggle_subscription(owner, id).await?))
}

/// POST /subscriptions/:id/refresh - Refresh a subscription now
///
/// Feed failures are reported in the body with `success: false`, not as an
/// error status.
#[utoipa::path(
    post,
    path = "/api/v1/subscriptions/{id}/refresh",
    tag = "subscriptions",
    params(
        ("id" = i64, Path, description = "Subscription ID"),
        RefreshQuery
    ),
    responses(
        (status = 200, description = "Refresh outcome", body = RefreshResult),
        (status = 404, description = "Subscription not found", body = crate::error::ApiError)
    )
)]
pub async fn refresh_subscription(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<SubscriptionId>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<RefreshResult>> {
    Ok(Json(
        state
            .bridge
            .refresh_subscription(owner, id, query.force)
            .await?,
    ))
}
