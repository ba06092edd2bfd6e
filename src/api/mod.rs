//! REST API server module
//!
//! An OpenAPI 3 documented REST surface over [`MagnetBridge`]. Every route
//! lives under `/api/v1`. Owner-scoped routes read the caller from the
//! `X-Owner-Id` header; a shared `X-Api-Key` can additionally be required.

use crate::{MagnetBridge, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Subscriptions
/// - `GET /subscriptions` - List subscriptions (optional `search`)
/// - `POST /subscriptions` - Create subscription and its cloud folder
/// - `GET /subscriptions/:id` - Get subscription
/// - `PUT /subscriptions/:id` - Update subscription
/// - `DELETE /subscriptions/:id` - Delete subscription and its links
/// - `PATCH /subscriptions/:id/toggle` - Flip the active flag
/// - `POST /subscriptions/:id/refresh` - Refresh now (`force=true` ignores the interval)
///
/// ## Links
/// - `GET /links` - List links (paged, optional `subscription_id`)
/// - `POST /links/:id/download` - Submit one link
/// - `POST /links/retry` - Retry failed links
///
/// ## System
/// - `POST /sweep` - Run one reconciliation sweep
/// - `GET /feeds/preview` - Preview a feed's magnet entries
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation, fed from `/api-docs/openapi.json` (if enabled)
pub fn create_router(bridge: Arc<MagnetBridge>) -> Router {
    let state = AppState::new(bridge);
    let api_config = &state.config.api;

    let api = Router::new()
        // Subscriptions
        .route(
            "/subscriptions",
            get(routes::list_subscriptions).post(routes::create_subscription),
        )
        .route(
            "/subscriptions/:id",
            get(routes::get_subscription)
                .put(routes::update_subscription)
                .delete(routes::delete_subscription),
        )
        .route(
            "/subscriptions/:id/toggle",
            patch(routes::toggle_subscription),
        )
        .route(
            "/subscriptions/:id/refresh",
            post(routes::refresh_subscription),
        )
        // Links
        .route("/links", get(routes::list_links))
        .route("/links/retry", post(routes::retry_links))
        .route("/links/:id/download", post(routes::create_download))
        // System
        .route("/sweep", post(routes::trigger_sweep))
        .route("/feeds/preview", get(routes::preview_feed))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    let router = Router::new().nest("/api/v1", api);

    let router = if api_config.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = if api_config.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            api_config.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    let router = if api_config.cors_enabled {
        router.layer(build_cors_layer(&api_config.cors_origins))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on the configured bind address until `shutdown` resolves
///
/// In-flight requests are allowed to finish once `shutdown` completes.
pub async fn start_api_server<F>(bridge: Arc<MagnetBridge>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = bridge.config.api.bind_address;
    let app = create_router(bridge);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
