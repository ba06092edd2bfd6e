//! OpenAPI documentation and schema generation
//!
//! The OpenAPI document is generated at compile time by utoipa from the handler
//! annotations in [`routes`](crate::api::routes).

use utoipa::OpenApi;

/// OpenAPI documentation for the magnet-bridge REST API
///
/// Served at `/api/v1/openapi.json` and, when enabled, browsable at
/// `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "magnet-bridge REST API",
        version = "0.1.0",
        description = "Manage feed subscriptions and track the offline downloads of the magnet links they publish",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8787", description = "Local server")
    ),
    paths(
        // Subscriptions
        crate::api::routes::list_subscriptions,
        crate::api::routes::create_subscription,
        crate::api::routes::get_subscription,
        crate::api::routes::update_subscription,
        crate::api::routes::delete_subscription,
        crate::api::routes::toggle_subscription,
        crate::api::routes::refresh_subscription,

        // Links
        crate::api::routes::list_links,
        crate::api::routes::create_download,
        crate::api::routes::retry_links,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::trigger_sweep,
        crate::api::routes::preview_feed,
    ),
    components(schemas(
        crate::types::SubscriptionId,
        crate::types::LinkId,
        crate::types::OwnerId,
        crate::types::RefreshUnit,
        crate::types::DownloadStatus,
        crate::types::DownloadState,
        crate::types::Subscription,
        crate::types::NewSubscription,
        crate::types::SubscriptionPatch,
        crate::types::CandidateEntry,
        crate::types::Link,
        crate::types::LinkPage,
        crate::types::RefreshResult,
        crate::types::RefreshSummary,
        crate::types::DownloadPassReport,
        crate::types::SweepReport,
        crate::types::RetryRequest,
        crate::types::RetryItem,
        crate::types::RetryReport,

        crate::api::routes::DownloadStarted,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "subscriptions", description = "Feed subscriptions - Create, update, toggle, delete and refresh"),
        (name = "links", description = "Discovered magnet links - List, download and retry"),
        (name = "system", description = "System endpoints - Health, OpenAPI spec, sweeps, feed preview"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the `X-Api-Key` and `X-Owner-Id` header schemes
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
            );
            components.add_security_scheme(
                "owner",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Owner-Id"))),
            );
        }
    }
}
