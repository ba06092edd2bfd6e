//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`subscriptions`] - Owner-scoped subscription management and manual refresh
//! - [`links`] - Link listing, manual downloads and bulk retry
//! - [`system`] - Health, OpenAPI, sweeps and feed preview

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

mod links;
mod subscriptions;
mod system;

pub use links::*;
pub use subscriptions::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /subscriptions
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubscriptionSearchQuery {
    /// Case-insensitive match on the parent or subscription folder name
    pub search: Option<String>,
}

/// Query parameters for POST /subscriptions/:id/refresh
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RefreshQuery {
    /// Refresh even if the subscription is not due (default: false)
    #[serde(default)]
    pub force: bool,
}

/// Query parameters for GET /feeds/preview
#[derive(Debug, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    /// Feed URL to fetch
    pub url: String,
}

/// Response for POST /links/:id/download
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DownloadStarted {
    /// Link that was submitted
    pub link_id: crate::types::LinkId,
    /// Remote offline-download task id
    pub task_id: i64,
}
