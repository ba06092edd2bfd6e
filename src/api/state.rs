//! Application state for the API server

use crate::{Config, MagnetBridge};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request; both fields are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The bridge every handler delegates to
    pub bridge: Arc<MagnetBridge>,

    /// Configuration (read-only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(bridge: Arc<MagnetBridge>) -> Self {
        let config = bridge.config.clone();
        Self { bridge, config }
    }
}
