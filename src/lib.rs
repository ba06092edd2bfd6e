//! # magnet-bridge
//!
//! Watches RSS/Atom feeds for newly published magnet links and drives each one
//! through a cloud drive's offline-download API until it completes or fails.
//!
//! Each subscription points at a feed and a cloud folder. A periodic
//! reconciliation sweep:
//! 1. refreshes every due subscription, storing unseen magnet links as `pending`
//! 2. submits a bounded batch of pending links to the remote service
//! 3. polls every `downloading` link until the remote task succeeds or fails
//!
//! Failed links can be retried individually or in bulk.
//!
//! ## Quick Start
//!
//! ```no_run
//! use magnet_bridge::{Config, MagnetBridge};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.cloud.client_id = Some("client-id".to_string());
//!     config.cloud.client_secret = Some("client-secret".to_string());
//!
//!     let bridge = MagnetBridge::new(config).await?;
//!     let report = bridge.sweep().await?;
//!     println!("{} new links", report.refresh.total_new_items);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// The `MagnetBridge` facade
pub mod bridge;
/// Bulk retry of failed links
pub mod bulk_retry;
/// Subscription refresh timing
pub mod clock;
/// Cloud-drive offline-download client
pub mod cloud;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Feed entry deduplication
pub mod dedup;
/// Error types
pub mod error;
/// RSS/Atom feed parsing
pub mod feed;
/// Reconciliation sweeps
pub mod reconcile;
/// Periodic sweep scheduler
pub mod scheduler;
/// Per-link download state machine
pub mod tracker;
/// Core types
pub mod types;


// Re-export commonly used types
pub use bridge::MagnetBridge;
pub use cloud::{CloudClient, OfflineDownloads, RemoteTaskStatus};
pub use config::Config;
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, FeedError, LinkError, RemoteError, Result,
    ToHttpStatus,
};
pub use types::{
    CandidateEntry, DownloadState, DownloadStatus, Link, LinkId, NewSubscription, OwnerId,
    RefreshUnit, Subscription, SubscriptionId, SweepReport,
};

/// Run the bridge's scheduler and API server until a termination signal
///
/// Waits for SIGTERM/SIGINT (Ctrl+C elsewhere), lets the API server drain, then
/// stops the scheduler.
///
/// # Example
///
/// ```no_run
/// use magnet_bridge::{Config, MagnetBridge, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let bridge = MagnetBridge::new(Config::default()).await?;
///     run_with_shutdown(bridge).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(bridge: MagnetBridge) -> Result<()> {
    let bridge = std::sync::Arc::new(bridge);
    let scheduler = bridge.start_scheduler();

    let served = api::start_api_server(bridge.clone(), wait_for_signal()).await;

    bridge.shutdown();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "scheduler task ended abnormally");
        }
    }
    served
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
