//! The `MagnetBridge` facade.
//!
//! Everything the REST layer (or an embedding application) calls goes through
//! [`MagnetBridge`]. Methods are grouped by domain:
//! - [`subscriptions`] - owner-scoped subscription management
//! - [`links`] - listing, manual download, retry, feed preview
//! - [`lifecycle`] - sweeps, the background scheduler, shutdown

mod lifecycle;
mod links;
mod subscriptions;

use crate::bulk_retry::BulkRetry;
use crate::cloud::{CloudClient, OfflineDownloads};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::feed::FeedParser;
use crate::reconcile::Reconciler;
use crate::tracker::DownloadTracker;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires storage, feeds, the remote client and the reconciliation engine together
#[derive(Clone)]
pub struct MagnetBridge {
    /// Persistence layer
    pub db: Arc<Database>,
    /// Configuration the bridge was built from
    pub config: Arc<Config>,
    remote: Arc<dyn OfflineDownloads>,
    feeds: FeedParser,
    tracker: DownloadTracker,
    reconciler: Arc<Reconciler>,
    bulk_retry: Arc<BulkRetry>,
    cancel: CancellationToken,
}

impl MagnetBridge {
    /// Open the database and build a bridge that talks to the configured cloud API
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the database cannot be
    /// opened or migrated, or an HTTP client cannot be built.
    pub async fn new(config: Config) -> Result<Self> {
        let remote: Arc<dyn OfflineDownloads> = Arc::new(CloudClient::new(&config.cloud)?);
        Self::with_remote(config, remote).await
    }

    /// Build a bridge over an explicit remote client
    pub async fn with_remote(config: Config, remote: Arc<dyn OfflineDownloads>) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let feeds = FeedParser::new(&config.feeds)?;
        let tracker = DownloadTracker::new(db.clone(), remote.clone(), config.reconcile.claim_timeout);
        let reconciler = Arc::new(Reconciler::new(
            db.clone(),
            feeds.clone(),
            tracker.clone(),
            config.reconcile.clone(),
        ));
        let bulk_retry = Arc::new(BulkRetry::new(db.clone(), tracker.clone()));

        tracing::info!(
            database = %config.persistence.database_path.display(),
            "magnet bridge initialized"
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            remote,
            feeds,
            tracker,
            reconciler,
            bulk_retry,
            cancel: CancellationToken::new(),
        })
    }
}
