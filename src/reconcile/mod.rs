//! Reconciliation sweep.
//!
//! One sweep does three passes:
//!
//! 1. refresh every active subscription that is due, inserting new feed
//!    entries as pending links;
//! 2. claim and submit a bounded batch of pending links;
//! 3. poll every downloading link and record remote verdicts.
//!
//! Each pass works in fixed-size chunks; one chunk fully settles before the
//! next starts. Per-item failures are recorded in the report and never abort
//! the pass. Only failing to read the work list itself fails a sweep.

mod guard;

pub use guard::{SweepGuard, SweepPermit};

use crate::clock;
use crate::config::ReconcileConfig;
use crate::db::Database;
use crate::dedup;
use crate::error::{Error, Result};
use crate::feed::FeedParser;
use crate::tracker::{DownloadTracker, PollOutcome, SubmitOutcome};
use crate::types::{
    DownloadPassReport, DownloadStatus, Link, RefreshResult, RefreshSummary, Subscription,
    SweepReport,
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives subscriptions and links toward their remote state
pub struct Reconciler {
    db: Arc<Database>,
    feeds: FeedParser,
    tracker: DownloadTracker,
    config: ReconcileConfig,
    guard: SweepGuard,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(
        db: Arc<Database>,
        feeds: FeedParser,
        tracker: DownloadTracker,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            db,
            feeds,
            tracker,
            config,
            guard: SweepGuard::new(),
        }
    }

    /// Run one full sweep
    ///
    /// # Errors
    /// Returns [`Error::SweepInProgress`] if another sweep is running, or a
    /// database error if the subscription or link lists cannot be read.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let _permit = self.guard.try_acquire().ok_or(Error::SweepInProgress)?;
        let started = std::time::Instant::now();

        let refresh = self.refresh_all(false).await?;
        let downloads = self.process_downloads().await?;

        info!(
            subscriptions = refresh.total,
            refreshed = refresh.success,
            failed = refresh.failed,
            skipped = refresh.skipped,
            new_items = refresh.total_new_items,
            submitted = downloads.submitted,
            submit_failed = downloads.submit_failed,
            completed = downloads.completed,
            download_failed = downloads.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep finished"
        );

        Ok(SweepReport { refresh, downloads })
    }

    /// Whether a sweep is currently running
    pub fn is_sweeping(&self) -> bool {
        self.guard.is_running()
    }

    /// Refresh every active subscription that is due (or all when `forced`)
    pub async fn refresh_all(&self, forced: bool) -> Result<RefreshSummary> {
        let subscriptions = self.db.list_active_subscriptions().await?;
        let mut results = Vec::with_capacity(subscriptions.len());

        for chunk in subscriptions.chunks(self.config.refresh_concurrency.max(1)) {
            let batch = join_all(chunk.iter().map(|s| self.refresh_subscription(s, forced))).await;
            results.extend(batch);
        }

        Ok(RefreshSummary::from_results(results))
    }

    /// Parse, dedup and persist one subscription's feed
    ///
    /// `last_refresh` only moves after the fetch, dedup and insert all
    /// succeeded, including when nothing was new.
    pub async fn refresh_subscription(&self, subscription: &Subscription, forced: bool) -> RefreshResult {
        let now = Utc::now();
        if !clock::is_due(subscription, now, forced) {
            debug!(subscription_id = %subscription.id, "subscription not due, skipping");
            return RefreshResult::skipped(subscription.id);
        }

        match self.ingest(subscription).await {
            Ok(new_items) => {
                if new_items > 0 {
                    info!(subscription_id = %subscription.id, new_items, "new feed entries stored");
                }
                RefreshResult::refreshed(subscription.id, new_items)
            }
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    url = %subscription.feed_url,
                    error = %e,
                    "subscription refresh failed"
                );
                RefreshResult::failed(subscription.id, e.to_string())
            }
        }
    }

    async fn ingest(&self, subscription: &Subscription) -> Result<usize> {
        let entries = self.feeds.fetch(&subscription.feed_url).await?;
        let existing = self.db.get_magnet_uris(subscription.id).await?;
        let fresh = dedup::new_entries(entries, &existing);

        let inserted = if fresh.is_empty() {
            0
        } else {
            self.db.insert_links(subscription.id, &fresh).await?
        };

        self.db.touch_last_refresh(subscription.id, Utc::now()).await?;
        Ok(inserted)
    }

    /// Submit a bounded batch of pending links, then poll every downloading link
    pub async fn process_downloads(&self) -> Result<DownloadPassReport> {
        let mut report = DownloadPassReport::default();

        let pending = self
            .db
            .list_claimable_links(
                self.config.pending_batch_limit as i64,
                self.config.claim_timeout,
            )
            .await?;
        self.submit_links(&pending, &mut report).await;

        let downloading = self.db.list_downloading_links().await?;
        self.poll_into(&downloading, &mut report).await;

        Ok(report)
    }

    async fn submit_links(&self, links: &[Link], report: &mut DownloadPassReport) {
        let chunks: Vec<&[Link]> = links
            .chunks(self.config.submit_concurrency.max(1))
            .collect();

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !self.config.submit_batch_delay.is_zero() {
                tokio::time::sleep(self.config.submit_batch_delay).await;
            }

            let outcomes = join_all(chunk.iter().map(|link| self.tracker.submit(link))).await;
            for (link, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(SubmitOutcome::Submitted { .. }) => report.submitted += 1,
                    Ok(SubmitOutcome::Failed { .. }) => report.submit_failed += 1,
                    Ok(SubmitOutcome::AlreadyClaimed) => report.already_claimed += 1,
                    Err(e) => {
                        error!(link_id = %link.id, error = %e, "failed to record submission");
                        report.submit_failed += 1;
                    }
                }
            }
        }
    }

    /// Poll the given links, skipping any that are not downloading
    ///
    /// Used by the sweep and by read-triggered polling when links are listed.
    pub async fn poll_links(&self, links: &[Link]) -> DownloadPassReport {
        let downloading: Vec<Link> = links
            .iter()
            .filter(|l| l.state.status() == DownloadStatus::Downloading)
            .cloned()
            .collect();

        let mut report = DownloadPassReport::default();
        self.poll_into(&downloading, &mut report).await;
        report
    }

    async fn poll_into(&self, links: &[Link], report: &mut DownloadPassReport) {
        for chunk in links.chunks(self.config.poll_concurrency.max(1)) {
            let outcomes = join_all(chunk.iter().map(|link| self.tracker.poll(link))).await;
            for (link, outcome) in chunk.iter().zip(outcomes) {
                report.polled += 1;
                match outcome {
                    Ok(PollOutcome::InProgress) => report.in_progress += 1,
                    Ok(PollOutcome::Stale) => {}
                    Ok(PollOutcome::Completed { .. }) => report.completed += 1,
                    Ok(PollOutcome::Failed { .. }) => report.failed += 1,
                    Err(e) => {
                        warn!(link_id = %link.id, error = %e, "status poll failed");
                        report.poll_errors += 1;
                    }
                }
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
