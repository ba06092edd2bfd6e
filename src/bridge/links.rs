//! Link listing, manual downloads, retries and feed preview.

use crate::error::{Error, LinkError, Result};
use crate::tracker::RetryOutcome;
use crate::types::{
    CandidateEntry, DownloadStatus, Link, LinkId, LinkQuery, OwnerId, Page, RefreshResult,
    RetryReport, RetryRequest, SubscriptionId,
};
use tracing::debug;

use super::MagnetBridge;
use super::subscriptions::validate_feed_url;

const MAX_PAGE_SIZE: u32 = 100;

impl MagnetBridge {
    /// List the owner's links, newest first
    ///
    /// Downloading links on the requested page are polled before the page is
    /// returned, so callers see their latest known state. Poll failures leave
    /// those links as they were.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for a page below 1 or a page size outside
    /// 1..=100, and [`Error::NotFound`] for a subscription the owner does not
    /// have.
    pub async fn list_links(&self, owner: OwnerId, query: &LinkQuery) -> Result<Page<Link>> {
        if query.page < 1 {
            return Err(Error::Validation("page must be at least 1".into()));
        }
        if query.page_size < 1 || query.page_size > MAX_PAGE_SIZE {
            return Err(Error::Validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if let Some(subscription_id) = query.subscription_id {
            self.get_subscription(owner, subscription_id).await?;
        }

        let limit = i64::from(query.page_size);
        let offset = i64::from(query.page - 1) * limit;
        let (items, total) = self
            .db
            .list_links(owner, query.subscription_id, limit, offset)
            .await?;

        let items = self.refresh_downloading(items).await?;

        Ok(Page {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    /// Poll downloading links in `items` and reload the ones that changed
    async fn refresh_downloading(&self, mut items: Vec<Link>) -> Result<Vec<Link>> {
        let report = self.reconciler.poll_links(&items).await;
        if report.polled == 0 {
            return Ok(items);
        }
        debug!(
            polled = report.polled,
            completed = report.completed,
            failed = report.failed,
            "read-triggered poll"
        );

        if report.completed + report.failed == 0 {
            return Ok(items);
        }
        for item in items
            .iter_mut()
            .filter(|l| l.state.status() == DownloadStatus::Downloading)
        {
            if let Some(current) = self.db.get_link(item.id).await? {
                *item = current;
            }
        }
        Ok(items)
    }

    /// Get one of the owner's links
    pub async fn get_link(&self, owner: OwnerId, id: LinkId) -> Result<Link> {
        self.db
            .get_owned_link(owner, id)
            .await?
            .ok_or(Error::Link(LinkError::NotFound { id: id.get() }))
    }

    /// Start (or restart) the download of one link
    ///
    /// Pending links are submitted; failed links go through the retry
    /// transition. Returns the remote task id.
    ///
    /// # Errors
    /// Returns [`LinkError::InvalidState`] if the link is already downloading
    /// or completed, and [`LinkError::SubmissionFailed`] if the submission
    /// failed (the link is then `failed` with the reason recorded).
    pub async fn create_download(&self, owner: OwnerId, id: LinkId) -> Result<i64> {
        let link = self.get_link(owner, id).await?;

        match self.tracker.retry(&link).await? {
            RetryOutcome::Submitted { task_id } => Ok(task_id),
            RetryOutcome::Failed { reason } => Err(Error::Link(LinkError::SubmissionFailed {
                id: id.get(),
                reason,
            })),
            RetryOutcome::Rejected { status } => Err(Error::Link(LinkError::InvalidState {
                id: id.get(),
                operation: "download".to_string(),
                current_state: status.to_string(),
            })),
        }
    }

    /// Retry failed links selected by `request`, restricted to the owner's links
    pub async fn retry_links(&self, owner: OwnerId, request: &RetryRequest) -> Result<RetryReport> {
        self.bulk_retry.retry(Some(owner), request).await
    }

    /// Retry failed links across all owners
    pub async fn retry_all_links(&self, request: &RetryRequest) -> Result<RetryReport> {
        self.bulk_retry.retry(None, request).await
    }

    /// Refresh one of the owner's subscriptions now
    ///
    /// Without `forced`, a subscription that is not due is reported as skipped.
    pub async fn refresh_subscription(
        &self,
        owner: OwnerId,
        id: SubscriptionId,
        forced: bool,
    ) -> Result<RefreshResult> {
        let subscription = self.get_subscription(owner, id).await?;
        Ok(self
            .reconciler
            .refresh_subscription(&subscription, forced)
            .await)
    }

    /// Fetch a feed and return its magnet candidates without storing anything
    ///
    /// Unreachable or unparseable feeds yield an empty list.
    pub async fn preview_feed(&self, url: &str) -> Result<Vec<CandidateEntry>> {
        validate_feed_url(url)?;
        Ok(self.feeds.parse_feed(url.trim()).await)
    }
}
