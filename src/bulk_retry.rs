//! Bulk retry of failed links.

use crate::db::{Database, FailedSelection};
use crate::error::Result;
use crate::tracker::{DownloadTracker, RetryOutcome};
use crate::types::{Link, OwnerId, RetryItem, RetryReport, RetryRequest};
use std::sync::Arc;
use tracing::{error, info};

/// Error recorded for an item whose retry raised instead of producing an outcome
const RETRY_ERROR: &str = "retry failed due to an internal error";

/// Selects failed links and retries each one independently
pub struct BulkRetry {
    db: Arc<Database>,
    tracker: DownloadTracker,
}

impl BulkRetry {
    /// Create a coordinator over the given tracker
    pub fn new(db: Arc<Database>, tracker: DownloadTracker) -> Self {
        Self { db, tracker }
    }

    /// Retry the failed links `request` selects
    ///
    /// Explicit link IDs win over subscription IDs; empty lists count as absent.
    /// With `owner` set, only that owner's links are considered. Only links that
    /// are currently failed are ever selected.
    pub async fn retry(&self, owner: Option<OwnerId>, request: &RetryRequest) -> Result<RetryReport> {
        let selection = selection(request);
        let links = self.db.list_failed_links(owner, selection).await?;

        let mut report = RetryReport {
            total: links.len(),
            ..Default::default()
        };

        for link in links {
            let item = self.retry_one(link).await;
            if item.success {
                report.success += 1;
            } else {
                report.failed += 1;
            }
            report.details.push(item);
        }

        info!(
            total = report.total,
            success = report.success,
            failed = report.failed,
            "bulk retry finished"
        );
        Ok(report)
    }

    async fn retry_one(&self, link: Link) -> RetryItem {
        let (success, error) = match self.tracker.retry(&link).await {
            Ok(RetryOutcome::Submitted { .. }) => (true, None),
            Ok(RetryOutcome::Failed { reason }) => (false, Some(reason)),
            Ok(RetryOutcome::Rejected { status }) => {
                (false, Some(format!("link is {}, nothing to retry", status)))
            }
            Err(e) => {
                error!(link_id = %link.id, error = %e, "retry raised");
                (false, Some(RETRY_ERROR.to_string()))
            }
        };

        RetryItem {
            id: link.id,
            title: link.title,
            success,
            error,
        }
    }
}

fn selection(request: &RetryRequest) -> FailedSelection<'_> {
    match (&request.link_ids, &request.subscription_ids) {
        (Some(ids), _) if !ids.is_empty() => FailedSelection::Links(ids.as_slice()),
        (_, Some(ids)) if !ids.is_empty() => FailedSelection::Subscriptions(ids.as_slice()),
        _ => FailedSelection::All,
    }
}
