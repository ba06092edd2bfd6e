//! Download state machine for a single tracked link.
//!
//! Transitions:
//!
//! ```text
//! pending --submit--> downloading | failed
//! downloading --poll--> downloading | completed | failed
//! failed --retry--> pending --submit--> downloading | failed
//! ```
//!
//! Every transition is one conditional update in [`Database`], keyed by the
//! link ID and the status the transition expects. Remote failures during
//! submission become a terminal `failed` state; remote failures during polling
//! leave the link untouched so the next poll can try again.

use crate::cloud::{OfflineDownloads, RemoteTaskStatus};
use crate::db::Database;
use crate::error::{Error, LinkError, Result};
use crate::types::{DownloadState, DownloadStatus, Link, LinkId};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Failure reason stored when the remote reports a failed task without one
pub const DEFAULT_FAIL_REASON: &str = "remote download task failed";

/// Result of driving a pending link through submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Link is now downloading
    Submitted {
        /// Remote task identifier
        task_id: i64,
    },
    /// Link is now failed
    Failed {
        /// Stored failure reason
        reason: String,
    },
    /// Another worker holds the claim, or the link is no longer pending
    AlreadyClaimed,
}

/// Result of polling a downloading link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Remote task still running; link unchanged
    InProgress,
    /// Link is now completed
    Completed {
        /// Remote file identifier
        file_id: i64,
    },
    /// Link is now failed
    Failed {
        /// Stored failure reason
        reason: String,
    },
    /// The link left `downloading` before the verdict could be recorded
    Stale,
}

/// Result of a retry request for one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Resubmitted; link is downloading again
    Submitted {
        /// New remote task identifier
        task_id: i64,
    },
    /// Resubmission failed; link is failed with a new reason
    Failed {
        /// Stored failure reason
        reason: String,
    },
    /// Nothing to do: the link is downloading or completed (or was claimed by
    /// a concurrent sweep)
    Rejected {
        /// Status the link was in
        status: DownloadStatus,
    },
}

/// Drives links through their download lifecycle
#[derive(Clone)]
pub struct DownloadTracker {
    db: Arc<Database>,
    remote: Arc<dyn OfflineDownloads>,
    claim_timeout: Duration,
}

impl DownloadTracker {
    /// Create a tracker over the given store and remote client
    pub fn new(db: Arc<Database>, remote: Arc<dyn OfflineDownloads>, claim_timeout: Duration) -> Self {
        Self {
            db,
            remote,
            claim_timeout,
        }
    }

    /// Claim a pending link and submit it
    ///
    /// Returns [`SubmitOutcome::AlreadyClaimed`] without contacting the remote
    /// when the claim does not apply.
    pub async fn submit(&self, link: &Link) -> Result<SubmitOutcome> {
        if !self.db.claim_pending_link(link.id, self.claim_timeout).await? {
            debug!(link_id = %link.id, "link already claimed, skipping");
            return Ok(SubmitOutcome::AlreadyClaimed);
        }

        self.submit_claimed(link).await
    }

    /// Submit a link whose claim is already held
    ///
    /// A storage error releases the claim so the next sweep can pick the link
    /// up again instead of waiting out the claim timeout.
    async fn submit_claimed(&self, link: &Link) -> Result<SubmitOutcome> {
        let result = self.submit_and_record(link).await;
        if let Err(e) = &result {
            warn!(link_id = %link.id, error = %e, "submission not recorded, releasing claim");
            if let Err(release_err) = self.db.release_link_claim(link.id).await {
                warn!(link_id = %link.id, error = %release_err, "failed to release link claim");
            }
        }
        result
    }

    async fn submit_and_record(&self, link: &Link) -> Result<SubmitOutcome> {
        let folder_id = match self.target_folder(link).await {
            Ok(folder_id) => folder_id,
            Err(reason) => return self.record_submit_failure(link, reason).await,
        };

        match self.remote.resolve_and_submit(&link.magnet_uri, folder_id).await {
            Ok(task_id) => {
                if self.db.mark_link_downloading(link.id, task_id, Utc::now()).await? {
                    info!(link_id = %link.id, task_id, title = %link.title, "link submitted");
                    Ok(SubmitOutcome::Submitted { task_id })
                } else {
                    warn!(
                        link_id = %link.id,
                        task_id,
                        "link left pending while submitting; remote task is orphaned"
                    );
                    Ok(SubmitOutcome::AlreadyClaimed)
                }
            }
            Err(e) => self.record_submit_failure(link, e.to_string()).await,
        }
    }

    async fn target_folder(&self, link: &Link) -> std::result::Result<i64, String> {
        let subscription = self
            .db
            .get_subscription(link.subscription_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("subscription {} no longer exists", link.subscription_id))?;

        subscription
            .cloud_folder_id
            .ok_or_else(|| format!("subscription {} has no cloud folder", subscription.id))
    }

    async fn record_submit_failure(&self, link: &Link, reason: String) -> Result<SubmitOutcome> {
        warn!(link_id = %link.id, title = %link.title, error = %reason, "link submission failed");

        if self
            .db
            .mark_link_submit_failed(link.id, &reason, Utc::now())
            .await?
        {
            Ok(SubmitOutcome::Failed { reason })
        } else {
            Ok(SubmitOutcome::AlreadyClaimed)
        }
    }

    /// Poll the remote task of a downloading link and record the verdict
    ///
    /// # Errors
    /// Returns [`LinkError::InvalidState`] if the link is not downloading and
    /// [`Error::Remote`] if the status could not be read; the link is left
    /// unchanged in both cases.
    pub async fn poll(&self, link: &Link) -> Result<PollOutcome> {
        let DownloadState::Downloading { task_id, .. } = link.state else {
            return Err(invalid_state(link, "poll"));
        };

        let status = self.remote.poll_status(task_id).await?;

        match status {
            RemoteTaskStatus::InProgress { progress } => {
                debug!(link_id = %link.id, task_id, ?progress, "remote task in progress");
                Ok(PollOutcome::InProgress)
            }
            RemoteTaskStatus::Succeeded { file_id } => {
                if self.db.mark_link_completed(link.id, file_id, Utc::now()).await? {
                    info!(link_id = %link.id, task_id, file_id, "download completed");
                    Ok(PollOutcome::Completed { file_id })
                } else {
                    Ok(PollOutcome::Stale)
                }
            }
            RemoteTaskStatus::Failed { reason } => {
                let reason = reason.unwrap_or_else(|| DEFAULT_FAIL_REASON.to_string());
                if self.db.mark_link_failed(link.id, &reason, Utc::now()).await? {
                    warn!(link_id = %link.id, task_id, error = %reason, "download failed remotely");
                    Ok(PollOutcome::Failed { reason })
                } else {
                    Ok(PollOutcome::Stale)
                }
            }
        }
    }

    /// Retry a link
    ///
    /// Failed links are reset to pending and resubmitted immediately. Pending
    /// links are submitted. Downloading and completed links are left alone.
    pub async fn retry(&self, link: &Link) -> Result<RetryOutcome> {
        match link.state.status() {
            DownloadStatus::Failed => {
                if !self.db.reset_link_for_retry(link.id).await? {
                    return self.rejected(link.id).await;
                }
                info!(link_id = %link.id, title = %link.title, "retrying failed link");
                Ok(self.submit_claimed(link).await?.into())
            }
            DownloadStatus::Pending => match self.submit(link).await? {
                SubmitOutcome::AlreadyClaimed => Ok(RetryOutcome::Rejected {
                    status: DownloadStatus::Pending,
                }),
                outcome => Ok(outcome.into()),
            },
            status @ (DownloadStatus::Downloading | DownloadStatus::Completed) => {
                debug!(link_id = %link.id, %status, "retry rejected, nothing to do");
                Ok(RetryOutcome::Rejected { status })
            }
        }
    }

    /// Reject with whatever state the link is actually in now
    async fn rejected(&self, id: LinkId) -> Result<RetryOutcome> {
        let current = self
            .db
            .get_link(id)
            .await?
            .ok_or(Error::Link(LinkError::NotFound { id: id.get() }))?;
        Ok(RetryOutcome::Rejected {
            status: current.state.status(),
        })
    }
}

impl From<SubmitOutcome> for RetryOutcome {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Submitted { task_id } => RetryOutcome::Submitted { task_id },
            SubmitOutcome::Failed { reason } => RetryOutcome::Failed { reason },
            SubmitOutcome::AlreadyClaimed => RetryOutcome::Rejected {
                status: DownloadStatus::Pending,
            },
        }
    }
}

fn invalid_state(link: &Link, operation: &str) -> Error {
    Error::Link(LinkError::InvalidState {
        id: link.id.get(),
        operation: operation.to_string(),
        current_state: link.state.status().to_string(),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
