//! Database layer for magnet-bridge
//!
//! Handles SQLite persistence for feed subscriptions and the magnet links they
//! discover.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`subscriptions`] - Subscription CRUD and refresh bookkeeping
//! - [`links`] - Link insertion, listing and download-state transitions
//!
//! Every download-state transition is a single conditional `UPDATE` whose
//! `WHERE` clause names the expected current status. The returned `bool` is
//! `true` only when the row was actually moved.

use crate::error::DatabaseError;
use crate::types::{
    DownloadState, DownloadStatus, Link, LinkId, OwnerId, RefreshUnit, Subscription,
    SubscriptionId,
};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod links;
mod migrations;
mod subscriptions;

pub use links::FailedSelection;

/// Subscription record from database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    /// Unique database ID
    pub id: i64,
    /// Owning user
    pub owner_id: i64,
    /// Feed URL
    pub feed_url: String,
    /// Parent cloud folder
    pub parent_folder_id: i64,
    /// Parent cloud folder name
    pub parent_folder_name: String,
    /// Subscription cloud folder
    pub cloud_folder_id: Option<i64>,
    /// Subscription cloud folder name
    pub cloud_folder_name: String,
    /// Refresh interval magnitude
    pub refresh_interval: i64,
    /// Refresh interval unit ("minutes" or "hours")
    pub refresh_unit: String,
    /// Active flag (0 = inactive, 1 = active)
    pub is_active: i32,
    /// Unix timestamp of last completed refresh
    pub last_refresh: Option<i64>,
    /// Unix timestamp when the subscription was created
    pub created_at: i64,
    /// Unix timestamp of the last modification
    pub updated_at: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DatabaseError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let refresh_unit = RefreshUnit::parse(&row.refresh_unit).ok_or_else(|| {
            DatabaseError::InvalidRow(format!(
                "subscription {} has unknown refresh unit {:?}",
                row.id, row.refresh_unit
            ))
        })?;
        let refresh_interval = u32::try_from(row.refresh_interval).map_err(|_| {
            DatabaseError::InvalidRow(format!(
                "subscription {} has out-of-range refresh interval {}",
                row.id, row.refresh_interval
            ))
        })?;

        Ok(Subscription {
            id: SubscriptionId(row.id),
            owner_id: OwnerId(row.owner_id),
            feed_url: row.feed_url,
            parent_folder_id: row.parent_folder_id,
            parent_folder_name: row.parent_folder_name,
            cloud_folder_id: row.cloud_folder_id,
            cloud_folder_name: row.cloud_folder_name,
            refresh_interval,
            refresh_unit,
            is_active: row.is_active != 0,
            last_refresh: row.last_refresh.map(timestamp).transpose()?,
            created_at: timestamp(row.created_at)?,
            updated_at: timestamp(row.updated_at)?,
        })
    }
}

/// Link record from database
#[derive(Debug, Clone, FromRow)]
pub struct LinkRow {
    /// Unique database ID
    pub id: i64,
    /// Owning subscription
    pub subscription_id: i64,
    /// Entry title
    pub title: String,
    /// Magnet URI
    pub magnet_uri: String,
    /// Web page
    pub link: Option<String>,
    /// Author
    pub author: Option<String>,
    /// Category
    pub category: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Reported size
    pub size: Option<String>,
    /// Unix timestamp of publication
    pub published_at: Option<i64>,
    /// Unix timestamp of discovery
    pub created_at: i64,
    /// Download status ("pending", "downloading", "completed", "failed")
    pub download_status: String,
    /// Remote task id
    pub download_task_id: Option<i64>,
    /// Remote file id
    pub download_file_id: Option<i64>,
    /// Failure reason
    pub download_fail_reason: Option<String>,
    /// Unix timestamp of task submission
    pub download_created_at: Option<i64>,
    /// Unix timestamp of the terminal state
    pub download_completed_at: Option<i64>,
}

impl LinkRow {
    fn download_state(&self) -> Result<DownloadState, DatabaseError> {
        let invalid = |what: &str| {
            DatabaseError::InvalidRow(format!(
                "link {} is {} but {}",
                self.id, self.download_status, what
            ))
        };
        let status = DownloadStatus::parse(&self.download_status).ok_or_else(|| {
            DatabaseError::InvalidRow(format!(
                "link {} has unknown download status {:?}",
                self.id, self.download_status
            ))
        })?;
        let submitted_at = self.download_created_at.map(timestamp).transpose()?;
        let completed_at = self.download_completed_at.map(timestamp).transpose()?;

        match status {
            DownloadStatus::Pending => {
                if self.download_task_id.is_some() {
                    return Err(invalid("has a task id"));
                }
                Ok(DownloadState::Pending)
            }
            DownloadStatus::Downloading => {
                let task_id = self.download_task_id.ok_or_else(|| invalid("has no task id"))?;
                if completed_at.is_some() {
                    return Err(invalid("has a completion time"));
                }
                Ok(DownloadState::Downloading {
                    task_id,
                    submitted_at,
                })
            }
            DownloadStatus::Completed => Ok(DownloadState::Completed {
                task_id: self.download_task_id.ok_or_else(|| invalid("has no task id"))?,
                file_id: self.download_file_id.ok_or_else(|| invalid("has no file id"))?,
                submitted_at,
                completed_at: completed_at.ok_or_else(|| invalid("has no completion time"))?,
            }),
            DownloadStatus::Failed => Ok(DownloadState::Failed {
                task_id: self.download_task_id,
                reason: self.download_fail_reason.clone().unwrap_or_default(),
                submitted_at,
                completed_at: completed_at.ok_or_else(|| invalid("has no completion time"))?,
            }),
        }
    }
}

impl TryFrom<LinkRow> for Link {
    type Error = DatabaseError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        let state = row.download_state()?;
        Ok(Link {
            id: LinkId(row.id),
            subscription_id: SubscriptionId(row.subscription_id),
            title: row.title,
            magnet_uri: row.magnet_uri,
            link: row.link,
            author: row.author,
            category: row.category,
            description: row.description,
            size: row.size,
            published_at: row.published_at.map(timestamp).transpose()?,
            created_at: timestamp(row.created_at)?,
            state,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, DatabaseError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DatabaseError::InvalidRow(format!("invalid timestamp {}", secs)))
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DatabaseError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Database handle for magnet-bridge
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
