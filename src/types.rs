//! Core types for magnet-bridge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Declares an `i64` newtype identifier with the conversions and sqlx
/// encoding every entity id needs.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a feed subscription
    SubscriptionId
);

entity_id!(
    /// Unique identifier for a discovered magnet link
    LinkId
);

entity_id!(
    /// Identifier of the user owning subscriptions (issued by the upstream auth layer)
    OwnerId
);

/// Unit of a subscription's refresh interval
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RefreshUnit {
    /// Interval counted in minutes
    #[default]
    Minutes,
    /// Interval counted in hours
    Hours,
}

impl RefreshUnit {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshUnit::Minutes => "minutes",
            RefreshUnit::Hours => "hours",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minutes" => Some(RefreshUnit::Minutes),
            "hours" => Some(RefreshUnit::Hours),
            _ => None,
        }
    }

    /// Normalize an interval in this unit to minutes
    pub fn to_minutes(&self, interval: u32) -> i64 {
        match self {
            RefreshUnit::Minutes => i64::from(interval),
            RefreshUnit::Hours => i64::from(interval) * 60,
        }
    }
}

/// Download status of a link, as stored
///
/// This is the flat discriminant of [`DownloadState`]; use it for filtering and
/// storage, and [`DownloadState`] for anything that needs the attached data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Discovered, not yet submitted
    Pending,
    /// Submitted to the remote service, not yet terminal
    Downloading,
    /// Remote task finished; the file exists in the cloud drive
    Completed,
    /// Submission or remote task failed
    Failed,
}

impl DownloadStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    /// Parse the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DownloadStatus::Pending),
            "downloading" => Some(DownloadStatus::Downloading),
            "completed" => Some(DownloadStatus::Completed),
            "failed" => Some(DownloadStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download-tracking state of a link with the data each state carries
///
/// Each variant holds exactly the fields its status allows, so a completed
/// link without a file id or a pending link with a task id cannot be built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "download_status", rename_all = "lowercase")]
pub enum DownloadState {
    /// Waiting to be submitted
    Pending,
    /// Remote task running
    Downloading {
        /// Remote task identifier
        task_id: i64,
        /// When the task was submitted
        submitted_at: Option<DateTime<Utc>>,
    },
    /// Remote task succeeded
    Completed {
        /// Remote task identifier
        task_id: i64,
        /// Remote file identifier of the result
        file_id: i64,
        /// When the task was submitted
        submitted_at: Option<DateTime<Utc>>,
        /// When completion was observed
        completed_at: DateTime<Utc>,
    },
    /// Submission or remote task failed
    Failed {
        /// Remote task identifier; absent when submission itself failed
        task_id: Option<i64>,
        /// Human-readable failure reason
        reason: String,
        /// When the task was submitted, if it ever was
        submitted_at: Option<DateTime<Utc>>,
        /// When the failure was recorded
        completed_at: DateTime<Utc>,
    },
}

impl DownloadState {
    /// Flat status of this state
    pub fn status(&self) -> DownloadStatus {
        match self {
            DownloadState::Pending => DownloadStatus::Pending,
            DownloadState::Downloading { .. } => DownloadStatus::Downloading,
            DownloadState::Completed { .. } => DownloadStatus::Completed,
            DownloadState::Failed { .. } => DownloadStatus::Failed,
        }
    }

    /// Remote task id, if one has been assigned
    pub fn task_id(&self) -> Option<i64> {
        match self {
            DownloadState::Pending => None,
            DownloadState::Downloading { task_id, .. } | DownloadState::Completed { task_id, .. } => {
                Some(*task_id)
            }
            DownloadState::Failed { task_id, .. } => *task_id,
        }
    }

    /// Failure reason for failed links
    pub fn fail_reason(&self) -> Option<&str> {
        match self {
            DownloadState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// A feed subscription
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    /// Unique subscription identifier
    pub id: SubscriptionId,

    /// Owning user
    pub owner_id: OwnerId,

    /// Feed URL (RSS 2.0 or Atom)
    pub feed_url: String,

    /// Cloud folder under which the subscription folder was created (0 = root)
    pub parent_folder_id: i64,

    /// Display name of the parent folder
    pub parent_folder_name: String,

    /// Cloud folder receiving this subscription's downloads
    pub cloud_folder_id: Option<i64>,

    /// Name of the subscription folder
    pub cloud_folder_name: String,

    /// Refresh interval magnitude
    pub refresh_interval: u32,

    /// Refresh interval unit
    pub refresh_unit: RefreshUnit,

    /// Whether scheduled sweeps refresh this subscription
    pub is_active: bool,

    /// Last completed parse-and-persist cycle
    pub last_refresh: Option<DateTime<Utc>>,

    /// When the subscription was created
    pub created_at: DateTime<Utc>,

    /// When the subscription was last modified
    pub updated_at: DateTime<Utc>,
}

/// Request to create a subscription
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NewSubscription {
    /// Feed URL (http or https)
    pub feed_url: String,

    /// Cloud folder to create the subscription folder in (default: 0, the root)
    #[serde(default)]
    pub parent_folder_id: i64,

    /// Display name of the parent folder
    pub parent_folder_name: String,

    /// Name of the folder to create for this subscription
    pub cloud_folder_name: String,

    /// Refresh interval magnitude (default: 30)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u32,

    /// Refresh interval unit (default: minutes)
    #[serde(default)]
    pub refresh_unit: RefreshUnit,

    /// Start active (default: true)
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial update of a subscription; absent fields are left unchanged
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionPatch {
    /// New feed URL
    #[serde(default)]
    pub feed_url: Option<String>,

    /// New parent folder display name
    #[serde(default)]
    pub parent_folder_name: Option<String>,

    /// New subscription folder display name
    #[serde(default)]
    pub cloud_folder_name: Option<String>,

    /// New refresh interval magnitude
    #[serde(default)]
    pub refresh_interval: Option<u32>,

    /// New refresh interval unit
    #[serde(default)]
    pub refresh_unit: Option<RefreshUnit>,

    /// New active flag
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn default_refresh_interval() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

/// A normalized feed entry carrying a magnet URI
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CandidateEntry {
    /// Entry title (non-empty, trimmed)
    pub title: String,

    /// Magnet URI (trimmed, `magnet:` scheme)
    pub magnet_uri: String,

    /// Web page for the entry
    pub link: Option<String>,

    /// Author
    pub author: Option<String>,

    /// Category
    pub category: Option<String>,

    /// Description or summary
    pub description: Option<String>,

    /// Size as reported by the feed
    pub size: Option<String>,

    /// Publication time, when the feed's date could be parsed
    pub published_at: Option<DateTime<Utc>>,
}

/// A discovered magnet link and its download state
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Link {
    /// Unique link identifier
    pub id: LinkId,

    /// Subscription that discovered this link
    pub subscription_id: SubscriptionId,

    /// Entry title
    pub title: String,

    /// Magnet URI
    pub magnet_uri: String,

    /// Web page for the entry
    pub link: Option<String>,

    /// Author
    pub author: Option<String>,

    /// Category
    pub category: Option<String>,

    /// Description
    pub description: Option<String>,

    /// Size as reported by the feed
    pub size: Option<String>,

    /// Publication time
    pub published_at: Option<DateTime<Utc>>,

    /// When the link was discovered
    pub created_at: DateTime<Utc>,

    /// Download-tracking state
    #[serde(flatten)]
    pub state: DownloadState,
}

/// Filters and paging for listing links
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LinkQuery {
    /// Restrict to one subscription
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,

    /// Page number, starting at 1 (default: 1)
    #[serde(default = "default_page")]
    pub page: u32,

    /// Items per page, 1 to 100 (default: 50)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for LinkQuery {
    fn default() -> Self {
        Self {
            subscription_id: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

/// One page of results
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[aliases(LinkPage = Page<Link>)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,

    /// Total matching items across all pages
    pub total: i64,

    /// Page number
    pub page: u32,

    /// Page size
    pub page_size: u32,
}

/// Outcome of refreshing one subscription
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResult {
    /// Subscription refreshed
    pub subscription_id: SubscriptionId,

    /// No error occurred (a skipped subscription also counts as successful)
    pub success: bool,

    /// Not due yet
    pub skipped: bool,

    /// Newly inserted links
    pub new_items: usize,

    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResult {
    pub(crate) fn skipped(subscription_id: SubscriptionId) -> Self {
        Self {
            subscription_id,
            success: true,
            skipped: true,
            new_items: 0,
            error: None,
        }
    }

    pub(crate) fn refreshed(subscription_id: SubscriptionId, new_items: usize) -> Self {
        Self {
            subscription_id,
            success: true,
            skipped: false,
            new_items,
            error: None,
        }
    }

    pub(crate) fn failed(subscription_id: SubscriptionId, error: impl Into<String>) -> Self {
        Self {
            subscription_id,
            success: false,
            skipped: false,
            new_items: 0,
            error: Some(error.into()),
        }
    }
}

/// Aggregate of a refresh pass over subscriptions
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RefreshSummary {
    /// Subscriptions considered
    pub total: usize,

    /// Subscriptions refreshed successfully
    pub success: usize,

    /// Subscriptions whose refresh failed
    pub failed: usize,

    /// Subscriptions not yet due
    pub skipped: usize,

    /// Links inserted across all subscriptions
    pub total_new_items: usize,

    /// Per-subscription results, in subscription order
    pub results: Vec<RefreshResult>,
}

impl RefreshSummary {
    /// Build the aggregate from per-subscription results
    pub fn from_results(results: Vec<RefreshResult>) -> Self {
        let mut summary = RefreshSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in &results {
            if result.skipped {
                summary.skipped += 1;
            } else if result.success {
                summary.success += 1;
                summary.total_new_items += result.new_items;
            } else {
                summary.failed += 1;
            }
        }
        summary.results = results;
        summary
    }
}

/// Aggregate of the submit and poll passes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadPassReport {
    /// Pending links moved to downloading
    pub submitted: usize,

    /// Pending links whose submission failed
    pub submit_failed: usize,

    /// Pending links already claimed by someone else
    pub already_claimed: usize,

    /// Downloading links polled
    pub polled: usize,

    /// Links observed completed
    pub completed: usize,

    /// Links observed failed remotely
    pub failed: usize,

    /// Links still running
    pub in_progress: usize,

    /// Polls that could not reach a verdict (remote error)
    pub poll_errors: usize,
}

/// Result of one reconciliation sweep
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SweepReport {
    /// Feed refresh pass
    pub refresh: RefreshSummary,

    /// Submit and poll passes
    pub downloads: DownloadPassReport,
}

/// Bulk retry selection
///
/// Explicit link ids take precedence over subscription ids; with neither, every
/// failed link is retried.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RetryRequest {
    /// Links to retry
    #[serde(default)]
    pub link_ids: Option<Vec<LinkId>>,

    /// Subscriptions whose failed links should be retried
    #[serde(default)]
    pub subscription_ids: Option<Vec<SubscriptionId>>,
}

/// Outcome for one link in a bulk retry
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryItem {
    /// Link retried
    pub id: LinkId,

    /// Link title
    pub title: String,

    /// Whether the link was resubmitted
    pub success: bool,

    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of a bulk retry
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RetryReport {
    /// Links selected
    pub total: usize,

    /// Links resubmitted
    pub success: usize,

    /// Links whose retry failed
    pub failed: usize,

    /// Per-link outcomes
    pub details: Vec<RetryItem>,
}
