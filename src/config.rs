//! Configuration types for magnet-bridge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Main configuration for [`MagnetBridge`](crate::MagnetBridge)
///
/// Every section has defaults, so an empty TOML document is a valid
/// configuration (with no cloud credentials, which makes every remote call
/// fail with a credential error).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cloud-drive open platform settings
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Feed fetching settings
    #[serde(default)]
    pub feeds: FeedConfig,

    /// Reconciliation batching and claim settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Periodic sweep settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid configuration file: {}", e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("reconcile.refresh_concurrency", self.reconcile.refresh_concurrency),
            ("reconcile.submit_concurrency", self.reconcile.submit_concurrency),
            ("reconcile.poll_concurrency", self.reconcile.poll_concurrency),
            ("reconcile.pending_batch_limit", self.reconcile.pending_batch_limit),
        ];
        for (key, value) in limits {
            if value == 0 {
                return Err(Error::Config {
                    message: format!("{} must be at least 1", key),
                    key: Some(key.to_string()),
                });
            }
        }

        if self.scheduler.enabled && self.scheduler.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "scheduler.sweep_interval must be non-zero".into(),
                key: Some("scheduler.sweep_interval".into()),
            });
        }

        for (key, value) in [
            ("cloud.open_api_base_url", &self.cloud.open_api_base_url),
            ("cloud.offline_api_base_url", &self.cloud.offline_api_base_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(Error::Config {
                    message: format!("{} is not a valid URL: {}", key, value),
                    key: Some(key.to_string()),
                });
            }
        }

        Ok(())
    }
}

/// Cloud-drive open platform configuration
///
/// Either a static `access_token` or a `client_id`/`client_secret` pair must be
/// set for remote calls to succeed. When both are present the static token
/// wins.
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Open platform base URL (token, status, mkdir)
    #[serde(default = "default_open_api_base_url")]
    pub open_api_base_url: String,

    /// Offline-download base URL (resolve, submit)
    #[serde(default = "default_offline_api_base_url")]
    pub offline_api_base_url: String,

    /// Open platform client id
    #[serde(default)]
    pub client_id: Option<String>,

    /// Open platform client secret
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Pre-issued bearer token, used instead of the client credential flow
    #[serde(default)]
    pub access_token: Option<String>,

    /// Timeout for each cloud API request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Refresh a cached token this long before it expires (default: 1 hour)
    #[serde(default = "default_token_refresh_margin", with = "duration_serde")]
    pub token_refresh_margin: Duration,

    /// Token lifetime assumed when the token endpoint omits `expiredAt` (default: 30 days)
    #[serde(default = "default_token_ttl", with = "duration_serde")]
    pub default_token_ttl: Duration,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            open_api_base_url: default_open_api_base_url(),
            offline_api_base_url: default_offline_api_base_url(),
            client_id: None,
            client_secret: None,
            access_token: None,
            request_timeout: default_request_timeout(),
            token_refresh_margin: default_token_refresh_margin(),
            default_token_ttl: default_token_ttl(),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConfig")
            .field("open_api_base_url", &self.open_api_base_url)
            .field("offline_api_base_url", &self.offline_api_base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("request_timeout", &self.request_timeout)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("default_token_ttl", &self.default_token_ttl)
            .finish()
    }
}

/// Feed fetching configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Timeout for a single feed fetch (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent to feed servers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Reconciliation sweep configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Subscriptions refreshed concurrently per batch (default: 5)
    #[serde(default = "default_refresh_concurrency")]
    pub refresh_concurrency: usize,

    /// Pending links submitted concurrently per batch (default: 3)
    #[serde(default = "default_submit_concurrency")]
    pub submit_concurrency: usize,

    /// Downloading links polled concurrently per batch (default: 5)
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,

    /// Maximum pending links picked up per sweep (default: 10)
    #[serde(default = "default_pending_batch_limit")]
    pub pending_batch_limit: usize,

    /// Pause between submit batches (default: 1 second)
    #[serde(default = "default_submit_batch_delay", with = "duration_serde")]
    pub submit_batch_delay: Duration,

    /// A claim older than this is considered abandoned (default: 10 minutes)
    #[serde(default = "default_claim_timeout", with = "duration_serde")]
    pub claim_timeout: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            refresh_concurrency: default_refresh_concurrency(),
            submit_concurrency: default_submit_concurrency(),
            poll_concurrency: default_poll_concurrency(),
            pending_batch_limit: default_pending_batch_limit(),
            submit_batch_delay: default_submit_batch_delay(),
            claim_timeout: default_claim_timeout(),
        }
    }
}

/// Periodic sweep configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run sweeps periodically (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between sweeps (default: 5 minutes)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Sweep once immediately at startup (default: true)
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval: default_sweep_interval(),
            run_on_start: true,
        }
    }
}

/// Persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./magnet-bridge.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8787)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Optional API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_open_api_base_url() -> String {
    "https://open-api.123pan.com".into()
}

fn default_offline_api_base_url() -> String {
    "https://www.123pan.com".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_token_refresh_margin() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_token_ttl() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}

fn default_user_agent() -> String {
    format!("magnet-bridge/{}", env!("CARGO_PKG_VERSION"))
}

fn default_refresh_concurrency() -> usize {
    5
}

fn default_submit_concurrency() -> usize {
    3
}

fn default_poll_concurrency() -> usize {
    5
}

fn default_pending_batch_limit() -> usize {
    10
}

fn default_submit_batch_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_claim_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./magnet-bridge.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
