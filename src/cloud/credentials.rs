//! Bearer credentials for the cloud API.
//!
//! [`TokenCache`] replaces a process-global token with an explicit object that
//! owns the cached token and can be invalidated when the remote rejects it.

use super::wire::{Envelope, TokenData, TokenRequest};
use crate::config::CloudConfig;
use crate::error::RemoteError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Source of a currently valid bearer token
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a token that is valid now, refreshing it if needed
    async fn access_token(&self) -> Result<String, RemoteError>;

    /// Forget any cached token so the next call obtains a fresh one
    async fn invalidate(&self);
}

/// A fixed, pre-issued token
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    /// Wrap a pre-issued token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn access_token(&self) -> Result<String, RemoteError> {
        if self.token.trim().is_empty() {
            return Err(RemoteError::Credential("configured access token is empty".into()));
        }
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {
        // Nothing to refresh; a rejected static token stays rejected.
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Client-credential token cache
///
/// Holds the current token and its expiry. The token is refreshed when it is
/// within `refresh_margin` of expiring or after [`invalidate`](CredentialProvider::invalidate).
/// Refreshes are serialized by the cache lock, so concurrent callers share one
/// token request.
pub struct TokenCache {
    http_client: reqwest::Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_margin: chrono::Duration,
    default_ttl: chrono::Duration,
    state: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// Create an empty cache for the configured client credentials
    pub fn new(config: &CloudConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            token_url: format!(
                "{}/api/v1/access_token",
                config.open_api_base_url.trim_end_matches('/')
            ),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_margin: to_chrono(config.token_refresh_margin),
            default_ttl: to_chrono(config.default_token_ttl),
            state: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<CachedToken, RemoteError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => {
                return Err(RemoteError::Credential(
                    "cloud.client_id and cloud.client_secret are not configured".into(),
                ));
            }
        };

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Platform", "open_platform")
            .json(&TokenRequest {
                client_id,
                client_secret,
            })
            .send()
            .await
            .map_err(|e| RemoteError::Credential(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Credential(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let envelope: Envelope<TokenData> = response
            .json()
            .await
            .map_err(|e| RemoteError::Credential(format!("unreadable token response: {}", e)))?;

        if envelope.code != 0 {
            return Err(RemoteError::Credential(format!(
                "token endpoint refused credentials (code {}): {}",
                envelope.code, envelope.message
            )));
        }

        let data = envelope
            .data
            .ok_or_else(|| RemoteError::Credential("token response has no data".into()))?;

        let now = Utc::now();
        let expires_at = data
            .expired_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                data.expired_in
                    .and_then(|secs| now.checked_add_signed(chrono::Duration::try_seconds(secs)?))
            })
            .or_else(|| now.checked_add_signed(self.default_ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Ok(CachedToken {
            token: data.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialProvider for TokenCache {
    async fn access_token(&self) -> Result<String, RemoteError> {
        let mut state = self.state.lock().await;

        if let Some(cached) = state.as_ref()
            && Utc::now()
                .checked_add_signed(self.refresh_margin)
                .is_some_and(|deadline| deadline < cached.expires_at)
        {
            return Ok(cached.token.clone());
        }

        debug!("requesting a new cloud access token");
        let fresh = self.request_token().await?;
        info!(expires_at = %fresh.expires_at, "obtained cloud access token");
        let token = fresh.token.clone();
        *state = Some(fresh);
        Ok(token)
    }

    async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            info!("cloud access token invalidated");
        }
    }
}

/// Pick the credential source the configuration asks for
///
/// A static `access_token` wins over the client-credential flow.
pub fn from_config(config: &CloudConfig, http_client: reqwest::Client) -> Arc<dyn CredentialProvider> {
    match config.access_token.as_deref() {
        Some(token) if !token.trim().is_empty() => Arc::new(StaticCredential::new(token)),
        _ => Arc::new(TokenCache::new(config, http_client)),
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
