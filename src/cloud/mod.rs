//! Cloud-drive offline-download client.
//!
//! [`OfflineDownloads`] is the narrow boundary the rest of the crate talks to:
//! a two-step resolve/submit handshake, a status poll and folder creation.
//! [`CloudClient`] implements it against the 123pan open platform. The client
//! is pure request/response; it never touches local state.

use crate::config::CloudConfig;
use crate::error::{Error, RemoteError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod credentials;
mod wire;

pub use credentials::{CredentialProvider, StaticCredential, TokenCache};

use wire::{
    Envelope, MkdirData, MkdirRequest, ResolveData, ResolveRequest, StatusData, SubmitData,
    SubmitRequest, SubmitResource, task_status,
};

/// Envelope code the platform uses for a rejected or expired token
const UNAUTHORIZED_CODE: i64 = 401;

/// Remote task state, collapsed to what the download tracker acts on
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteTaskStatus {
    /// Still running (includes the remote "retrying" state)
    InProgress {
        /// Percent complete, when reported
        progress: Option<f64>,
    },
    /// Finished; the result is stored as `file_id`
    Succeeded {
        /// Remote file identifier
        file_id: i64,
    },
    /// Failed remotely
    Failed {
        /// Remote failure reason, when provided
        reason: Option<String>,
    },
}

/// Remote offline-download operations
#[async_trait]
pub trait OfflineDownloads: Send + Sync {
    /// Resolve a magnet and submit every file it contains as one task into `folder_id`
    ///
    /// Returns the remote task id. Resolution failures abort before submission.
    async fn resolve_and_submit(
        &self,
        magnet_uri: &str,
        folder_id: i64,
    ) -> std::result::Result<i64, RemoteError>;

    /// Current state of a remote task
    async fn poll_status(&self, task_id: i64) -> std::result::Result<RemoteTaskStatus, RemoteError>;

    /// Create a folder under `parent_id` and return its id
    async fn create_folder(
        &self,
        name: &str,
        parent_id: i64,
    ) -> std::result::Result<i64, RemoteError>;
}

/// 123pan open platform client
pub struct CloudClient {
    http_client: reqwest::Client,
    open_api_base: String,
    offline_api_base: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl CloudClient {
    /// Create a client using the credential source the configuration selects
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &CloudConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let credentials = credentials::from_config(config, http_client.clone());
        Ok(Self::with_credentials(config, http_client, credentials))
    }

    /// Create a client with an explicit credential provider
    pub fn with_credentials(
        config: &CloudConfig,
        http_client: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http_client,
            open_api_base: config.open_api_base_url.trim_end_matches('/').to_string(),
            offline_api_base: config.offline_api_base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn post<B, T>(&self, endpoint: &'static str, url: String, body: &B) -> std::result::Result<T, RemoteError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let token = self.credentials.access_token().await?;
        let request = self.http_client.post(url).json(body);
        self.send(endpoint, request, &token).await
    }

    async fn get<T>(&self, endpoint: &'static str, url: String, query: &[(&str, String)]) -> std::result::Result<T, RemoteError>
    where
        T: DeserializeOwned,
    {
        let token = self.credentials.access_token().await?;
        let request = self.http_client.get(url).query(query);
        self.send(endpoint, request, &token).await
    }

    async fn send<T>(
        &self,
        endpoint: &'static str,
        request: reqwest::RequestBuilder,
        token: &str,
    ) -> std::result::Result<T, RemoteError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .bearer_auth(token)
            .header("Platform", "open_platform")
            .send()
            .await
            .map_err(|e| RemoteError::Transport {
                endpoint,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.credentials.invalidate().await;
            }
            return Err(RemoteError::HttpStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| RemoteError::Transport {
            endpoint,
            reason: format!("failed to read body: {}", e),
        })?;

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| RemoteError::Malformed {
                endpoint,
                reason: e.to_string(),
            })?;

        if envelope.code != 0 {
            if envelope.code == UNAUTHORIZED_CODE {
                warn!(endpoint, "cloud API rejected the access token");
                self.credentials.invalidate().await;
            }
            return Err(RemoteError::Api {
                endpoint,
                code: envelope.code,
                message: envelope.message,
            });
        }

        envelope.data.ok_or_else(|| RemoteError::Malformed {
            endpoint,
            reason: "response has no data".into(),
        })
    }
}

#[async_trait]
impl OfflineDownloads for CloudClient {
    async fn resolve_and_submit(
        &self,
        magnet_uri: &str,
        folder_id: i64,
    ) -> std::result::Result<i64, RemoteError> {
        let resolved: ResolveData = self
            .post(
                "resolve",
                format!("{}/api/v2/offline_download/task/resolve", self.offline_api_base),
                &ResolveRequest { urls: magnet_uri },
            )
            .await?;

        let resource = resolved
            .list
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Resolution("resolve returned no resources".into()))?;

        if resource.result != 0 {
            return Err(RemoteError::Resolution(
                resource
                    .err_msg
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| format!("result code {}", resource.result)),
            ));
        }
        if resource.files.is_empty() {
            return Err(RemoteError::EmptyResolution);
        }

        debug!(
            resource_id = resource.id,
            files = resource.files.len(),
            "magnet resolved"
        );

        let submitted: SubmitData = self
            .post(
                "submit",
                format!("{}/api/v2/offline_download/task/submit", self.offline_api_base),
                &SubmitRequest {
                    resource_list: vec![SubmitResource {
                        resource_id: resource.id,
                        select_file_id: resource.files.iter().map(|f| f.id).collect(),
                    }],
                    upload_dir: folder_id,
                },
            )
            .await?;

        submitted
            .task_list
            .and_then(|tasks| tasks.into_iter().next())
            .map(|task| task.task_id)
            .ok_or(RemoteError::MissingTaskId)
    }

    async fn poll_status(&self, task_id: i64) -> std::result::Result<RemoteTaskStatus, RemoteError> {
        let data: StatusData = self
            .get(
                "status",
                format!("{}/api/v1/offline/download/process", self.open_api_base),
                &[("taskID", task_id.to_string())],
            )
            .await?;

        match data.status {
            task_status::IN_PROGRESS | task_status::RETRYING => Ok(RemoteTaskStatus::InProgress {
                progress: data.process,
            }),
            task_status::SUCCEEDED => {
                let file_id = data.file_id.ok_or_else(|| RemoteError::Malformed {
                    endpoint: "status",
                    reason: "succeeded task has no fileID".into(),
                })?;
                Ok(RemoteTaskStatus::Succeeded { file_id })
            }
            task_status::FAILED => Ok(RemoteTaskStatus::Failed {
                reason: data.fail_reason.filter(|r| !r.trim().is_empty()),
            }),
            other => Err(RemoteError::Malformed {
                endpoint: "status",
                reason: format!("unknown task status {}", other),
            }),
        }
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: i64,
    ) -> std::result::Result<i64, RemoteError> {
        let data: MkdirData = self
            .post(
                "mkdir",
                format!("{}/upload/v1/file/mkdir", self.open_api_base),
                &MkdirRequest { name, parent_id },
            )
            .await?;

        Ok(data.dir_id)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
