//! Request and response shapes of the 123pan open platform.
//!
//! Every response is wrapped in [`Envelope`]. Payloads are decoded into these
//! explicit types on receipt; anything that does not fit becomes
//! [`RemoteError::Malformed`](crate::error::RemoteError::Malformed).

use serde::{Deserialize, Serialize};

/// Common response wrapper: `code == 0` means success
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    #[serde(rename = "clientID")]
    pub client_id: &'a str,
    #[serde(rename = "clientSecret")]
    pub client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub access_token: String,
    /// RFC 3339 expiry
    #[serde(default)]
    pub expired_at: Option<String>,
    /// Lifetime in seconds, sent by older deployments
    #[serde(default)]
    pub expired_in: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ResolveRequest<'a> {
    pub urls: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ResolveData {
    #[serde(default)]
    pub list: Vec<ResolvedResource>,
}

#[derive(Debug, Deserialize)]
pub struct ResolvedResource {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: i64,
    pub result: i64,
    #[serde(default)]
    pub err_msg: Option<String>,
    #[serde(default)]
    pub files: Vec<ResolvedFile>,
}

#[derive(Debug, Deserialize)]
pub struct ResolvedFile {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitRequest {
    pub resource_list: Vec<SubmitResource>,
    pub upload_dir: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitResource {
    pub resource_id: i64,
    pub select_file_id: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitData {
    #[serde(default)]
    pub task_list: Option<Vec<TaskRef>>,
}

#[derive(Debug, Deserialize)]
pub struct TaskRef {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub task_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusData {
    pub status: i64,
    #[serde(default)]
    pub process: Option<f64>,
    #[serde(rename = "fileID", default, deserialize_with = "flexible_id::deserialize_option")]
    pub file_id: Option<i64>,
    #[serde(rename = "failReason", default)]
    pub fail_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MkdirRequest<'a> {
    pub name: &'a str,
    #[serde(rename = "parentID")]
    pub parent_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct MkdirData {
    #[serde(rename = "dirID", deserialize_with = "flexible_id::deserialize")]
    pub dir_id: i64,
}

/// Remote status codes of `offline/download/process`
pub mod task_status {
    pub const IN_PROGRESS: i64 = 0;
    pub const FAILED: i64 = 1;
    pub const SUCCEEDED: i64 = 2;
    pub const RETRYING: i64 = 3;
}

/// Identifiers arrive as JSON numbers from some endpoints and as numeric
/// strings from others.
mod flexible_id {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    impl RawId {
        fn into_id<E: Error>(self) -> Result<i64, E> {
            match self {
                RawId::Number(n) => Ok(n),
                RawId::Text(s) => s
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("non-numeric id {:?}", s))),
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawId::deserialize(deserializer)?.into_id()
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawId>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawId::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(raw) => raw.into_id().map(Some),
        }
    }
}
