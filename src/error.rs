//! Error types for magnet-bridge
//!
//! This module provides the error taxonomy for the library, including:
//! - Domain-specific error types (database, remote cloud API, feeds, link state)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for magnet-bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for magnet-bridge
///
/// Component failures (feeds, remote calls) are usually converted into recorded
/// outcomes before they reach the sweep driver; the variants here are what
/// crosses the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "cloud.client_id")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Remote cloud-drive API failure
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Feed fetch or parse failure
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Link state error (unknown link, transition not allowed)
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Inbound request rejected before any state mutation
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown (or foreign-owned) subscription
    #[error("not found: {0}")]
    NotFound(String),

    /// Another reconciliation sweep is still running
    #[error("a reconciliation sweep is already in progress")]
    SweepInProgress,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored row violates a domain invariant and cannot be decoded
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// Failures of the remote offline-download protocol
///
/// The remote client never mutates local state; callers translate these into
/// link transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No usable bearer credential; raised before any task endpoint is contacted
    #[error("credential unavailable: {0}")]
    Credential(String),

    /// Transport-level failure (connect, timeout, body read)
    #[error("{endpoint} request failed: {reason}")]
    Transport {
        /// Logical endpoint name (resolve, submit, status, mkdir, access_token)
        endpoint: &'static str,
        /// Underlying error text
        reason: String,
    },

    /// Non-success HTTP status
    #[error("{endpoint} returned HTTP {status}")]
    HttpStatus {
        /// Logical endpoint name
        endpoint: &'static str,
        /// HTTP status code
        status: u16,
    },

    /// The envelope carried a non-zero result code
    #[error("{endpoint} failed with code {code}: {message}")]
    Api {
        /// Logical endpoint name
        endpoint: &'static str,
        /// Remote result code
        code: i64,
        /// Remote message
        message: String,
    },

    /// The payload did not have the expected shape
    #[error("{endpoint} returned an unexpected payload: {reason}")]
    Malformed {
        /// Logical endpoint name
        endpoint: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The magnet could not be resolved (dead or invalid magnet)
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Resolution succeeded but yielded no files
    #[error("resolution failed: magnet resolved to no files")]
    EmptyResolution,

    /// Submission response did not include a task
    #[error("submit response contained no task id")]
    MissingTaskId,
}

/// Feed retrieval failures
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport-level failure
    #[error("failed to fetch feed {url}: {reason}")]
    Fetch {
        /// Feed URL
        url: String,
        /// Underlying error text
        reason: String,
    },

    /// Non-success HTTP status
    #[error("feed {url} returned HTTP {status}")]
    HttpStatus {
        /// Feed URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Document is neither valid RSS nor valid Atom
    #[error("failed to parse feed as RSS or Atom. RSS error: {rss}. Atom error: {atom}")]
    Parse {
        /// RSS parser error
        rss: String,
        /// Atom parser error
        atom: String,
    },
}

/// Link-related errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// Link not found (or owned by another user)
    #[error("link {id} not found")]
    NotFound {
        /// The link ID that was not found
        id: i64,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} link {id} in state {current_state}")]
    InvalidState {
        /// The link ID
        id: i64,
        /// The operation that was attempted (e.g., "retry", "download")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },

    /// Submission was attempted and the link is now failed
    #[error("download of link {id} failed: {reason}")]
    SubmissionFailed {
        /// The link ID
        id: i64,
        /// Failure reason stored on the link
        reason: String,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "link_not_found",
///     "message": "link error: link 12 not found",
///     "details": { "link_id": 12 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            Error::NotFound(_) => 404,
            Error::Link(LinkError::NotFound { .. }) => 404,

            Error::Link(LinkError::InvalidState { .. }) => 409,
            Error::SweepInProgress => 409,

            Error::Link(LinkError::SubmissionFailed { .. }) => 502,

            // External service errors
            Error::Remote(_) => 502,
            Error::Feed(_) => 502,

            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Remote(e) => match e {
                RemoteError::Credential(_) => "credential_unavailable",
                RemoteError::Resolution(_) | RemoteError::EmptyResolution => "resolution_failed",
                _ => "remote_error",
            },
            Error::Feed(_) => "feed_error",
            Error::Link(e) => match e {
                LinkError::NotFound { .. } => "link_not_found",
                LinkError::InvalidState { .. } => "invalid_state",
                LinkError::SubmissionFailed { .. } => "submission_failed",
            },
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::SweepInProgress => "sweep_in_progress",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Link(LinkError::NotFound { id }) => Some(serde_json::json!({
                "link_id": id,
            })),
            Error::Link(LinkError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "link_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Link(LinkError::SubmissionFailed { id, .. }) => Some(serde_json::json!({
                "link_id": id,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
