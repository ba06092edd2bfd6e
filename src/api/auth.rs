//! Request authentication for the REST API
//!
//! Two independent checks:
//! - an optional shared API key in the `X-Api-Key` header, enforced by the
//!   [`require_api_key`] middleware when `ApiConfig::api_key` is set
//! - the caller's identity in the `X-Owner-Id` header, set by the upstream
//!   auth layer and extracted per handler through [`Owner`]

use crate::error::ApiError;
use crate::types::OwnerId;
use axum::{
    Json,
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Header carrying the authenticated owner id
pub const OWNER_HEADER: &str = "x-owner-id";

/// Authentication middleware that checks for a valid API key in the X-Api-Key header
///
/// Requests pass through untouched when no key is configured. Otherwise a
/// missing or non-matching key yields 401 Unauthorized.
pub async fn require_api_key(
    State(expected_api_key): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected_key) = expected_api_key else {
        return next.run(request).await;
    };

    let api_key_header = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    match api_key_header {
        Some(provided_key)
            if constant_time_eq(provided_key.as_bytes(), expected_key.as_bytes()) =>
        {
            next.run(request).await
        }
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing X-Api-Key header"),
    }
}

/// Constant-time byte comparison.
/// Always compares all bytes regardless of where the first mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn unauthorized_response(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized(message))).into_response()
}

/// The owner a request acts for, taken from the `X-Owner-Id` header
///
/// Rejects with 401 when the header is missing or not a positive integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner(pub OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(OWNER_HEADER) else {
            return Err(unauthorized_response("Missing X-Owner-Id header"));
        };

        raw.to_str()
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| Owner(OwnerId(id)))
            .ok_or_else(|| unauthorized_response("Invalid X-Owner-Id header"))
    }
}
