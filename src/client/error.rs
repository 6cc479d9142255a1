//! Client-side errors.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::Value;

/// Errors surfaced by authenticated requests, login and refresh.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An authenticated request was made with no stored session.
    #[error("no stored session; sign in first")]
    MissingSession,
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error("{0}")]
    Login(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

/// Why exchanging a refresh token failed.
///
/// Cloneable so one outcome can be handed to every caller waiting on the
/// same in-flight refresh.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("no refresh token available")]
    MissingRefreshToken,
    #[error("refresh request failed: {0}")]
    Transport(Arc<reqwest::Error>),
    #[error("refresh response could not be read: {0}")]
    InvalidResponse(String),
    #[error("invalid refresh URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Human-readable `detail` from a backend error body.
///
/// The backend sends either `{"detail": "..."}` or a validation error list
/// `{"detail": [{"msg": "..."}]}`.
pub(crate) async fn backend_detail(response: reqwest::Response) -> Option<String> {
    let body = response.bytes().await.ok()?;
    detail_from_body(&body)
}

pub(crate) fn detail_from_body(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        Value::Array(items) => items
            .first()?
            .get("msg")?
            .as_str()
            .filter(|msg| !msg.is_empty())
            .map(str::to_string),
        _ => None,
    }
}
