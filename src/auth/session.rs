//! Session resolution for server-rendered pages.

use std::time::SystemTime;

use axum::http::{HeaderMap, header};
use reqwest::header::{CACHE_CONTROL, HeaderValue, PRAGMA};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};
use super::errors::LoginRedirect;
use crate::backend::ApiEndpoint;
use crate::client::{ClientError, RequestInit, send_with_authorization};
use crate::jwt;
use crate::tokens::DEFAULT_TOKEN_TYPE;

/// Read-only view of the caller's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expiry: Option<SystemTime>,
}

impl Session {
    fn with_token(access_token: &str, refresh_token: Option<&str>) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            expiry: jwt::decode_expiry(access_token),
        }
    }

    /// Session from the access/refresh cookie pair.
    pub fn from_cookies(headers: &HeaderMap) -> Option<Self> {
        let access = get_cookie(headers, ACCESS_COOKIE_NAME)?;
        Some(Self::with_token(
            access,
            get_cookie(headers, REFRESH_COOKIE_NAME),
        ))
    }

    /// Session from an `Authorization: <scheme> <token>` header.
    ///
    /// There is never a refresh token on this path.
    pub fn from_header(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = value.split(' ').nth(1).filter(|t| !t.is_empty())?;
        Some(Self::with_token(token, None))
    }

    /// Cookies first, then the Authorization header.
    pub fn resolve(headers: &HeaderMap) -> Option<Self> {
        Self::from_cookies(headers).or_else(|| Self::from_header(headers))
    }

    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// The caller's session, or a redirect to the login page with `next` set to
/// `destination`.
pub fn require_or_redirect(headers: &HeaderMap, destination: &str) -> Result<Session, LoginRedirect> {
    match Session::resolve(headers) {
        Some(session) if !session.access_token.is_empty() => Ok(session),
        _ => {
            tracing::debug!(destination = %destination, "No session, redirecting to login");
            Err(LoginRedirect::to(destination))
        }
    }
}

/// Call the backend as the session's user.
///
/// No client store lookup and no refresh; every call is marked `no-store` so
/// server-rendered pages never reuse a cached authenticated response.
pub async fn fetch_as_user(
    http: &reqwest::Client,
    api: &ApiEndpoint,
    path: &str,
    session: &Session,
    mut init: RequestInit,
) -> Result<reqwest::Response, ClientError> {
    if session.access_token.is_empty() {
        return Err(ClientError::MissingSession);
    }
    init.headers
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    init.headers
        .insert(PRAGMA, HeaderValue::from_static("no-cache"));
    send_with_authorization(http, api, path, &init, &session.authorization()).await
}
