//! Session cookie names, lifetimes and `Cookie` / `Set-Cookie` handling.

use std::time::SystemTime;

use axum::http::header;

use crate::jwt;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Access cookie lifetime when the token expiry is unknown, and its floor otherwise.
pub const DEFAULT_ACCESS_MAX_AGE: u64 = 60 * 60;

/// Refresh cookie lifetime: 30 days.
///
/// Fixed regardless of how long the backend keeps the refresh token valid,
/// which is not observable from here. The cookie can outlive the token.
pub const REFRESH_MAX_AGE: u64 = 30 * 24 * 60 * 60;

/// Extract a cookie value from the Cookie header. Empty values count as missing.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    let value = value.trim();
                    return (!value.is_empty()).then_some(value);
                }
            }
        }
    }
    None
}

/// Seconds the access cookie should live: until the token expires, but never
/// less than [`DEFAULT_ACCESS_MAX_AGE`].
pub fn access_max_age(access_token: &str, now: SystemTime) -> u64 {
    match jwt::decode_expiry(access_token) {
        Some(expiry) => expiry
            .duration_since(now)
            .map(|remaining| remaining.as_secs())
            .unwrap_or(0)
            .max(DEFAULT_ACCESS_MAX_AGE),
        None => DEFAULT_ACCESS_MAX_AGE,
    }
}

/// One session cookie write. A max-age of zero expires the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: &'static str,
    pub value: String,
    pub max_age: u64,
}

impl SessionCookie {
    pub fn access(access_token: &str, now: SystemTime) -> Self {
        Self {
            name: ACCESS_COOKIE_NAME,
            value: access_token.to_string(),
            max_age: access_max_age(access_token, now),
        }
    }

    pub fn refresh(refresh_token: &str) -> Self {
        Self {
            name: REFRESH_COOKIE_NAME,
            value: refresh_token.to_string(),
            max_age: REFRESH_MAX_AGE,
        }
    }

    pub fn expired(name: &'static str) -> Self {
        Self {
            name,
            value: String::new(),
            max_age: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.max_age == 0
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header(&self, secure: bool) -> String {
        let secure = if secure { "; Secure" } else { "" };
        format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax{}",
            self.name, self.value, self.max_age, secure
        )
    }
}
