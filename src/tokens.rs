//! The token pair that represents one session.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::jwt;

/// Token type used when the backend does not name one.
pub const DEFAULT_TOKEN_TYPE: &str = "bearer";

/// Remaining lifetime at or below which an access token is refreshed before use.
pub const REFRESH_THRESHOLD: Duration = Duration::from_secs(60);

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// Access token, optional refresh token and the scheme used to present them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            token_type: default_token_type(),
        }
    }

    /// A pair only counts as a session when it carries an access token.
    pub fn is_present(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Decoded expiry of the access token; never stored.
    pub fn expiry(&self) -> Option<SystemTime> {
        jwt::decode_expiry(&self.access_token)
    }

    /// Whether the access token expires within [`REFRESH_THRESHOLD`] of `now`.
    ///
    /// An unknown expiry never counts as expiring soon.
    pub fn expires_soon(&self, now: SystemTime) -> bool {
        match self.expiry() {
            Some(expiry) => expiry <= now + REFRESH_THRESHOLD,
            None => false,
        }
    }

    /// Value of the `Authorization` header for this pair.
    pub fn authorization(&self) -> String {
        let scheme = if self.token_type.is_empty() {
            DEFAULT_TOKEN_TYPE
        } else {
            &self.token_type
        };
        format!("{} {}", scheme, self.access_token)
    }

    /// Shallow merge of a refresh response over this pair.
    ///
    /// Fields the response leaves out keep their current value, so a refresh
    /// that does not rotate the refresh token keeps the existing one.
    pub fn merged_with(&self, refreshed: TokenResponse) -> TokenPair {
        TokenPair {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or_else(|| self.refresh_token.clone()),
            token_type: refreshed
                .token_type
                .unwrap_or_else(|| self.token_type.clone()),
        }
    }
}

/// Body returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        TokenPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type.unwrap_or_else(default_token_type),
        }
    }
}
