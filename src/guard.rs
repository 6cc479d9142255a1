//! Access decisions for interactive front ends.
//!
//! These are plain state values; the CLI renders them, and any other
//! presentation layer can do the same.

use std::time::SystemTime;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::backend::ApiBase;
use crate::client::AuthClient;
use crate::store::SessionStore;
use crate::tokens::TokenPair;

/// Backend path returning the signed-in user's profile.
pub const PROFILE_PATH: &str = "/users/me";

/// Role that passes the admin gate.
pub const ADMIN_ROLE: &str = "admin";

const ADMINS_ONLY: &str = "Admins only";

/// Length of the access token preview shown by [`SessionSummary`].
const TOKEN_PREVIEW_CHARS: usize = 22;

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// What an authenticated-only view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthView {
    /// No session: show a locked preview with a way to log in.
    Locked,
    Unlocked(TokenPair),
}

pub struct AuthGate;

impl AuthGate {
    pub fn check(store: &dyn SessionStore) -> AuthView {
        match store.load() {
            Some(pair) => AuthView::Unlocked(pair),
            None => AuthView::Locked,
        }
    }
}

/// States of the admin-only gate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdminState {
    #[default]
    Checking,
    Unauthenticated,
    Forbidden(String),
    Error(String),
    Ready(Profile),
}

impl AdminState {
    pub fn is_ready(&self) -> bool {
        matches!(self, AdminState::Ready(_))
    }
}

pub struct AdminGate;

impl AdminGate {
    /// Resolve [`AdminState::Checking`] into a final state.
    ///
    /// Only the profile's role is consulted; the backend still authorizes
    /// every admin call on its own.
    pub async fn verify(client: &AuthClient) -> AdminState {
        if client.store().load().is_none() {
            return AdminState::Unauthenticated;
        }

        let response = match client.get(PROFILE_PATH).await {
            Ok(response) => response,
            Err(e) => return AdminState::Error(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return AdminState::Forbidden(ADMINS_ONLY.to_string());
        }
        if !status.is_success() {
            return AdminState::Error(format!("Unable to verify access ({})", status.as_u16()));
        }

        let profile: Profile = match response.json().await {
            Ok(profile) => profile,
            Err(e) => return AdminState::Error(e.to_string()),
        };
        if !profile.is_admin() {
            debug!(role = ?profile.role, "Profile is not an admin");
            return AdminState::Forbidden(ADMINS_ONLY.to_string());
        }
        AdminState::Ready(profile)
    }
}

/// Snapshot of the current session for a status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub authenticated: bool,
    pub api_base: String,
    pub health_url: String,
    pub token_preview: Option<String>,
    pub refresh_present: bool,
    #[serde(skip)]
    pub expires_at: Option<SystemTime>,
}

impl SessionSummary {
    pub fn from_pair(pair: Option<&TokenPair>, api_base: &ApiBase) -> Self {
        Self {
            authenticated: pair.is_some(),
            api_base: api_base.to_string(),
            health_url: api_base.url("/health"),
            token_preview: pair.map(|p| {
                let preview: String = p.access_token.chars().take(TOKEN_PREVIEW_CHARS).collect();
                format!("{}…", preview)
            }),
            refresh_present: pair.is_some_and(TokenPair::has_refresh_token),
            expires_at: pair.and_then(TokenPair::expiry),
        }
    }
}
