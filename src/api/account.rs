//! Server-rendered account summary.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tracing::debug;

use super::AppState;
use super::error::ApiError;
use crate::auth::{RequireSession, fetch_as_user};
use crate::client::RequestInit;
use crate::guard::{PROFILE_PATH, Profile};
use crate::jwt;

#[derive(Serialize)]
struct SessionInfo {
    token_type: String,
    /// Access token expiry in Unix milliseconds.
    expires_at: Option<u64>,
    refresh_present: bool,
}

#[derive(Serialize)]
struct AccountResponse {
    session: SessionInfo,
    user: Option<Profile>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/account", get(account))
        .with_state(state)
}

async fn account(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
) -> Result<Json<AccountResponse>, ApiError> {
    let response = fetch_as_user(
        &state.http,
        &state.api,
        PROFILE_PATH,
        &session,
        RequestInit::get(),
    )
    .await?;

    let user = if response.status().is_success() {
        response.json::<Profile>().await.ok()
    } else {
        debug!(status = %response.status(), "Profile unavailable for account page");
        None
    };

    Ok(Json(AccountResponse {
        session: SessionInfo {
            token_type: session.token_type.clone(),
            expires_at: session.expiry.map(jwt::unix_millis),
            refresh_present: session.refresh_token.is_some(),
        },
        user,
    }))
}
