//! Refresh-token exchange and the single in-flight refresh slot.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use tracing::{debug, warn};

use super::error::{RefreshError, backend_detail};
use crate::backend::ApiEndpoint;
use crate::store::SessionStore;
use crate::tokens::{TokenPair, TokenResponse};

/// Backend path that exchanges a refresh token for a new access token.
pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchange the refresh token of `current` and merge the answer over it.
pub async fn refresh_tokens(
    http: &reqwest::Client,
    api: &ApiEndpoint,
    current: &TokenPair,
) -> Result<TokenPair, RefreshError> {
    let refresh_token = current
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(RefreshError::MissingRefreshToken)?;

    let response = http
        .post(api.url(REFRESH_PATH)?)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(|e| RefreshError::Transport(Arc::new(e)))?;

    let status = response.status();
    if !status.is_success() {
        let message = backend_detail(response)
            .await
            .unwrap_or_else(|| format!("refresh failed ({})", status.as_u16()));
        return Err(RefreshError::Rejected { status, message });
    }

    let refreshed: TokenResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
    Ok(current.merged_with(refreshed))
}

type RefreshFuture = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;

struct InFlight {
    generation: u64,
    refresh_token: Option<String>,
    future: RefreshFuture,
}

#[derive(Default)]
struct SlotState {
    next_generation: u64,
    running: Option<InFlight>,
}

fn lock(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// At most one refresh in flight; concurrent callers holding the same
/// refresh token await the same one.
///
/// The running refresh empties the slot itself when it finishes, so a
/// refresh whose callers were all dropped is never handed to a later one.
#[derive(Default)]
pub(crate) struct RefreshSlot {
    state: Arc<Mutex<SlotState>>,
}

impl RefreshSlot {
    /// Refresh `current` and persist the result, joining a refresh of the
    /// same refresh token that is already running.
    pub(crate) async fn refresh(
        &self,
        http: &reqwest::Client,
        api: &ApiEndpoint,
        store: &Arc<dyn SessionStore>,
        current: &TokenPair,
    ) -> Result<TokenPair, RefreshError> {
        let future = {
            let mut state = lock(&self.state);
            let joined = state
                .running
                .as_ref()
                .filter(|running| running.refresh_token == current.refresh_token)
                .map(|running| running.future.clone());
            match joined {
                Some(future) => {
                    debug!("Joining in-flight token refresh");
                    future
                }
                None => {
                    if state.running.is_some() {
                        debug!("Replacing in-flight refresh of another session");
                    }
                    let generation = state.next_generation;
                    state.next_generation = generation.wrapping_add(1);
                    let future = start_refresh(
                        http.clone(),
                        api.clone(),
                        Arc::clone(store),
                        current.clone(),
                        Arc::downgrade(&self.state),
                        generation,
                    );
                    state.running = Some(InFlight {
                        generation,
                        refresh_token: current.refresh_token.clone(),
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }

    /// Forget any refresh in flight. Callers already awaiting it keep it.
    pub(crate) fn clear(&self) {
        lock(&self.state).running = None;
    }
}

/// Whether the store still holds the session that `current` was read from.
fn still_current(store: &dyn SessionStore, current: &TokenPair) -> bool {
    store
        .load()
        .is_some_and(|stored| stored.refresh_token == current.refresh_token)
}

fn start_refresh(
    http: reqwest::Client,
    api: ApiEndpoint,
    store: Arc<dyn SessionStore>,
    current: TokenPair,
    slot: Weak<Mutex<SlotState>>,
    generation: u64,
) -> RefreshFuture {
    async move {
        debug!("Refreshing access token");
        let refreshed = refresh_tokens(&http, &api, &current).await;
        match &refreshed {
            Ok(pair) if still_current(&*store, &current) => store.store(pair),
            Ok(_) => debug!("Session changed during refresh, not persisting"),
            Err(e) => warn!(error = %e, "Token refresh failed"),
        }

        if let Some(state) = slot.upgrade() {
            let mut state = lock(&state);
            if state
                .running
                .as_ref()
                .is_some_and(|running| running.generation == generation)
            {
                state.running = None;
            }
        }
        refreshed
    }
    .boxed()
    .shared()
}
