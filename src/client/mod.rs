//! Authenticated requests against the backend API.
//!
//! [`AuthClient`] loads the stored pair, refreshes it ahead of expiry,
//! attaches the `Authorization` header and retries once after a 401. All
//! refreshes go through one shared slot so concurrent callers never race
//! each other to the refresh endpoint.

mod error;
mod login;
mod refresh;
mod request;

use std::sync::Arc;
use std::time::SystemTime;

use reqwest::StatusCode;
use tracing::debug;

use crate::backend::ApiEndpoint;
use crate::store::SessionStore;
use crate::tokens::TokenPair;

pub use error::{ClientError, RefreshError};
pub use login::{TOKEN_PATH, login};
pub use refresh::{REFRESH_PATH, refresh_tokens};
pub use request::RequestInit;

pub(crate) use refresh::RefreshSlot;
pub(crate) use request::send_with_authorization;

/// Backend client bound to one session store.
///
/// Cheap to clone; clones share the store and the refresh slot.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    api: ApiEndpoint,
    store: Arc<dyn SessionStore>,
    refresh: RefreshSlot,
}

impl AuthClient {
    pub fn new(api: ApiEndpoint, store: Arc<dyn SessionStore>) -> Self {
        Self::with_http(reqwest::Client::new(), api, store)
    }

    pub fn with_http(http: reqwest::Client, api: ApiEndpoint, store: Arc<dyn SessionStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                api,
                store,
                refresh: RefreshSlot::default(),
            }),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn api(&self) -> &ApiEndpoint {
        &self.inner.api
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.inner.store
    }

    /// Send an authenticated request to `path` under the API base.
    ///
    /// A token within the refresh threshold is refreshed first when a
    /// refresh token is available. A 401 on the first attempt triggers one
    /// forced refresh and exactly one retry; a second 401 is returned to the
    /// caller as a normal response.
    pub async fn request(&self, path: &str, init: RequestInit) -> Result<reqwest::Response, ClientError> {
        let mut pair = self
            .inner
            .store
            .load()
            .ok_or(ClientError::MissingSession)?;

        if pair.has_refresh_token() && pair.expires_soon(SystemTime::now()) {
            debug!(path = %path, "Access token expires soon, refreshing first");
            pair = self.refresh(&pair).await?;
        }

        let response = self.send(path, &init, &pair).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !pair.has_refresh_token() {
            return Ok(response);
        }

        debug!(path = %path, "Request unauthorized, refreshing and retrying once");
        drop(response);
        let refreshed = self.refresh(&pair).await?;
        self.send(path, &init, &refreshed).await
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        self.request(path, RequestInit::get()).await
    }

    /// Log in and persist the returned pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ClientError> {
        let pair = login(&self.inner.http, &self.inner.api, username, password).await?;
        self.inner.store.store(&pair);
        debug!("Stored new session");
        Ok(pair)
    }

    /// Forget the stored session and any refresh started for it. Safe to
    /// call without one.
    pub fn logout(&self) {
        self.inner.refresh.clear();
        self.inner.store.clear();
    }

    /// Refresh through the shared slot. The result is persisted unless the
    /// stored session was replaced while the refresh ran.
    pub async fn refresh(&self, current: &TokenPair) -> Result<TokenPair, RefreshError> {
        self.inner
            .refresh
            .refresh(&self.inner.http, &self.inner.api, &self.inner.store, current)
            .await
    }

    async fn send(
        &self,
        path: &str,
        init: &RequestInit,
        pair: &TokenPair,
    ) -> Result<reqwest::Response, ClientError> {
        send_with_authorization(
            &self.inner.http,
            &self.inner.api,
            path,
            init,
            &pair.authorization(),
        )
        .await
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("api", &self.inner.api)
            .finish_non_exhaustive()
    }
}
