//! Token persistence.
//!
//! A session lives in two places with different readers: the client store
//! holds the full JSON pair for interactive code, and the cookie pair lets
//! server-rendered pages and the route gate see the session without a round
//! trip. [`TokenStore::persist_session`] owns both writes. They are not atomic
//! across the two targets, so a concurrent reader can briefly see the client
//! store ahead of the cookies; the last writer wins.

mod jar;
mod kv;

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::auth::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, SessionCookie};
use crate::tokens::TokenPair;

pub use jar::{CookieJar, KvCookieJar, MemoryCookieJar};
pub use kv::{ClientStore, FileStore, MemoryStore, StoreError};

/// Client store key holding the JSON-serialized pair.
pub const STORAGE_KEY: &str = "phill_tokens";

/// Load, replace and clear the current session.
pub trait SessionStore: Send + Sync {
    /// Current pair, or `None` when no access token is stored anywhere.
    fn load(&self) -> Option<TokenPair>;
    /// Replace the current pair. Pairs without an access token are ignored.
    fn store(&self, pair: &TokenPair);
    /// Forget the session everywhere. Safe to call with no session.
    fn clear(&self);
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn load(&self) -> Option<TokenPair> {
        (**self).load()
    }

    fn store(&self, pair: &TokenPair) {
        (**self).store(pair)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// [`SessionStore`] over a client key/value store and a cookie jar.
#[derive(Clone, Debug, Default)]
pub struct TokenStore<C, J> {
    client: C,
    cookies: J,
}

/// Token store kept entirely in memory.
pub type MemoryTokenStore = TokenStore<MemoryStore, MemoryCookieJar>;

impl<C: ClientStore, J: CookieJar> TokenStore<C, J> {
    pub fn new(client: C, cookies: J) -> Self {
        Self { client, cookies }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cookies(&self) -> &J {
        &self.cookies
    }

    /// Write `pair` to the client store and the cookie pair in one step.
    pub fn persist_session(&self, pair: &TokenPair) {
        self.persist_session_at(pair, SystemTime::now());
    }

    /// [`persist_session`](Self::persist_session) with an explicit clock for
    /// the access cookie lifetime.
    pub fn persist_session_at(&self, pair: &TokenPair, now: SystemTime) {
        if !pair.is_present() {
            return;
        }

        match serde_json::to_string(pair) {
            Ok(raw) => self.client.set(STORAGE_KEY, &raw),
            Err(e) => warn!(error = %e, "Failed to serialize token pair"),
        }

        self.cookies
            .set(&SessionCookie::access(&pair.access_token, now));
        if let Some(refresh) = pair.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            self.cookies.set(&SessionCookie::refresh(refresh));
        }
    }

    fn load_from_cookies(&self) -> Option<TokenPair> {
        let access = self
            .cookies
            .get(ACCESS_COOKIE_NAME)
            .filter(|t| !t.is_empty())?;
        let refresh = self
            .cookies
            .get(REFRESH_COOKIE_NAME)
            .filter(|t| !t.is_empty());
        Some(TokenPair::new(access, refresh))
    }
}

impl<C: ClientStore, J: CookieJar> SessionStore for TokenStore<C, J> {
    fn load(&self) -> Option<TokenPair> {
        if let Some(raw) = self.client.get(STORAGE_KEY) {
            match serde_json::from_str::<TokenPair>(&raw) {
                Ok(pair) if pair.is_present() => return Some(pair),
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Clearing unparsable stored tokens");
                    self.client.remove(STORAGE_KEY);
                }
            }
        }
        self.load_from_cookies()
    }

    fn store(&self, pair: &TokenPair) {
        self.persist_session(pair);
    }

    fn clear(&self) {
        self.client.remove(STORAGE_KEY);
        self.cookies.set(&SessionCookie::expired(ACCESS_COOKIE_NAME));
        self.cookies.set(&SessionCookie::expired(REFRESH_COOKIE_NAME));
    }
}
