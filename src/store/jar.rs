//! Cookie jars that honor max-age.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::kv::{ClientStore, MemoryStore};
use crate::auth::SessionCookie;

/// Where the session cookie pair lives.
pub trait CookieJar: Send + Sync {
    /// Current value of a cookie that has not expired.
    fn get(&self, name: &str) -> Option<String>;
    /// Write a cookie; a zero max-age removes it.
    fn set(&self, cookie: &SessionCookie);
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCookie {
    value: String,
    /// Unix seconds.
    expires_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Cookie jar kept in any [`ClientStore`], one entry per cookie.
#[derive(Clone, Debug, Default)]
pub struct KvCookieJar<S> {
    store: S,
}

/// Cookie jar held in memory.
pub type MemoryCookieJar = KvCookieJar<MemoryStore>;

impl<S: ClientStore> KvCookieJar<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn key(name: &str) -> String {
        format!("cookie:{}", name)
    }

    fn read(&self, name: &str) -> Option<StoredCookie> {
        let raw = self.store.get(&Self::key(name))?;
        serde_json::from_str(&raw).ok()
    }

    /// Unix second at which a live cookie expires.
    pub fn expires_at(&self, name: &str) -> Option<u64> {
        self.read(name)
            .filter(|c| c.expires_at > now_secs())
            .map(|c| c.expires_at)
    }
}

impl<S: ClientStore> CookieJar for KvCookieJar<S> {
    fn get(&self, name: &str) -> Option<String> {
        let cookie = self.read(name)?;
        if cookie.expires_at <= now_secs() {
            self.store.remove(&Self::key(name));
            return None;
        }
        Some(cookie.value)
    }

    fn set(&self, cookie: &SessionCookie) {
        let key = Self::key(cookie.name);
        if cookie.is_expired() {
            self.store.remove(&key);
            return;
        }
        let stored = StoredCookie {
            value: cookie.value.clone(),
            expires_at: now_secs() + cookie.max_age,
        };
        if let Ok(raw) = serde_json::to_string(&stored) {
            self.store.set(&key, &raw);
        }
    }
}
