//! Backend API base resolution.
//!
//! The base decides whether requests go straight to the backend or through the
//! same-origin `/api` proxy, so the fallback order is fixed: public URL, then
//! backend URL, then `/api`.

use url::Url;

/// Public API URL, preferred when set.
pub const PUBLIC_API_URL_ENV: &str = "PHILL_PUBLIC_API_URL";

/// Backend URL, used when no public URL is configured.
pub const BACKEND_URL_ENV: &str = "PHILL_BACKEND_URL";

/// Same-origin prefix used when neither URL is configured.
pub const SAME_ORIGIN_API: &str = "/api";

/// Resolved API base, either absolute or a same-origin path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    base: String,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ApiBase {
    /// Apply the three-tier fallback. Empty values count as unset.
    pub fn resolve(public_url: Option<&str>, backend_url: Option<&str>) -> Self {
        let base = non_empty(public_url)
            .or_else(|| non_empty(backend_url))
            .unwrap_or(SAME_ORIGIN_API);
        Self {
            base: base.to_string(),
        }
    }

    /// Resolve from [`PUBLIC_API_URL_ENV`] and [`BACKEND_URL_ENV`].
    pub fn from_env() -> Self {
        let public_url = std::env::var(PUBLIC_API_URL_ENV).ok();
        let backend_url = std::env::var(BACKEND_URL_ENV).ok();
        Self::resolve(public_url.as_deref(), backend_url.as_deref())
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// True when the base is a path on the front end's own origin.
    pub fn is_same_origin(&self) -> bool {
        !is_absolute(&self.base)
    }

    /// Join `path` onto the base with exactly one slash between them.
    pub fn url(&self, path: &str) -> String {
        let base = self.base.strip_suffix('/').unwrap_or(&self.base);
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

impl std::fmt::Display for ApiBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)
    }
}

/// An [`ApiBase`] anchored to the origin that relative bases resolve against.
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    base: ApiBase,
    origin: Url,
}

impl ApiEndpoint {
    pub fn new(base: ApiBase, origin: Url) -> Self {
        Self { base, origin }
    }

    pub fn base(&self) -> &ApiBase {
        &self.base
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        let joined = self.base.url(path);
        if is_absolute(&joined) {
            Url::parse(&joined)
        } else {
            self.origin.join(&joined)
        }
    }
}

/// Whether `url` names its own scheme and host.
pub fn is_absolute(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
