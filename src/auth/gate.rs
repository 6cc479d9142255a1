//! Request-time route gate.
//!
//! A coarse presence check on the access-token cookie, run on every navigation
//! before any page renders. Token freshness is not checked here; the backend
//! and the authenticated fetch's 401 handling deal with stale tokens.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::{LOGIN_PATH, LoginRedirect};

/// Paths reachable without a session, exactly or as a `<path>/` prefix.
pub const PUBLIC_PATHS: &[&str] = &["/login", "/api", "/healthz", "/favicon.ico", "/robots.txt"];

/// Static asset prefixes reachable without a session.
pub const STATIC_PREFIXES: &[&str] = &["/_next", "/public"];

/// Which paths the gate lets through and where it sends everyone else.
#[derive(Debug, Clone)]
pub struct RouteGate {
    pub login_path: String,
    pub public_paths: Vec<String>,
    pub static_prefixes: Vec<String>,
}

impl Default for RouteGate {
    fn default() -> Self {
        Self {
            login_path: LOGIN_PATH.to_string(),
            public_paths: PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            static_prefixes: STATIC_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Outcome of gating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect(LoginRedirect),
}

impl RouteGate {
    pub fn is_public(&self, path: &str) -> bool {
        let listed = self.public_paths.iter().any(|public| {
            path == public
                || path
                    .strip_prefix(public.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        listed
            || self
                .static_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Decide for a request to `path` (plus `query`) carrying `headers`.
    pub fn decide(
        &self,
        path: &str,
        query: Option<&str>,
        headers: &axum::http::HeaderMap,
    ) -> GateDecision {
        if self.is_public(path) || get_cookie(headers, ACCESS_COOKIE_NAME).is_some() {
            return GateDecision::Pass;
        }
        let destination = match query {
            Some(query) if !query.is_empty() => format!("{}?{}", path, query),
            _ => path.to_string(),
        };
        GateDecision::Redirect(LoginRedirect::via(&self.login_path, &destination))
    }
}

/// Middleware applying a [`RouteGate`] to every request.
pub async fn route_gate(State(gate): State<Arc<RouteGate>>, request: Request, next: Next) -> Response {
    let decision = gate.decide(
        request.uri().path(),
        request.uri().query(),
        request.headers(),
    );
    match decision {
        GateDecision::Pass => next.run(request).await,
        GateDecision::Redirect(redirect) => {
            debug!(path = %request.uri().path(), "Unauthenticated navigation, redirecting to login");
            redirect.into_response()
        }
    }
}
