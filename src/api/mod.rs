mod account;
mod error;
mod login;
mod proxy;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::backend::ApiEndpoint;
use crate::rate_limit::LoginRateLimit;

pub use error::ApiError;
pub use login::safe_next;
pub use proxy::{DEFAULT_BACKEND_URL, ProxyState, proxy_target};

/// State shared by the server-rendered handlers.
#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub api: ApiEndpoint,
    /// Whether to set the Secure flag on session cookies.
    pub secure_cookies: bool,
}

/// Create the edge server routes.
///
/// The `/api` proxy is only mounted when `proxy` is set.
pub fn create_api_router(
    state: AppState,
    rate_limit: Arc<LoginRateLimit>,
    proxy: Option<ProxyState>,
) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .merge(login::router(state.clone(), rate_limit))
        .merge(account::router(state));

    match proxy {
        Some(proxy) => router.merge(proxy::router(proxy)),
        None => router,
    }
}

async fn healthz() -> &'static str {
    "ok"
}
