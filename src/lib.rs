pub mod api;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod client;
pub mod guard;
pub mod jwt;
pub mod rate_limit;
pub mod store;
pub mod tokens;

use api::{ApiError, AppState, ProxyState, create_api_router};
use auth::{RouteGate, route_gate};
use axum::{Router, middleware};
use backend::ApiEndpoint;
use rate_limit::LoginRateLimit;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// Where server-side calls to the backend API go
    pub api: ApiEndpoint,
    /// Backend that `/api/*` is proxied to; `None` disables the proxy
    pub proxy_target: Option<Url>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Key login rate limits on `X-Forwarded-For` (requires running behind a proxy)
    pub trust_forwarded_for: bool,
}

/// Create the edge server router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let http = reqwest::Client::new();

    let state = AppState {
        http: http.clone(),
        api: config.api.clone(),
        secure_cookies: config.secure_cookies,
    };
    let rate_limit = Arc::new(LoginRateLimit::new(config.trust_forwarded_for));
    let proxy = config
        .proxy_target
        .as_ref()
        .map(|target| ProxyState::new(http, target));

    create_api_router(state, rate_limit, proxy)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            Arc::new(RouteGate::default()),
            route_gate,
        ))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    Ok((handle, local_addr))
}
