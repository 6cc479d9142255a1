//! Same-origin `/api` reverse proxy to the backend.

use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, HeaderName, header},
    response::{IntoResponse, Response},
    routing::any,
};
use tracing::debug;
use url::Url;

use super::error::ApiError;
use crate::backend::SAME_ORIGIN_API;

/// Backend used when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

/// Largest request body forwarded to the backend.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
    pub http: reqwest::Client,
    /// Backend origin without a trailing slash.
    pub target: String,
}

impl ProxyState {
    pub fn new(http: reqwest::Client, target: &Url) -> Self {
        Self {
            http,
            target: target.as_str().trim_end_matches('/').to_string(),
        }
    }
}

/// Proxy target for a configured backend URL.
///
/// Only absolute `http(s)` URLs are proxied; anything else disables the proxy.
pub fn proxy_target(backend_url: Option<&str>) -> Option<Url> {
    let backend = backend_url
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_BACKEND_URL);
    if !crate::backend::is_absolute(backend) {
        return None;
    }
    Url::parse(backend).ok()
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route(SAME_ORIGIN_API, any(forward))
        .route(&format!("{}/{{*path}}", SAME_ORIGIN_API), any(forward))
        .with_state(state)
}

/// Drop headers that describe one connection rather than the message.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop_by_hop: [HeaderName; 9] = [
        header::CONNECTION,
        header::HOST,
        header::CONTENT_LENGTH,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ];
    for name in hop_by_hop {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

async fn forward(
    State(state): State<ProxyState>,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Result<Response, ApiError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(SAME_ORIGIN_API);
    let url = format!("{}{}", state.target, path_and_query);

    let (parts, body) = request.into_parts();
    let body: Bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::bad_request(format!("Unreadable request body: {}", e)))?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    debug!(method = %parts.method, url = %url, "Proxying API request");
    let upstream = state
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| ApiError::bad_gateway("Backend unavailable", e))?;

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut response_headers);
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ApiError::bad_gateway("Backend response interrupted", e))?;

    let mut response = Body::from(bytes).into_response();
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
