#![allow(dead_code)]

//! A scripted stand-in for the backend API, served on a random local port.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Form, Json, Router,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use jsonwebtoken::{EncodingKey, Header};
use phill_session::backend::{ApiBase, ApiEndpoint};
use phill_session::client::AuthClient;
use phill_session::store::{MemoryTokenStore, SessionStore};
use phill_session::tokens::TokenPair;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

pub const USERNAME: &str = "ada";
pub const PASSWORD: &str = "correct horse";
pub const INITIAL_REFRESH: &str = "refresh-1";
pub const ROTATED_REFRESH: &str = "refresh-2";

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: u64,
    jti: String,
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// HS256 token for `sub` that expires `ttl_secs` from now. Every call yields a distinct token.
pub fn mint_token(sub: &str, ttl_secs: u64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: now_secs() + ttl_secs,
        jti: uuid::Uuid::new_v4().to_string(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"mock-backend-secret"),
    )
    .unwrap()
}

/// Call counters and knobs for the mock backend.
pub struct MockBackend {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    /// Number of upcoming `/resource` calls answered with 401.
    pub unauthorized_remaining: AtomicUsize,
    /// Status for `/auth/refresh`; 200 issues a new access token.
    pub refresh_status: AtomicU16,
    /// Whether refresh responses carry a new refresh token.
    pub rotate_refresh: AtomicBool,
    /// Artificial latency of `/auth/refresh`.
    pub refresh_delay_ms: AtomicU64,
    /// Status for `/users/me`.
    pub profile_status: AtomicU16,
    pub profile_role: Mutex<String>,
    pub last_authorization: Mutex<Option<String>>,
    pub last_refresh_token: Mutex<Option<String>>,
    pub last_cache_control: Mutex<Option<String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            resource_calls: AtomicUsize::new(0),
            unauthorized_remaining: AtomicUsize::new(0),
            refresh_status: AtomicU16::new(200),
            rotate_refresh: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            profile_status: AtomicU16::new(200),
            profile_role: Mutex::new("admin".to_string()),
            last_authorization: Mutex::new(None),
            last_refresh_token: Mutex::new(None),
            last_cache_control: Mutex::new(None),
        }
    }
}

impl MockBackend {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn resource_calls(&self) -> usize {
        self.resource_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }

    pub fn set_role(&self, role: &str) {
        *self.profile_role.lock().unwrap() = role.to_string();
    }

    fn record_headers(&self, headers: &HeaderMap) {
        let value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        *self.last_authorization.lock().unwrap() = value(header::AUTHORIZATION);
        *self.last_cache_control.lock().unwrap() = value(header::CACHE_CONTROL);
    }
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh_token: String,
}

async fn token(State(mock): State<Arc<MockBackend>>, Form(form): Form<LoginForm>) -> Response {
    mock.login_calls.fetch_add(1, Ordering::SeqCst);
    if form.username != USERNAME || form.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Incorrect username or password" })),
        )
            .into_response();
    }
    Json(json!({
        "access_token": mint_token(USERNAME, 3600),
        "refresh_token": INITIAL_REFRESH,
        "token_type": "bearer",
    }))
    .into_response()
}

async fn refresh(State(mock): State<Arc<MockBackend>>, Json(body): Json<RefreshBody>) -> Response {
    mock.refresh_calls.fetch_add(1, Ordering::SeqCst);
    *mock.last_refresh_token.lock().unwrap() = Some(body.refresh_token);

    let delay = mock.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = StatusCode::from_u16(mock.refresh_status.load(Ordering::SeqCst)).unwrap();
    if status == StatusCode::UNAUTHORIZED {
        return (status, Json(json!({ "detail": "Refresh token expired" }))).into_response();
    }
    if !status.is_success() {
        return (status, "upstream exploded").into_response();
    }

    let mut body = json!({
        "access_token": mint_token(USERNAME, 3600),
        "token_type": "bearer",
    });
    if mock.rotate_refresh.load(Ordering::SeqCst) {
        body["refresh_token"] = json!(ROTATED_REFRESH);
    }
    Json(body).into_response()
}

async fn profile(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    mock.profile_calls.fetch_add(1, Ordering::SeqCst);
    mock.record_headers(&headers);
    if !headers.contains_key(header::AUTHORIZATION) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let status = StatusCode::from_u16(mock.profile_status.load(Ordering::SeqCst)).unwrap();
    if !status.is_success() {
        return (status, Json(json!({ "detail": "nope" }))).into_response();
    }
    let role = mock.profile_role.lock().unwrap().clone();
    Json(json!({
        "role": role,
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "tenant": "acme",
    }))
    .into_response()
}

async fn resource(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    mock.resource_calls.fetch_add(1, Ordering::SeqCst);
    mock.record_headers(&headers);

    let remaining = mock.unauthorized_remaining.load(Ordering::SeqCst);
    if remaining > 0 {
        mock.unauthorized_remaining
            .store(remaining - 1, Ordering::SeqCst);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token expired" })),
        )
            .into_response();
    }
    Json(json!({ "ok": true })).into_response()
}

/// Echoes what the proxy forwarded.
async fn echo(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: String,
) -> Json<serde_json::Value> {
    let get_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "authorization": get_header("authorization"),
        "host": get_header("host"),
        "body": body,
    }))
}

/// Start the mock backend. Returns its state and base URL.
pub async fn start_backend() -> (Arc<MockBackend>, String) {
    let mock = Arc::new(MockBackend::default());
    let router = Router::new()
        .route("/auth/token", post(token))
        .route("/auth/refresh", post(refresh))
        .route("/users/me", get(profile))
        .route("/resource", any(resource))
        .route("/api/{*path}", any(echo))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (mock, format!("http://{}", addr))
}

pub fn endpoint(base_url: &str) -> ApiEndpoint {
    ApiEndpoint::new(
        ApiBase::resolve(Some(base_url), None),
        Url::parse("http://localhost:3000").unwrap(),
    )
}

/// Client over an in-memory store, plus the store for inspection.
pub fn client_for(base_url: &str) -> (AuthClient, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::default());
    let client = AuthClient::new(endpoint(base_url), store.clone());
    (client, store)
}

/// Store a pair whose access token expires `ttl_secs` from now.
pub fn seed_session(store: &MemoryTokenStore, ttl_secs: u64, refresh: Option<&str>) -> TokenPair {
    let pair = TokenPair::new(mint_token(USERNAME, ttl_secs), refresh.map(str::to_string));
    store.store(&pair);
    pair
}
