//! Server-rendered login form and logout.

use std::sync::Arc;
use std::time::SystemTime;

use axum::{
    Form, Router,
    extract::{Query, State},
    http::header::SET_COOKIE,
    middleware,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use super::error::ApiError;
use crate::auth::{
    ACCESS_COOKIE_NAME, LOGIN_PATH, OptionalSession, REFRESH_COOKIE_NAME, SessionCookie,
};
use crate::client;
use crate::rate_limit::{LoginRateLimit, rate_limit_login};

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
}

pub fn router(state: AppState, rate_limit: Arc<LoginRateLimit>) -> Router {
    Router::new()
        .route(
            LOGIN_PATH,
            get(login_page).merge(
                post(login_submit)
                    .layer(middleware::from_fn_with_state(rate_limit, rate_limit_login)),
            ),
        )
        .route("/logout", post(logout))
        .with_state(state)
}

/// Post-login destination. Only same-site paths are followed.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Signed-in visitors go straight to `next`; everyone else gets the form.
async fn login_page(
    OptionalSession(session): OptionalSession,
    Query(query): Query<LoginQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref());
    if session.is_some() {
        return Redirect::to(next).into_response();
    }

    let next = escape_html(next);
    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<form method="post" action="{LOGIN_PATH}">
<input type="hidden" name="next" value="{next}">
<label>Username <input name="username" autocomplete="username" required></label>
<label>Password <input name="password" type="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#
    ))
    .into_response()
}

async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let pair = client::login(&state.http, &state.api, &form.username, &form.password).await?;
    info!(username = %form.username, "User logged in");

    let mut cookies = vec![(
        SET_COOKIE,
        SessionCookie::access(&pair.access_token, SystemTime::now()).to_header(state.secure_cookies),
    )];
    if let Some(refresh) = pair.refresh_token.as_deref().filter(|t| !t.is_empty()) {
        cookies.push((
            SET_COOKIE,
            SessionCookie::refresh(refresh).to_header(state.secure_cookies),
        ));
    }

    let next = safe_next(form.next.as_deref());
    Ok((AppendHeaders(cookies), Redirect::to(next)).into_response())
}

async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let clear_access = SessionCookie::expired(ACCESS_COOKIE_NAME).to_header(state.secure_cookies);
    let clear_refresh = SessionCookie::expired(REFRESH_COOKIE_NAME).to_header(state.secure_cookies);

    (
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
        Redirect::to(LOGIN_PATH),
    )
}
