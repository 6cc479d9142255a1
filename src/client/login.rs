use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;

use super::error::{ClientError, backend_detail};
use crate::backend::ApiEndpoint;
use crate::tokens::{TokenPair, TokenResponse};

/// Backend path that exchanges credentials for a token pair.
pub const TOKEN_PATH: &str = "/auth/token";

const LOGIN_FAILED: &str = "Login failed";

/// Exchange a username and password for a token pair.
///
/// Nothing is persisted here; callers decide where the pair goes.
pub async fn login(
    http: &reqwest::Client,
    api: &ApiEndpoint,
    username: &str,
    password: &str,
) -> Result<TokenPair, ClientError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ClientError::Login(
            "Username and password are required".to_string(),
        ));
    }

    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("username", username)
        .append_pair("password", password)
        .finish();

    let response = http
        .post(api.url(TOKEN_PATH)?)
        .header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        )
        .body(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        debug!(status = %status, "Login rejected");
        let message = backend_detail(response)
            .await
            .unwrap_or_else(|| LOGIN_FAILED.to_string());
        return Err(ClientError::Login(message));
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .map_err(|_| ClientError::Login(LOGIN_FAILED.to_string()))?;
    let pair = TokenPair::from(tokens);
    if !pair.is_present() {
        return Err(ClientError::Login(LOGIN_FAILED.to_string()));
    }
    Ok(pair)
}
