//! Rejections produced by session checks.

use axum::response::{IntoResponse, Redirect, Response};
use url::form_urlencoded;

/// Path of the login page.
pub const LOGIN_PATH: &str = "/login";

/// `<login_path>?next=<urlencoded destination>`.
pub fn login_location(login_path: &str, destination: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", destination)
        .finish();
    format!("{}?{}", login_path, query)
}

/// Redirect to the login page that remembers where the user was going.
///
/// Returned as the `Err` side wherever a session is required, so a caller that
/// gets past it always holds a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub location: String,
}

impl LoginRedirect {
    pub fn to(destination: &str) -> Self {
        Self::via(LOGIN_PATH, destination)
    }

    pub fn via(login_path: &str, destination: &str) -> Self {
        Self {
            location: login_location(login_path, destination),
        }
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::temporary(&self.location).into_response()
    }
}
