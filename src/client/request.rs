//! Outbound request description and the send path shared by every caller.

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use super::error::ClientError;
use crate::backend::ApiEndpoint;

/// Method, headers and body of a request, reusable for a retry.
#[derive(Debug, Clone)]
pub struct RequestInit {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Default for RequestInit {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestInit {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body with a matching `Content-Type`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

/// Send `init` to `path` with `authorization` as the `Authorization` header.
///
/// Caller headers are kept except `Authorization`, which is always replaced.
pub(crate) async fn send_with_authorization(
    http: &reqwest::Client,
    api: &ApiEndpoint,
    path: &str,
    init: &RequestInit,
    authorization: &str,
) -> Result<reqwest::Response, ClientError> {
    let url = api.url(path)?;
    let mut headers = init.headers.clone();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization)?);

    let mut request = http.request(init.method.clone(), url).headers(headers);
    if let Some(body) = &init.body {
        request = request.body(body.clone());
    }
    Ok(request.send().await?)
}
