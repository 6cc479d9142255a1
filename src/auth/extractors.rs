//! Axum extractors for server-rendered handlers.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;

use super::errors::LoginRedirect;
use super::session::{Session, require_or_redirect};

/// Path and query the client originally asked for, before any nesting.
pub(crate) fn original_destination(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(&parts.uri);
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// Extractor for pages that need a session.
/// Rejects with a redirect to login that returns to the requested page.
pub struct RequireSession(pub Session);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let destination = original_destination(parts);
        require_or_redirect(&parts.headers, &destination).map(RequireSession)
    }
}

/// Session extractor that never fails.
pub struct OptionalSession(pub Option<Session>);

impl<S> FromRequestParts<S> for OptionalSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalSession(Session::resolve(&parts.headers)))
    }
}
