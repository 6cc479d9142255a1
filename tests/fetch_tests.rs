//! Tests for authenticated requests against a live mock backend.
//!
//! Tests cover:
//! - Proactive refresh inside the expiry threshold
//! - Reactive refresh and the single retry after a 401
//! - Refresh failures and what they surface
//! - Single-flight refresh under concurrent requests
//! - Refreshes that outlive their caller or their session
//! - Login and logout through the client

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{
    INITIAL_REFRESH, PASSWORD, ROTATED_REFRESH, USERNAME, client_for, seed_session, start_backend,
};
use phill_session::auth::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use phill_session::client::{ClientError, RefreshError, RequestInit};
use phill_session::store::{CookieJar, SessionStore};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};

#[tokio::test]
async fn test_fresh_token_is_sent_without_refresh() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    let pair = seed_session(&store, 3600, Some(INITIAL_REFRESH));

    let response = client.get("/resource").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.refresh_calls(), 0);
    assert_eq!(
        mock.last_authorization().unwrap(),
        format!("bearer {}", pair.access_token)
    );
}

#[tokio::test]
async fn test_token_expiring_soon_is_refreshed_first() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    let old = seed_session(&store, 30, Some(INITIAL_REFRESH));

    let response = client.get("/resource").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(mock.resource_calls(), 1);
    assert_eq!(
        mock.last_refresh_token.lock().unwrap().as_deref(),
        Some(INITIAL_REFRESH)
    );

    let stored = store.load().unwrap();
    assert_ne!(stored.access_token, old.access_token);
    assert_eq!(
        mock.last_authorization().unwrap(),
        format!("bearer {}", stored.access_token)
    );
}

#[tokio::test]
async fn test_threshold_boundary_refreshes() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 60, Some(INITIAL_REFRESH));

    client.get("/resource").await.unwrap();
    assert_eq!(mock.refresh_calls(), 1);
}

#[tokio::test]
async fn test_token_outside_threshold_is_not_refreshed() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 90, Some(INITIAL_REFRESH));

    client.get("/resource").await.unwrap();
    assert_eq!(mock.refresh_calls(), 0);
}

#[tokio::test]
async fn test_expiring_token_without_refresh_token_is_used_as_is() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    let pair = seed_session(&store, 10, None);

    let response = client.get("/resource").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.refresh_calls(), 0);
    assert_eq!(
        mock.last_authorization().unwrap(),
        format!("bearer {}", pair.access_token)
    );
}

#[tokio::test]
async fn test_unauthorized_triggers_one_refresh_and_one_retry() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    let old = seed_session(&store, 3600, Some(INITIAL_REFRESH));
    mock.unauthorized_remaining.store(1, Ordering::SeqCst);

    let response = client.get("/resource").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(mock.resource_calls(), 2);
    assert_ne!(store.load().unwrap().access_token, old.access_token);
}

#[tokio::test]
async fn test_second_unauthorized_is_returned() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 3600, Some(INITIAL_REFRESH));
    mock.unauthorized_remaining.store(2, Ordering::SeqCst);

    let response = client.get("/resource").await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(mock.resource_calls(), 2);
}

#[tokio::test]
async fn test_unauthorized_without_refresh_token_is_not_retried() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 3600, None);
    mock.unauthorized_remaining.store(1, Ordering::SeqCst);

    let response = client.get("/resource").await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(mock.refresh_calls(), 0);
    assert_eq!(mock.resource_calls(), 1);
}

#[tokio::test]
async fn test_missing_session_is_an_error() {
    let (mock, base) = start_backend().await;
    let (client, _store) = client_for(&base);

    let err = client.get("/resource").await.unwrap_err();

    assert!(matches!(err, ClientError::MissingSession));
    assert_eq!(mock.resource_calls(), 0);
}

#[tokio::test]
async fn test_refresh_rejection_carries_backend_detail() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.refresh_status.store(401, Ordering::SeqCst);

    let err = client.get("/resource").await.unwrap_err();

    match err {
        ClientError::Refresh(RefreshError::Rejected { status, message }) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Refresh token expired");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(mock.resource_calls(), 0);
}

#[tokio::test]
async fn test_refresh_rejection_without_detail_is_generic() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.refresh_status.store(500, Ordering::SeqCst);

    let err = client.get("/resource").await.unwrap_err();

    assert_eq!(err.to_string(), "refresh failed (500)");
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let (_mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));

    client.get("/resource").await.unwrap();

    let stored = store.load().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some(INITIAL_REFRESH));
    assert_eq!(
        store.cookies().get(REFRESH_COOKIE_NAME).as_deref(),
        Some(INITIAL_REFRESH)
    );
}

#[tokio::test]
async fn test_refresh_takes_rotated_refresh_token() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.rotate_refresh.store(true, Ordering::SeqCst);

    client.get("/resource").await.unwrap();

    let stored = store.load().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some(ROTATED_REFRESH));
    assert_eq!(
        store.cookies().get(ACCESS_COOKIE_NAME).unwrap(),
        stored.access_token
    );
}

#[tokio::test]
async fn test_authorization_header_overrides_caller() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    let pair = seed_session(&store, 3600, Some(INITIAL_REFRESH));

    let init = RequestInit::get().header(AUTHORIZATION, HeaderValue::from_static("Bearer bogus"));
    client.request("/resource", init).await.unwrap();

    assert_eq!(
        mock.last_authorization().unwrap(),
        format!("bearer {}", pair.access_token)
    );
}

#[tokio::test]
async fn test_request_body_is_sent_on_retry() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 3600, Some(INITIAL_REFRESH));
    mock.unauthorized_remaining.store(1, Ordering::SeqCst);

    let init = RequestInit::post()
        .json(&serde_json::json!({ "title": "Printer on fire" }))
        .unwrap();
    let response = client.request("/resource", init).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.resource_calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_refresh() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.refresh_delay_ms.store(200, Ordering::SeqCst);

    let requests = (0..8).map(|_| {
        let client = client.clone();
        async move { client.get("/resource").await }
    });
    let responses = futures::future::join_all(requests).await;

    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(mock.resource_calls(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_failure_reaches_every_caller() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.refresh_delay_ms.store(200, Ordering::SeqCst);
    mock.refresh_status.store(401, Ordering::SeqCst);

    let requests = (0..4).map(|_| {
        let client = client.clone();
        async move { client.get("/resource").await }
    });
    let results = futures::future::join_all(requests).await;

    for result in results {
        assert!(matches!(
            result,
            Err(ClientError::Refresh(RefreshError::Rejected { .. }))
        ));
    }
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(mock.resource_calls(), 0);
}

#[tokio::test]
async fn test_cancelled_refresh_is_not_reused_after_relogin() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.refresh_delay_ms.store(200, Ordering::SeqCst);

    let cancelled = tokio::time::timeout(Duration::from_millis(50), client.get("/resource")).await;
    assert!(cancelled.is_err());

    client.logout();
    seed_session(&store, 30, Some("refresh-next"));

    let response = client.get("/resource").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        mock.last_refresh_token.lock().unwrap().as_deref(),
        Some("refresh-next")
    );
    assert_eq!(
        store.load().unwrap().refresh_token.as_deref(),
        Some("refresh-next")
    );
}

#[tokio::test]
async fn test_other_session_does_not_join_running_refresh() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.refresh_delay_ms.store(200, Ordering::SeqCst);

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.get("/resource").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    seed_session(&store, 30, Some("refresh-next"));

    let response = client.get("/resource").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(first.await.unwrap().unwrap().status(), StatusCode::OK);

    assert_eq!(mock.refresh_calls(), 2);
    // The older refresh finished first but its session was no longer stored.
    assert_eq!(
        store.load().unwrap().refresh_token.as_deref(),
        Some("refresh-next")
    );
}

#[tokio::test]
async fn test_refresh_finishing_after_logout_is_not_persisted() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    seed_session(&store, 30, Some(INITIAL_REFRESH));
    mock.refresh_delay_ms.store(200, Ordering::SeqCst);

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.get("/resource").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.logout();

    assert_eq!(pending.await.unwrap().unwrap().status(), StatusCode::OK);
    assert_eq!(mock.refresh_calls(), 1);
    assert!(store.load().is_none());
    assert!(store.cookies().get(REFRESH_COOKIE_NAME).is_none());
}

#[tokio::test]
async fn test_login_persists_pair() {
    let (mock, base) = start_backend().await;
    let (client, store) = client_for(&base);

    let pair = client.login(USERNAME, PASSWORD).await.unwrap();

    assert_eq!(mock.login_calls(), 1);
    assert_eq!(store.load().unwrap(), pair);
    assert_eq!(
        store.cookies().get(ACCESS_COOKIE_NAME).unwrap(),
        pair.access_token
    );
    assert_eq!(
        store.cookies().get(REFRESH_COOKIE_NAME).as_deref(),
        Some(INITIAL_REFRESH)
    );
}

#[tokio::test]
async fn test_login_failure_surfaces_detail() {
    let (_mock, base) = start_backend().await;
    let (client, store) = client_for(&base);

    let err = client.login(USERNAME, "wrong").await.unwrap_err();

    match err {
        ClientError::Login(message) => assert_eq!(message, "Incorrect username or password"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_login_requires_credentials() {
    let (mock, base) = start_backend().await;
    let (client, _store) = client_for(&base);

    assert!(matches!(
        client.login("", PASSWORD).await,
        Err(ClientError::Login(_))
    ));
    assert_eq!(mock.login_calls(), 0);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let (_mock, base) = start_backend().await;
    let (client, store) = client_for(&base);
    client.login(USERNAME, PASSWORD).await.unwrap();

    client.logout();

    assert!(store.load().is_none());
    assert!(store.cookies().get(ACCESS_COOKIE_NAME).is_none());
    assert!(matches!(
        client.get("/resource").await,
        Err(ClientError::MissingSession)
    ));
}
