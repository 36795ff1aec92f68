// Integration tests for the HTTP surface: routing, session cookies, and
// the OAuth login flow up to the point where Spotify gets involved.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use greenroom::api::{create_router, AppState};
use greenroom::auth::SessionStore;
use greenroom::config::Config;
use greenroom::credentials::CredentialStore;
use greenroom::spotify::{SpotifyClient, TokenManager};
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        redirect_uri: "http://localhost:8000/auth/callback".to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        encryption_key: BASE64.encode([0u8; 32]),
        database_path: ":memory:".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

/// Router plus handles on the stores, so tests can log users in directly.
fn create_test_app() -> (Router, Arc<SessionStore>, Arc<CredentialStore>) {
    let config = Arc::new(test_config());
    let store = Arc::new(
        CredentialStore::new(&config.database_path, &config.encryption_key).unwrap(),
    );
    let sessions = Arc::new(SessionStore::new());
    let tokens = Arc::new(TokenManager::new(Arc::clone(&store), &config));
    let client = Arc::new(SpotifyClient::new());

    let state = AppState {
        config,
        store: Arc::clone(&store),
        sessions: Arc::clone(&sessions),
        tokens,
        client,
    };

    (create_router(state), sessions, store)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn test_index_serves_landing_page() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Connect Spotify"));
    assert!(html.contains("/auth/login"));
}

#[tokio::test]
async fn test_session_without_cookie_is_unauthenticated() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["authenticated"], false);
}

#[tokio::test]
async fn test_session_reports_logged_in_user() {
    let (app, sessions, store) = create_test_app();

    store
        .upsert_user(
            "u1",
            Some("Bob"),
            Some("bob@example.com"),
            "token",
            Some("refresh"),
            Utc::now() + Duration::hours(1),
        )
        .unwrap();
    let sid = sessions.create();
    sessions.set_spotify_id(&sid, "u1");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/session")
                .header(header::COOKIE, format!("sid={}", sid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["authenticated"], true);
    assert_eq!(json["spotify_id"], "u1");
    assert_eq!(json["display_name"], "Bob");
    assert_eq!(json["email"], "bob@example.com");
}

#[tokio::test]
async fn test_data_endpoints_require_session() {
    let (app, _, _) = create_test_app();

    for uri in [
        "/api/playlists",
        "/api/playlists/summary",
        "/api/playlists/abc123",
        "/api/spotify/liked-tracks",
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "uri: {}", uri);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Not authenticated");
    }
}

#[tokio::test]
async fn test_login_redirects_to_spotify_and_sets_cookie() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://accounts.spotify.com/authorize?"));
    assert!(location.contains("client_id=test-client-id"));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("state="));
    assert!(location.contains("user-library-read"));

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("sid="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_callback_rejects_upstream_error() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?error=access_denied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Spotify auth error: access_denied");
}

#[tokio::test]
async fn test_callback_rejects_state_mismatch() {
    let (app, sessions, _) = create_test_app();

    let sid = sessions.create();
    sessions.set_oauth_state(&sid, "expected-state");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=abc&state=forged-state")
                .header(header::COOKIE, format!("sid={}", sid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid OAuth state");
}

#[tokio::test]
async fn test_callback_rejects_missing_cookie() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=abc&state=whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_requires_code_after_valid_state() {
    let (app, sessions, _) = create_test_app();

    let sid = sessions.create();
    sessions.set_oauth_state(&sid, "good-state");

    // State validates, so the flow proceeds to the missing-code check
    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?state=good-state")
                .header(header::COOKIE, format!("sid={}", sid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No authorization code");
}

#[tokio::test]
async fn test_callback_state_cannot_be_replayed() {
    let (app, sessions, _) = create_test_app();

    let sid = sessions.create();
    sessions.set_oauth_state(&sid, "one-shot");

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/callback?state=one-shot")
                .header(header::COOKIE, format!("sid={}", sid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // Consumed on first presentation (fails later on the missing code)
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let replay = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=abc&state=one-shot")
                .header(header::COOKIE, format!("sid={}", sid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    let json = body_json(replay).await;
    assert_eq!(json["error"], "Invalid OAuth state");
}
