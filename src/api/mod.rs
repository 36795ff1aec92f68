//! HTTP API.
//!
//! Thin handlers over the service layer: they resolve the session, call one
//! service operation, and map the error taxonomy to HTTP statuses. All
//! JSON, except the landing page.

pub mod auth;
pub mod playlists;
pub mod root;
pub mod session;
pub mod tracks;

use crate::auth::{SessionStore, SESSION_COOKIE, SESSION_TTL_DAYS};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::ServiceError;
use crate::spotify::{SpotifyClient, TokenManager};
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<CredentialStore>,
    pub sessions: Arc<SessionStore>,
    pub tokens: Arc<TokenManager>,
    pub client: Arc<SpotifyClient>,
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP-side error classes for all endpoints.
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    TooManyRequests(String),
    ServerError(String),
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    /// Default mapping for data-fetch flows. The interactive auth flow maps
    /// upstream rejections to 400 instead (see `auth::auth_flow_error`).
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            ServiceError::CsrfStateMismatch => ApiError::BadRequest("Invalid OAuth state".to_string()),
            ServiceError::Unauthenticated => ApiError::Forbidden("Not authenticated".to_string()),
            ServiceError::UpstreamAuth { status, body } => {
                ApiError::BadGateway(format!("Spotify auth error ({}): {}", status, body))
            }
            ServiceError::UpstreamRateLimited => {
                ApiError::TooManyRequests("Spotify rate limit exceeded".to_string())
            }
            ServiceError::UpstreamUnavailable(msg) => {
                ApiError::BadGateway(format!("Spotify unavailable: {}", msg))
            }
            ServiceError::InvalidCiphertext => ApiError::ServerError(
                "Stored credentials cannot be decrypted; re-authentication required".to_string(),
            ),
            ServiceError::Storage(err) => ApiError::ServerError(format!("Internal error: {}", err)),
        }
    }
}

/// Extract the session id from the `sid` cookie, if present.
pub(crate) fn session_id(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|kv| kv.strip_prefix("sid=").map(String::from))
}

/// Set-Cookie value carrying the session id.
pub(crate) fn session_cookie(sid: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        sid,
        SESSION_TTL_DAYS * 24 * 60 * 60
    )
}

/// Resolve the logged-in user's Spotify id, or 403.
pub(crate) fn require_user(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    session_id(headers)
        .and_then(|sid| state.sessions.spotify_id(&sid))
        .ok_or_else(|| ApiError::Forbidden("Not authenticated".to_string()))
}

/// Assemble the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root::index))
        .route("/health", get(root::health))
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/api/session", get(session::session_me))
        .route("/api/playlists", get(playlists::get_playlists))
        .route("/api/playlists/summary", get(playlists::get_playlists_summary))
        .route("/api/playlists/:id", get(playlists::get_playlist_detail))
        .route("/api/spotify/liked-tracks", get(tracks::get_liked_tracks))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
