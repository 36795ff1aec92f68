//! Interactive OAuth flow: redirect to Spotify, then handle the callback.

use super::{session_cookie, session_id, ApiError, AppState};
use crate::auth::{generate_state, save_state, validate_state};
use crate::config::Config;
use crate::error::ServiceError;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::info;

const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

const SCOPES: [&str; 7] = [
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-library-read",
    "user-library-modify",
];

fn authorize_url(config: &Config, oauth_state: &str) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
        AUTHORIZE_URL,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&SCOPES.join(" ")),
        urlencoding::encode(oauth_state),
    )
}

/// Starts the flow: bind a fresh CSRF state to the session and redirect to
/// Spotify's consent page.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Reuse the caller's session if it is still live; a stale or missing
    // cookie gets a new one.
    let sid = match session_id(&headers) {
        Some(sid) if state.sessions.exists(&sid) => sid,
        _ => state.sessions.create(),
    };

    let oauth_state = generate_state();
    save_state(&state.sessions, &sid, &oauth_state);

    let url = authorize_url(&state.config, &oauth_state);
    (
        [(header::SET_COOKIE, session_cookie(&sid))],
        Redirect::temporary(&url),
    )
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// The interactive flow reports upstream rejections to the browser as 400s;
/// everything else keeps the default mapping.
fn auth_flow_error(err: ServiceError) -> ApiError {
    match err {
        ServiceError::UpstreamAuth { status, body } => {
            ApiError::BadRequest(format!("Spotify auth error ({}): {}", status, body))
        }
        other => ApiError::from(other),
    }
}

/// Completes the flow: validate CSRF state, exchange the code, persist the
/// user, log the session in, and bounce to the frontend.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(error) = params.error {
        return Err(ServiceError::InvalidRequest(format!("Spotify auth error: {}", error)).into());
    }

    // A missing cookie means there is no session to hold the expected state
    let sid = session_id(&headers).ok_or(ServiceError::CsrfStateMismatch)?;
    if !validate_state(&state.sessions, &sid, params.state.as_deref()) {
        return Err(ServiceError::CsrfStateMismatch.into());
    }

    let code = params
        .code
        .ok_or_else(|| ServiceError::InvalidRequest("No authorization code".to_string()))?;

    let bundle = state.tokens.exchange_code(&code).await.map_err(auth_flow_error)?;
    let profile = state
        .tokens
        .fetch_profile(&bundle.access_token)
        .await
        .map_err(auth_flow_error)?;
    let user = state.tokens.upsert_user(&bundle, &profile).await?;

    state.sessions.set_spotify_id(&sid, &user.spotify_id);
    info!(spotify_id = %user.spotify_id, "Spotify account connected");

    Ok((
        [(header::SET_COOKIE, session_cookie(&sid))],
        Redirect::temporary(&state.config.frontend_url),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tests::test_config;

    #[test]
    fn test_authorize_url_contains_required_params() {
        let url = authorize_url(&test_config(), "st4te");

        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=st4te"));
        // Scopes are space-separated, then percent-encoded
        assert!(url.contains("user-read-private%20user-read-email"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fauth%2Fcallback"));
    }
}
