//! Session introspection for the frontend.

use super::{session_id, ApiError, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

fn unauthenticated() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"authenticated": false}))).into_response()
}

/// Reports whether the caller is logged in, and who they are.
///
/// Anonymous callers get a 401 with `{"authenticated": false}` rather than
/// an error body, so the frontend can branch on it without special-casing.
pub async fn session_me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(sid) = session_id(&headers) else {
        return unauthenticated();
    };
    let Some(spotify_id) = state.sessions.spotify_id(&sid) else {
        return unauthenticated();
    };

    match state.store.get(&spotify_id) {
        Ok(Some(user)) => Json(json!({
            "authenticated": true,
            "spotify_id": user.spotify_id,
            "display_name": user.display_name,
            "email": user.email,
        }))
        .into_response(),
        // Session points at a user the store no longer has
        Ok(None) => unauthenticated(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
