//! Playlist endpoints.

use super::{require_user, ApiError, AppState};
use crate::services::playlists;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

fn default_limit() -> u32 {
    50
}

#[derive(Deserialize)]
pub struct PlaylistsQuery {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
    fields: Option<String>,
}

/// One raw page of the user's playlists, passed through from Spotify.
pub async fn get_playlists(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PlaylistsQuery>,
) -> Result<Json<Value>, ApiError> {
    let spotify_id = require_user(&state, &headers)?;

    let page = playlists::list_user_playlists(
        &state.client,
        &state.tokens,
        &spotify_id,
        query.limit,
        query.offset,
        query.fields.as_deref(),
    )
    .await?;

    Ok(Json(page))
}

/// Flat summaries of every playlist, across all upstream pages.
pub async fn get_playlists_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let spotify_id = require_user(&state, &headers)?;

    let items =
        playlists::summarize_user_playlists(&state.client, &state.tokens, &spotify_id).await?;

    Ok(Json(json!({"items": items})))
}

/// Playlist metadata plus its full track listing.
pub async fn get_playlist_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(playlist_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let spotify_id = require_user(&state, &headers)?;

    let detail =
        playlists::playlist_detail(&state.client, &state.tokens, &spotify_id, &playlist_id).await?;

    Ok(Json(detail))
}
