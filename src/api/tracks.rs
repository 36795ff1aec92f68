//! Liked-tracks endpoint.

use super::{require_user, ApiError, AppState};
use crate::services::tracks;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

fn default_limit() -> u32 {
    50
}

#[derive(Deserialize)]
pub struct TracksQuery {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

/// One normalized page of the user's saved tracks.
pub async fn get_liked_tracks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TracksQuery>,
) -> Result<Json<Value>, ApiError> {
    let spotify_id = require_user(&state, &headers)?;

    let page = tracks::liked_tracks(
        &state.client,
        &state.tokens,
        &spotify_id,
        query.limit,
        query.offset,
    )
    .await?;

    Ok(Json(page))
}
