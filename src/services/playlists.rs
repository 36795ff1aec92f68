//! Playlist operations: single raw page, full summary, and detail with all
//! tracks.

use super::{fetch_all_pages_authorized, get_authorized};
use crate::error::ServiceError;
use crate::spotify::client::{METADATA_TIMEOUT, TRACK_TIMEOUT};
use crate::spotify::{normalize, SpotifyClient, TokenManager};
use serde_json::{json, Value};

/// Field projection for the summary grid: only what the frontend renders.
const SUMMARY_FIELDS: &str =
    "items(id,name,images(url),tracks(total),owner(display_name),public),next";

/// Field projection for playlist metadata.
const DETAIL_FIELDS: &str = "id,name,images(url),owner(display_name)";

/// Field projection for track pages inside a playlist.
const TRACK_FIELDS: &str = "items(track(id,name,artists(name),duration_ms,album(images(url)))),next";

/// One raw page from `/me/playlists`, shaped exactly as Spotify returns it.
///
/// `fields` restricts the upstream response projection when supplied.
pub async fn list_user_playlists(
    client: &SpotifyClient,
    tokens: &TokenManager,
    spotify_id: &str,
    limit: u32,
    offset: u32,
    fields: Option<&str>,
) -> Result<Value, ServiceError> {
    let mut target = format!("me/playlists?limit={}&offset={}", limit, offset);
    if let Some(fields) = fields {
        target.push_str(&format!("&fields={}", urlencoding::encode(fields)));
    }

    get_authorized(client, tokens, spotify_id, &target, METADATA_TIMEOUT).await
}

/// Flat summaries of every playlist the user has, across all pages.
pub async fn summarize_user_playlists(
    client: &SpotifyClient,
    tokens: &TokenManager,
    spotify_id: &str,
) -> Result<Vec<Value>, ServiceError> {
    let start = format!("me/playlists?limit=50&fields={}", SUMMARY_FIELDS);

    let items =
        fetch_all_pages_authorized(client, tokens, spotify_id, start, METADATA_TIMEOUT).await?;

    Ok(items.iter().map(normalize::playlist_summary).collect())
}

/// Playlist metadata plus every track entry, concatenated across all pages.
pub async fn playlist_detail(
    client: &SpotifyClient,
    tokens: &TokenManager,
    spotify_id: &str,
    playlist_id: &str,
) -> Result<Value, ServiceError> {
    let info_target = format!("playlists/{}?fields={}", playlist_id, DETAIL_FIELDS);
    let info = get_authorized(client, tokens, spotify_id, &info_target, METADATA_TIMEOUT).await?;

    let tracks_start = format!("playlists/{}/tracks?limit=100&fields={}", playlist_id, TRACK_FIELDS);
    let track_items =
        fetch_all_pages_authorized(client, tokens, spotify_id, tracks_start, TRACK_TIMEOUT).await?;

    Ok(json!({
        "id": info["id"],
        "name": info["name"],
        "images": info.get("images").cloned().unwrap_or_else(|| json!([])),
        "owner": info.get("owner").cloned().unwrap_or(Value::Null),
        "tracks": {"items": track_items},
    }))
}
