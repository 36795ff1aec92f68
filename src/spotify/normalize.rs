//! Reshaping raw Spotify JSON into the service's stable output schema.
//!
//! These are pure functions over raw page items; fetching and token
//! handling happen elsewhere. Missing upstream fields map to null rather
//! than errors, since Spotify trims payloads according to the requested
//! field projection.

use serde_json::{json, Value};

/// URL of the first image in an `images` array, if any.
fn first_image_url(images: &Value) -> Value {
    images
        .as_array()
        .and_then(|imgs| imgs.first())
        .and_then(|img| img.get("url"))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Flatten one playlist entry into the summary shape
/// `{id, name, image_url, tracks_total}`.
pub fn playlist_summary(playlist: &Value) -> Value {
    json!({
        "id": playlist["id"],
        "name": playlist["name"],
        "image_url": first_image_url(&playlist["images"]),
        "tracks_total": playlist["tracks"]["total"].as_u64().unwrap_or(0),
    })
}

/// Flatten one saved-track entry into the queue-panel shape.
///
/// The entry wraps the track under a `track` key and carries `added_at`
/// at the top level.
pub fn liked_track(item: &Value) -> Value {
    let track = &item["track"];
    let artists: Vec<Value> = track["artists"]
        .as_array()
        .map(|artists| artists.iter().map(|a| a["name"].clone()).collect())
        .unwrap_or_default();

    json!({
        "id": track["id"],
        "name": track["name"],
        "artists": artists,
        "album": track["album"]["name"],
        "image": first_image_url(&track["album"]["images"]),
        "duration_ms": track["duration_ms"],
        "preview_url": track["preview_url"],
        "uri": track["uri"],
        "added_at": item["added_at"],
    })
}

/// Client-side pagination cursor: the next offset, or None when the
/// current page reaches the end of the library.
///
/// This cursor is independent of the upstream `next` URL; it is what the
/// frontend feeds back as `offset` on its next request.
pub fn next_offset(total: u64, limit: u64, offset: u64) -> Option<u64> {
    if offset + limit < total {
        Some(offset + limit)
    } else {
        None
    }
}
