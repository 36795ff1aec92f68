//! Liked-tracks operations for the queue panel.

use super::get_authorized;
use crate::error::ServiceError;
use crate::spotify::client::METADATA_TIMEOUT;
use crate::spotify::{normalize, SpotifyClient, TokenManager};
use serde_json::{json, Value};

/// One normalized page of the user's saved tracks.
///
/// Returns `{items, total, nextOffset, pageSize}` where `nextOffset` is the
/// client-pagination cursor (null at the end of the library) and `total` is
/// the upstream-reported library size.
pub async fn liked_tracks(
    client: &SpotifyClient,
    tokens: &TokenManager,
    spotify_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Value, ServiceError> {
    let target = format!("me/tracks?limit={}&offset={}", limit, offset);
    let data = get_authorized(client, tokens, spotify_id, &target, METADATA_TIMEOUT).await?;

    let items: Vec<Value> = data["items"]
        .as_array()
        .map(|items| items.iter().map(normalize::liked_track).collect())
        .unwrap_or_default();
    let total = data["total"].as_u64().unwrap_or(0);

    Ok(json!({
        "items": items,
        "total": total,
        "nextOffset": normalize::next_offset(total, u64::from(limit), u64::from(offset)),
        "pageSize": limit,
    }))
}
