//! Orchestration over the token manager and Spotify client.
//!
//! Every operation follows the same outer pattern: obtain a cheap access
//! token, attempt the request, and on a single 401 force a refresh and
//! retry the same request exactly once. Any other failure propagates.

pub mod playlists;
pub mod tracks;

use crate::error::ServiceError;
use crate::spotify::client::{read_json, DEFAULT_RETRY_BUDGET};
use crate::spotify::{Page, SpotifyClient, TokenManager};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Authenticated single GET with the one-shot refresh-and-retry self-heal.
pub(crate) async fn get_authorized(
    client: &SpotifyClient,
    tokens: &TokenManager,
    spotify_id: &str,
    target: &str,
    timeout: Duration,
) -> Result<Value, ServiceError> {
    let token = tokens.get_valid_access_token(spotify_id).await?;

    let mut response = client.get(&token, target, timeout).await?;
    if response.status() == StatusCode::UNAUTHORIZED {
        tracing::debug!(spotify_id = %spotify_id, "Upstream rejected token, refreshing once");
        let token = tokens.refresh(spotify_id, Some(&token)).await?;
        response = client.get(&token, target, timeout).await?;
    }

    read_json(response).await
}

/// Follow a pagination cursor to the end, accumulating `items` in page
/// order.
///
/// Each page request gets the bounded rate-limit backoff; a 401 on any
/// page triggers one refresh and a retry of that same page. Terminates
/// when a page carries no `next` URL.
pub(crate) async fn fetch_all_pages_authorized(
    client: &SpotifyClient,
    tokens: &TokenManager,
    spotify_id: &str,
    start: String,
    timeout: Duration,
) -> Result<Vec<Value>, ServiceError> {
    let mut token = tokens.get_valid_access_token(spotify_id).await?;
    let mut items = Vec::new();
    let mut next = Some(start);

    while let Some(target) = next {
        let mut response = client
            .get_with_backoff(&token, &target, timeout, DEFAULT_RETRY_BUDGET)
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(spotify_id = %spotify_id, "Upstream rejected token mid-pagination, refreshing once");
            token = tokens.refresh(spotify_id, Some(&token)).await?;
            response = client
                .get_with_backoff(&token, &target, timeout, DEFAULT_RETRY_BUDGET)
                .await?;
        }

        let page = Page::from_value(read_json(response).await?);
        items.extend(page.items);
        next = page.next;
    }

    Ok(items)
}
