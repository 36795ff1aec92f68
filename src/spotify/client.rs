//! HTTP client for the Spotify Web API.
//!
//! Performs bearer-authenticated GETs against either a relative resource
//! path (resolved against the API base) or an absolute continuation URL
//! from a previous page, since Spotify embeds full next-page URLs.
//! Rate-limit handling is a bounded retry loop honoring the server's
//! `Retry-After`.

use crate::error::ServiceError;
use reqwest::{header::HeaderMap, Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Spotify Web API base URL.
pub const API_BASE: &str = "https://api.spotify.com/v1";

/// How many extra attempts a rate-limited request gets by default.
pub const DEFAULT_RETRY_BUDGET: u32 = 1;

/// Timeout for metadata requests.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for bulk track pagination requests.
pub const TRACK_TIMEOUT: Duration = Duration::from_secs(15);

/// One page of a cursor-paginated Spotify response.
#[derive(Debug)]
pub struct Page {
    /// Items of this page, in upstream order
    pub items: Vec<Value>,

    /// Absolute URL of the next page, or None when exhausted
    pub next: Option<String>,
}

impl Page {
    /// Splits a raw page body into its items and continuation URL.
    pub fn from_value(mut value: Value) -> Self {
        let items = match value.get_mut("items").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let next = value
            .get("next")
            .and_then(Value::as_str)
            .map(String::from);
        Self { items, next }
    }
}

/// Client for authenticated GETs against the Spotify Web API.
pub struct SpotifyClient {
    http: Client,
    api_base: String,
}

impl SpotifyClient {
    /// Create a client against the production API base.
    pub fn new() -> Self {
        Self::with_base_url(API_BASE.to_string())
    }

    /// Create a client with a custom base URL (for testing with a mock server).
    pub fn with_base_url(api_base: String) -> Self {
        Self {
            http: Client::new(),
            api_base,
        }
    }

    /// Resolve a target: absolute continuation URLs pass through, relative
    /// paths are joined to the API base.
    fn resolve(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}/{}", self.api_base, target.trim_start_matches('/'))
        }
    }

    /// Single bearer-authenticated GET.
    ///
    /// Transport failures (connect, timeout) become `UpstreamUnavailable`;
    /// the response is returned whatever its status, since callers decide
    /// how to react to 401 and friends.
    pub async fn get(
        &self,
        access_token: &str,
        target: &str,
        timeout: Duration,
    ) -> Result<Response, ServiceError> {
        let url = self.resolve(target);
        tracing::debug!(url = %url, "Spotify GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .timeout(timeout)
            .send()
            .await?;

        Ok(response)
    }

    /// GET with bounded rate-limit retries.
    ///
    /// On a 429, sleeps for the server-specified `Retry-After` (bounded
    /// below by zero) and retries, decrementing the budget until exhausted.
    /// The final response is returned as-is, success or failure.
    pub async fn get_with_backoff(
        &self,
        access_token: &str,
        target: &str,
        timeout: Duration,
        mut retry_budget: u32,
    ) -> Result<Response, ServiceError> {
        loop {
            let response = self.get(access_token, target, timeout).await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS && retry_budget > 0 {
                let delay = retry_after_seconds(response.headers());
                tracing::warn!(
                    target = %target,
                    delay_seconds = delay,
                    remaining_retries = retry_budget,
                    "Rate limited by Spotify, backing off"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
                retry_budget -= 1;
                continue;
            }

            return Ok(response);
        }
    }
}

impl Default for SpotifyClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the `Retry-After` delay from a rate-limited response.
///
/// Missing or unparseable headers count as zero seconds.
pub fn retry_after_seconds(headers: &HeaderMap) -> u64 {
    headers
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}

/// Read a JSON body, mapping non-success statuses to the error taxonomy.
///
/// 401/403 become `UpstreamAuth` (the caller may self-heal once via
/// refresh), 429 becomes `UpstreamRateLimited`, everything else
/// `UpstreamUnavailable`. The upstream status and body are preserved.
pub async fn read_json(response: Response) -> Result<Value, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(status_error(status, body))
}

pub(crate) fn status_error(status: StatusCode, body: String) -> ServiceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::UpstreamAuth {
            status: status.as_u16(),
            body,
        },
        StatusCode::TOO_MANY_REQUESTS => ServiceError::UpstreamRateLimited,
        _ => ServiceError::UpstreamUnavailable(format!("{}: {}", status, body)),
    }
}
