//! OAuth token lifecycle for Spotify users.
//!
//! Exchanges authorization codes, fetches the profile, persists encrypted
//! tokens, and keeps cached access tokens fresh. When the stored expiry is
//! still in the future the cheap path never touches the network; refresh is
//! the self-healing path after expiry or an upstream 401.
//!
//! Refreshes for the same user are single-flight: a per-user async lock
//! serializes them, and the loser of a race reuses the winner's token
//! instead of issuing a redundant refresh (which could discard a rotated
//! refresh token).

use crate::config::Config;
use crate::credentials::{CredentialStore, SpotifyUser};
use crate::error::ServiceError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Spotify accounts service base URL (token endpoint lives here).
pub const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Safety margin subtracted from a token's reported lifetime, so a token is
/// never used in its last moments of validity.
pub const EXPIRY_SKEW_SECONDS: i64 = 60;

const TOKEN_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Token endpoint response (authorization_code and refresh_token grants).
#[derive(Debug, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,

    /// Spotify omits this when it has not rotated the refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// The authenticated user's profile from `/v1/me`.
#[derive(Debug, Deserialize)]
pub struct Profile {
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}

/// Manages the token lifecycle for all users against one Spotify app.
pub struct TokenManager {
    http: Client,
    store: Arc<CredentialStore>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    accounts_base: String,
    api_base: String,
    /// One entry per user who has ever refreshed, never evicted: removing an
    /// entry would let a racer mint a second lock and run a duplicate
    /// refresh. Bounded by the credential store's row count.
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl TokenManager {
    /// Create a manager against the production Spotify endpoints.
    pub fn new(store: Arc<CredentialStore>, config: &Config) -> Self {
        Self::with_base_urls(
            store,
            config,
            ACCOUNTS_BASE.to_string(),
            super::client::API_BASE.to_string(),
        )
    }

    /// Create a manager with custom endpoints (for testing with a mock server).
    pub fn with_base_urls(
        store: Arc<CredentialStore>,
        config: &Config,
        accounts_base: String,
        api_base: String,
    ) -> Self {
        Self {
            http: Client::new(),
            store,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            accounts_base,
            api_base,
            refresh_locks: DashMap::new(),
        }
    }

    /// HTTP Basic credentials for the token endpoint.
    fn basic_auth(&self) -> String {
        BASE64.encode(format!("{}:{}", self.client_id, self.client_secret))
    }

    /// POST to the token endpoint; any non-success status is an upstream
    /// auth error carrying the upstream body.
    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenBundle, ServiceError> {
        let url = format!("{}/api/token", self.accounts_base);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Basic {}", self.basic_auth()))
            .form(form)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::UpstreamAuth {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Exchange an authorization code for a token bundle.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenBundle, ServiceError> {
        tracing::debug!("Exchanging authorization code for tokens");
        let bundle = self
            .post_token_form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.redirect_uri),
            ])
            .await?;

        tracing::debug!(
            has_refresh_token = bundle.refresh_token.is_some(),
            expires_in = bundle.expires_in,
            "Token exchange successful"
        );
        Ok(bundle)
    }

    /// Fetch the authenticated user's profile.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<Profile, ServiceError> {
        let url = format!("{}/me", self.api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::UpstreamAuth {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Create or update the user record from a fresh token bundle and profile.
    ///
    /// The access token is stored unconditionally; the refresh token only
    /// when the bundle carries one (absence means "keep existing"). Expiry
    /// is written with the skew already subtracted.
    pub async fn upsert_user(
        &self,
        bundle: &TokenBundle,
        profile: &Profile,
    ) -> Result<SpotifyUser, ServiceError> {
        let expires_at = Utc::now() + Duration::seconds((bundle.expires_in - EXPIRY_SKEW_SECONDS).max(0));
        let display_name = profile.display_name.as_deref().unwrap_or(&profile.id);

        self.store.upsert_user(
            &profile.id,
            Some(display_name),
            profile.email.as_deref(),
            &bundle.access_token,
            bundle.refresh_token.as_deref(),
            expires_at,
        )?;

        tracing::info!(spotify_id = %profile.id, "User upserted after authorization");

        self.store
            .get(&profile.id)?
            .ok_or_else(|| ServiceError::Storage(anyhow::anyhow!("upserted user not found")))
    }

    /// Yield a usable access token for the user.
    ///
    /// If the stored expiry is strictly in the future the stored token is
    /// returned without any network call. Otherwise the token is refreshed.
    pub async fn get_valid_access_token(&self, spotify_id: &str) -> Result<String, ServiceError> {
        let user = self
            .store
            .get(spotify_id)?
            .ok_or(ServiceError::Unauthenticated)?;

        if user.token_fresh_at(Utc::now()) {
            if let Some(token) = user.access_token {
                return Ok(token);
            }
        }

        self.refresh(spotify_id, None).await
    }

    /// Refresh the user's access token using the stored refresh token.
    ///
    /// `rejected` is the token the upstream just refused, if any; upstream
    /// invalidation is authoritative, so a stored token equal to it is
    /// refreshed even when its expiry claims otherwise.
    ///
    /// Holds the per-user lock across the network call. After acquiring it,
    /// the record is re-read: if another flight already produced a fresh,
    /// different token, that token is returned without a second refresh.
    /// Failure is fatal for the current request; there is no retry here.
    pub async fn refresh(
        &self,
        spotify_id: &str,
        rejected: Option<&str>,
    ) -> Result<String, ServiceError> {
        let lock = self
            .refresh_locks
            .entry(spotify_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let user = self
            .store
            .get(spotify_id)?
            .ok_or(ServiceError::Unauthenticated)?;

        if let Some(token) = user.access_token.as_deref() {
            if user.token_fresh_at(Utc::now()) && rejected != Some(token) {
                tracing::debug!(spotify_id = %spotify_id, "Refresh already performed by concurrent request");
                return Ok(token.to_string());
            }
        }

        tracing::debug!(spotify_id = %spotify_id, "Refreshing access token");
        let bundle = self
            .post_token_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &user.refresh_token),
            ])
            .await?;

        let expires_at = Utc::now() + Duration::seconds((bundle.expires_in - EXPIRY_SKEW_SECONDS).max(0));
        self.store
            .set_access_token(spotify_id, &bundle.access_token, expires_at)?;

        // Spotify may rotate the refresh token; the old one is then invalid
        if let Some(rotated) = bundle.refresh_token.as_deref() {
            self.store.set_refresh_token(spotify_id, rotated)?;
            tracing::debug!(spotify_id = %spotify_id, "Refresh token rotated");
        }

        tracing::info!(spotify_id = %spotify_id, "Access token refreshed");
        Ok(bundle.access_token)
    }
}
