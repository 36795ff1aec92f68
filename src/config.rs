//! Environment configuration.
//!
//! Everything the process needs from the environment is read exactly once
//! at startup into a [`Config`]. Components receive the config by reference;
//! nothing reads environment variables ad hoc after initialization.

use anyhow::{anyhow, Context, Result};

/// Process configuration, sourced from environment variables at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Spotify application client ID
    pub client_id: String,

    /// Spotify application client secret
    pub client_secret: String,

    /// OAuth callback URL registered with Spotify
    pub redirect_uri: String,

    /// Where the callback redirects the browser after a successful login
    pub frontend_url: String,

    /// Base64-encoded 32-byte master key for token encryption
    pub encryption_key: String,

    /// Path to the SQLite credential database
    pub database_path: String,

    /// Listen address for the HTTP server
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Client credentials, the redirect URI, and the encryption key are
    /// required; a missing or malformed encryption key is fatal here rather
    /// than at first use, so a misconfigured process never serves traffic.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            client_id: require("SPOTIFY_CLIENT_ID")?,
            client_secret: require("SPOTIFY_CLIENT_SECRET")?,
            redirect_uri: require("SPOTIFY_REDIRECT_URI")?,
            frontend_url: std::env::var("FRONTEND_APP_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            encryption_key: require("ENCRYPTION_KEY")?,
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "spotify.db".to_string()),
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
        };

        // Fail fast on a key that could never decrypt anything
        crate::credentials::validate_key(&config.encryption_key)
            .context("ENCRYPTION_KEY is not a valid base64-encoded 32-byte key")?;

        Ok(config)
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("Missing required environment variable: {}", name))
}
