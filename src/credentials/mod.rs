//! Encrypted credential storage for Spotify OAuth tokens.
//!
//! One row per Spotify user, keyed by their stable Spotify ID. Access and
//! refresh tokens are encrypted at rest with AES-256-GCM, each with its own
//! nonce; the master key lives in memory only, sourced from configuration
//! at startup. SQLite provides atomic upserts so token rotation can never
//! produce a duplicate or half-written record.

use chrono::{DateTime, Utc};

mod encryption;
mod storage;

pub use storage::CredentialStore;

// Re-exported for startup key validation and tests
pub use encryption::{decrypt, encrypt, validate_key};

/// A Spotify user's profile and decrypted token material.
///
/// This is the in-memory view; at rest both tokens are ciphertext. An absent
/// access token means there is no cached token and a refresh is required,
/// and `expires_at` is meaningless in that case. The refresh token is always
/// present once a record exists, since refresh is the only durable recovery
/// path.
#[derive(Clone, Debug)]
pub struct SpotifyUser {
    /// Stable unique identifier from Spotify
    pub spotify_id: String,

    /// Display name from the profile (may fall back to the ID)
    pub display_name: Option<String>,

    /// Email from the profile, when the scope grants it
    pub email: Option<String>,

    /// Cached access token (decrypted)
    pub access_token: Option<String>,

    /// Long-lived refresh token (decrypted); rotated by Spotify at will
    pub refresh_token: String,

    /// When the cached access token stops being usable (skew already
    /// subtracted at write time)
    pub expires_at: Option<DateTime<Utc>>,
}

impl SpotifyUser {
    /// Whether the cached access token is still usable at `now`.
    pub fn token_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }
}
