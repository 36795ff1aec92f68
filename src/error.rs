//! Service error taxonomy.
//!
//! One enum covers every failure the service layer can produce, so handlers
//! can map each class to an HTTP status without string matching. Upstream
//! errors keep the upstream status and body for debugging; tokens are never
//! included in error values.

use thiserror::Error;

/// Errors produced by the auth flow, token lifecycle, and data services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed inbound parameters (e.g. no authorization code).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// OAuth state absent or mismatched; the flow must be restarted.
    #[error("invalid OAuth state")]
    CsrfStateMismatch,

    /// No valid session for the request.
    #[error("not authenticated")]
    Unauthenticated,

    /// The upstream rejected our credentials or token exchange.
    #[error("upstream auth error ({status}): {body}")]
    UpstreamAuth { status: u16, body: String },

    /// Rate limited after the retry budget was exhausted.
    #[error("upstream rate limited")]
    UpstreamRateLimited,

    /// Timeout, 5xx, network failure, or other upstream error.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A stored token cannot be decrypted with the current key. This means
    /// the key was rotated without re-encrypting stored tokens; operator
    /// action is required, not a retry.
    #[error("stored token cannot be decrypted with the current key")]
    InvalidCiphertext,

    /// Database or other internal failure.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        // Transport-level failures (connect, timeout, body read). Status
        // errors are mapped explicitly by callers, not here.
        ServiceError::UpstreamUnavailable(err.to_string())
    }
}
