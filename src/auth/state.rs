//! OAuth `state` parameter handling for CSRF protection.
//!
//! The state token is generated per login attempt, saved in the session, and
//! consumed on the first validation attempt regardless of outcome. A replayed
//! callback can never validate twice even if the original state leaked.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

use super::SessionStore;

/// Entropy of the state token in bytes. Matches the original flow's 24-byte
/// URL-safe token; the minimum acceptable is 16.
const STATE_BYTES: usize = 24;

/// Generates a cryptographically strong URL-safe state token.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Saves the state in the session, overwriting any prior value.
pub fn save_state(sessions: &SessionStore, sid: &str, state: &str) {
    sessions.set_oauth_state(sid, state);
}

/// Validates a received state against the stored one.
///
/// The stored value is removed unconditionally before comparison (one-time
/// use, even on mismatch or absence). Returns true iff a value was stored
/// and it exactly equals `received`.
pub fn validate_state(sessions: &SessionStore, sid: &str, received: Option<&str>) -> bool {
    let expected = sessions.take_oauth_state(sid);
    match (expected, received) {
        (Some(expected), Some(received)) => expected == received,
        _ => false,
    }
}
