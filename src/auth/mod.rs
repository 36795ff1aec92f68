//! OAuth CSRF state and server-side sessions.
//!
//! The session is the only per-browser mutable state the service keeps: an
//! opaque id in a cookie maps to at most `{oauth_state?, spotify_id?}` on
//! the server. The state guard layers one-time CSRF validation on top of it.

mod session;
mod state;

pub use session::{run_session_cleanup, SessionStore, SESSION_COOKIE, SESSION_TTL_DAYS};
pub use state::{generate_state, save_state, validate_state};
