//! In-memory server-side sessions.
//!
//! Sessions are keyed by a random opaque id carried in the `sid` cookie and
//! expire seven days after login. Instead of a free-form map, the store
//! exposes a narrow typed surface with the two keys the service actually
//! uses.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Cookie name carrying the session id.
pub const SESSION_COOKIE: &str = "sid";

/// Session lifetime, set at login.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Clone, Debug, Default)]
struct Session {
    oauth_state: Option<String>,
    spotify_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// Server-side session store.
///
/// Reads treat an expired session as absent; a periodic cleanup task drops
/// expired entries from memory.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new session and returns its id.
    ///
    /// The session has no expiry until [`Self::set_spotify_id`] establishes
    /// a login; until then it only carries the OAuth state for the flow in
    /// progress.
    pub fn create(&self) -> String {
        let sid = Uuid::new_v4().to_string();
        self.sessions.insert(sid.clone(), Session::default());
        sid
    }

    fn live(&self, session: &Session) -> bool {
        match session.expires_at {
            Some(expires_at) => expires_at > Utc::now(),
            None => true,
        }
    }

    /// Whether a live session exists for this id.
    pub fn exists(&self, sid: &str) -> bool {
        self.sessions.get(sid).map(|s| self.live(&s)).unwrap_or(false)
    }

    /// Stores the OAuth state, overwriting any prior value. Only one
    /// authorization flow per session is outstanding at a time.
    pub fn set_oauth_state(&self, sid: &str, state: &str) {
        if let Some(mut session) = self.sessions.get_mut(sid) {
            session.oauth_state = Some(state.to_string());
        }
    }

    /// Removes and returns the stored OAuth state, if any.
    ///
    /// Removal is unconditional: the state is consumed whether or not the
    /// caller's comparison succeeds. A missing session is not an error.
    pub fn take_oauth_state(&self, sid: &str) -> Option<String> {
        let mut session = self.sessions.get_mut(sid)?;
        if !self.live(&session) {
            return None;
        }
        session.oauth_state.take()
    }

    /// Marks the session as logged in and starts the 7-day expiry clock.
    pub fn set_spotify_id(&self, sid: &str, spotify_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(sid) {
            session.spotify_id = Some(spotify_id.to_string());
            session.expires_at = Some(Utc::now() + Duration::days(SESSION_TTL_DAYS));
        }
    }

    /// Returns the logged-in user's Spotify id, if the session is live.
    pub fn spotify_id(&self, sid: &str) -> Option<String> {
        let session = self.sessions.get(sid)?;
        if !self.live(&session) {
            return None;
        }
        session.spotify_id.clone()
    }

    /// Drops expired sessions from memory.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, session| match session.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        });
    }

    /// Active session count (for monitoring).
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

/// Background task to periodically drop expired sessions.
pub async fn run_session_cleanup(store: std::sync::Arc<SessionStore>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        store.cleanup_expired();
        tracing::debug!("Session cleanup complete, {} sessions remaining", store.count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_login() {
        let store = SessionStore::new();

        let sid = store.create();
        assert!(store.spotify_id(&sid).is_none());

        store.set_spotify_id(&sid, "u1");
        assert_eq!(store.spotify_id(&sid).as_deref(), Some("u1"));
    }

    #[test]
    fn test_unknown_session_id() {
        let store = SessionStore::new();
        assert!(store.spotify_id("no-such-session").is_none());
        assert!(store.take_oauth_state("no-such-session").is_none());
    }

    #[test]
    fn test_oauth_state_is_taken_once() {
        let store = SessionStore::new();
        let sid = store.create();

        store.set_oauth_state(&sid, "abc");
        assert_eq!(store.take_oauth_state(&sid).as_deref(), Some("abc"));
        assert!(store.take_oauth_state(&sid).is_none());
    }

    #[test]
    fn test_oauth_state_overwrites() {
        let store = SessionStore::new();
        let sid = store.create();

        // Only one outstanding flow per session
        store.set_oauth_state(&sid, "first");
        store.set_oauth_state(&sid, "second");
        assert_eq!(store.take_oauth_state(&sid).as_deref(), Some("second"));
    }

    #[test]
    fn test_expired_session_reads_as_absent() {
        let store = SessionStore::new();
        let sid = store.create();
        store.set_spotify_id(&sid, "u1");

        // Force expiry in the past
        store.sessions.get_mut(&sid).unwrap().expires_at = Some(Utc::now() - Duration::seconds(1));

        assert!(store.spotify_id(&sid).is_none());
    }

    #[test]
    fn test_cleanup_removes_expired() {
        let store = SessionStore::new();
        let live = store.create();
        let dead = store.create();
        store.set_spotify_id(&live, "u1");
        store.sessions.get_mut(&dead).unwrap().expires_at = Some(Utc::now() - Duration::seconds(1));

        store.cleanup_expired();

        assert_eq!(store.count(), 1);
        assert_eq!(store.spotify_id(&live).as_deref(), Some("u1"));
    }
}
