//! Encrypted Spotify user storage using SQLite.
//!
//! One row per Spotify user. Tokens are encrypted before they touch the
//! database and decrypted on read; a decryption failure surfaces as
//! [`ServiceError::InvalidCiphertext`] because it means the master key was
//! rotated without re-encrypting stored tokens.

use super::{encryption, SpotifyUser};
use crate::error::ServiceError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Encrypted credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE spotify_users (
///     id INTEGER PRIMARY KEY,
///     spotify_id TEXT NOT NULL UNIQUE,
///     display_name TEXT,
///     email TEXT,
///     access_token TEXT,            -- Encrypted, absent means "must refresh"
///     access_token_nonce TEXT,
///     refresh_token TEXT NOT NULL,  -- Encrypted, required once a row exists
///     refresh_token_nonce TEXT NOT NULL,
///     expires_at TEXT,              -- ISO 8601, skew already subtracted
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// # Thread safety
/// The connection is wrapped in a Mutex; SQLite's upsert keeps concurrent
/// token rotations atomic at the row level.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl CredentialStore {
    /// Creates or opens a credential store.
    ///
    /// Validates the base64 master key and creates the schema if needed.
    /// Failure here is fatal at startup.
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key_bytes = encryption::validate_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS spotify_users (
                id INTEGER PRIMARY KEY,
                spotify_id TEXT NOT NULL UNIQUE,
                display_name TEXT,
                email TEXT,
                access_token TEXT,
                access_token_nonce TEXT,
                refresh_token TEXT NOT NULL,
                refresh_token_nonce TEXT NOT NULL,
                expires_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create spotify_users table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }

    /// Inserts or updates a user record after a successful authorization.
    ///
    /// Keyed on `spotify_id`: repeated calls for the same user update the
    /// existing row, never duplicate it. Profile fields and the access token
    /// are always replaced; the refresh token is replaced only when one is
    /// supplied, since Spotify omits it when it has not rotated. Absence
    /// means "keep existing". `created_at` is set once, `updated_at` every
    /// time.
    pub fn upsert_user(
        &self,
        spotify_id: &str,
        display_name: Option<&str>,
        email: Option<&str>,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let (access_enc, access_nonce) = encryption::encrypt(access_token, &self.encryption_key)
            .context("Failed to encrypt access token")?;

        let (refresh_enc, refresh_nonce) = match refresh_token {
            Some(token) => {
                let (enc, nonce) = encryption::encrypt(token, &self.encryption_key)
                    .context("Failed to encrypt refresh token")?;
                (Some(enc), Some(nonce))
            }
            None => (None, None),
        };

        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                // The refresh token columns coalesce with the existing row
                // inside VALUES: the NOT NULL check runs on the candidate row
                // before ON CONFLICT fires, so the fallback has to happen
                // there. For a first insert the subquery finds no row and the
                // NOT NULL constraint rejects an absent refresh token.
                r#"
                INSERT INTO spotify_users (
                    spotify_id, display_name, email,
                    access_token, access_token_nonce,
                    refresh_token, refresh_token_nonce,
                    expires_at, created_at, updated_at
                )
                VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    COALESCE(?6, (SELECT refresh_token FROM spotify_users WHERE spotify_id = ?1)),
                    COALESCE(?7, (SELECT refresh_token_nonce FROM spotify_users WHERE spotify_id = ?1)),
                    ?8, ?9, ?9
                )
                ON CONFLICT(spotify_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    email = excluded.email,
                    access_token = excluded.access_token,
                    access_token_nonce = excluded.access_token_nonce,
                    refresh_token = excluded.refresh_token,
                    refresh_token_nonce = excluded.refresh_token_nonce,
                    expires_at = excluded.expires_at,
                    updated_at = excluded.updated_at
                "#,
                params![
                    spotify_id,
                    display_name,
                    email,
                    access_enc,
                    access_nonce,
                    refresh_enc,
                    refresh_nonce,
                    expires_at.to_rfc3339(),
                    now,
                ],
            )
            .context("Failed to upsert user")?;

        Ok(())
    }

    /// Retrieves and decrypts a user record.
    pub fn get(&self, spotify_id: &str) -> Result<Option<SpotifyUser>, ServiceError> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                r#"
                SELECT spotify_id, display_name, email,
                       access_token, access_token_nonce,
                       refresh_token, refresh_token_nonce,
                       expires_at
                FROM spotify_users
                WHERE spotify_id = ?1
                "#,
                params![spotify_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query user")?;

        let Some((id, display_name, email, access_enc, access_nonce, refresh_enc, refresh_nonce, expires_at)) =
            row
        else {
            return Ok(None);
        };

        let access_token = match (access_enc, access_nonce) {
            (Some(enc), Some(nonce)) => Some(
                encryption::decrypt(&enc, &nonce, &self.encryption_key)
                    .map_err(|_| ServiceError::InvalidCiphertext)?,
            ),
            _ => None,
        };

        let refresh_token = encryption::decrypt(&refresh_enc, &refresh_nonce, &self.encryption_key)
            .map_err(|_| ServiceError::InvalidCiphertext)?;

        let expires_at = expires_at
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .context("Failed to parse expires_at timestamp")?;

        Ok(Some(SpotifyUser {
            spotify_id: id,
            display_name,
            email,
            access_token,
            refresh_token,
            expires_at,
        }))
    }

    /// Replaces the cached access token and expiry after a refresh.
    pub fn set_access_token(
        &self,
        spotify_id: &str,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let (access_enc, access_nonce) = encryption::encrypt(access_token, &self.encryption_key)
            .context("Failed to encrypt access token")?;

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                UPDATE spotify_users
                SET access_token = ?2, access_token_nonce = ?3,
                    expires_at = ?4, updated_at = ?5
                WHERE spotify_id = ?1
                "#,
                params![
                    spotify_id,
                    access_enc,
                    access_nonce,
                    expires_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to update access token")?;

        Ok(())
    }

    /// Replaces the stored refresh token after Spotify rotates it.
    pub fn set_refresh_token(&self, spotify_id: &str, refresh_token: &str) -> Result<(), ServiceError> {
        let (refresh_enc, refresh_nonce) = encryption::encrypt(refresh_token, &self.encryption_key)
            .context("Failed to encrypt refresh token")?;

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                UPDATE spotify_users
                SET refresh_token = ?2, refresh_token_nonce = ?3, updated_at = ?4
                WHERE spotify_id = ?1
                "#,
                params![
                    spotify_id,
                    refresh_enc,
                    refresh_nonce,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to update refresh token")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::Duration;

    fn create_test_store() -> CredentialStore {
        let key = BASE64.encode([0u8; 32]);
        CredentialStore::new(":memory:", &key).expect("Failed to create test store")
    }

    #[test]
    fn test_upsert_and_get() {
        let store = create_test_store();
        let expires = Utc::now() + Duration::hours(1);

        store
            .upsert_user("u1", Some("Bob"), Some("bob@example.com"), "A", Some("R"), expires)
            .unwrap();

        let user = store.get("u1").unwrap().expect("user not found");
        assert_eq!(user.spotify_id, "u1");
        assert_eq!(user.display_name.as_deref(), Some("Bob"));
        assert_eq!(user.email.as_deref(), Some("bob@example.com"));
        assert_eq!(user.access_token.as_deref(), Some("A"));
        assert_eq!(user.refresh_token, "R");
        assert!(user.expires_at.is_some());
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get("nobody").unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent_on_key() {
        let store = create_test_store();
        let expires = Utc::now() + Duration::hours(1);

        store
            .upsert_user("u1", Some("Bob"), None, "A1", Some("R1"), expires)
            .unwrap();
        store
            .upsert_user("u1", Some("Bobby"), Some("b@x.com"), "A2", Some("R2"), expires)
            .unwrap();

        // One row, with the updated fields
        let count: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM spotify_users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let user = store.get("u1").unwrap().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Bobby"));
        assert_eq!(user.access_token.as_deref(), Some("A2"));
        assert_eq!(user.refresh_token, "R2");
    }

    #[test]
    fn test_upsert_without_refresh_keeps_existing() {
        let store = create_test_store();
        let expires = Utc::now() + Duration::hours(1);

        store
            .upsert_user("u1", Some("Bob"), None, "A1", Some("R1"), expires)
            .unwrap();
        // Re-auth response without a rotated refresh token
        store
            .upsert_user("u1", Some("Bob"), None, "A2", None, expires)
            .unwrap();

        let user = store.get("u1").unwrap().unwrap();
        assert_eq!(user.access_token.as_deref(), Some("A2"));
        assert_eq!(user.refresh_token, "R1");

        // Repeated re-auths keep working and never duplicate the row
        store
            .upsert_user("u1", Some("Bobby"), None, "A3", None, expires)
            .unwrap();

        let count: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM spotify_users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let user = store.get("u1").unwrap().unwrap();
        assert_eq!(user.access_token.as_deref(), Some("A3"));
        assert_eq!(user.refresh_token, "R1");
    }

    #[test]
    fn test_first_insert_requires_refresh_token() {
        let store = create_test_store();
        let expires = Utc::now() + Duration::hours(1);

        // NOT NULL constraint: a record cannot exist without a recovery path
        assert!(store.upsert_user("u1", None, None, "A", None, expires).is_err());
    }

    #[test]
    fn test_set_access_token() {
        let store = create_test_store();
        let expires = Utc::now() + Duration::hours(1);

        store.upsert_user("u1", None, None, "A1", Some("R"), expires).unwrap();

        let new_expiry = Utc::now() + Duration::hours(2);
        store.set_access_token("u1", "A2", new_expiry).unwrap();

        let user = store.get("u1").unwrap().unwrap();
        assert_eq!(user.access_token.as_deref(), Some("A2"));
        assert_eq!(user.refresh_token, "R");
        assert!(user.expires_at.unwrap() > expires);
    }

    #[test]
    fn test_set_refresh_token_rotation() {
        let store = create_test_store();
        let expires = Utc::now() + Duration::hours(1);

        store.upsert_user("u1", None, None, "A", Some("R1"), expires).unwrap();
        store.set_refresh_token("u1", "R2").unwrap();

        let user = store.get("u1").unwrap().unwrap();
        assert_eq!(user.refresh_token, "R2");
    }

    #[test]
    fn test_wrong_key_yields_invalid_ciphertext() {
        let key1 = BASE64.encode([0u8; 32]);
        let key2 = BASE64.encode([1u8; 32]);

        // Two stores over the same database file, different keys
        let dir = std::env::temp_dir().join(format!("greenroom-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = dir.join("creds.db");

        let store1 = CredentialStore::new(&db, &key1).unwrap();
        store1
            .upsert_user("u1", None, None, "A", Some("R"), Utc::now())
            .unwrap();
        drop(store1);

        let store2 = CredentialStore::new(&db, &key2).unwrap();
        let err = store2.get("u1").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCiphertext));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_encryption_key() {
        assert!(CredentialStore::new(":memory:", "short").is_err());
        assert!(CredentialStore::new(":memory:", "not-valid-base64!@#$").is_err());
    }
}
