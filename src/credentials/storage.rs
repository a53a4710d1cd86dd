//! SQLite-backed credential store.
//!
//! Access tokens are sealed with AES-256-GCM before they are written.

use super::{Credential, CredentialStore, SealedToken, TokenCipher};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE stores (
///     id INTEGER PRIMARY KEY,
///     shop_domain TEXT NOT NULL UNIQUE,
///     access_token TEXT NOT NULL,        -- Sealed
///     access_token_nonce TEXT NOT NULL,  -- Nonce for access_token
///     created_at TEXT NOT NULL,          -- RFC 3339
///     updated_at TEXT NOT NULL           -- RFC 3339
/// );
/// ```
///
/// # Thread Safety
/// The connection sits behind a mutex and every upsert is a single
/// `INSERT … ON CONFLICT(shop_domain) DO UPDATE` statement, so concurrent
/// installs for one shop never produce a second row or a half-written one.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    cipher: TokenCipher,
}

impl SqliteCredentialStore {
    /// Creates or opens a credential store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher = TokenCipher::from_base64_key(encryption_key)
            .context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("Failed to set busy timeout")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS stores (
                id INTEGER PRIMARY KEY,
                shop_domain TEXT NOT NULL UNIQUE,
                access_token TEXT NOT NULL,
                access_token_nonce TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create stores table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Credential store connection lock poisoned"))
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn upsert(&self, shop_domain: &str, access_token: &SecretString) -> Result<Credential> {
        let sealed = self
            .cipher
            .seal(access_token.expose_secret())
            .context("Failed to seal access token")?;

        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        let (created_at, updated_at): (String, String) = conn
            .query_row(
                r#"
                INSERT INTO stores (
                    shop_domain, access_token, access_token_nonce,
                    created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?4)
                ON CONFLICT(shop_domain) DO UPDATE SET
                    access_token = excluded.access_token,
                    access_token_nonce = excluded.access_token_nonce,
                    updated_at = excluded.updated_at
                RETURNING created_at, updated_at
                "#,
                params![shop_domain, sealed.ciphertext, sealed.nonce, now],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("Failed to upsert credential")?;

        Ok(Credential {
            shop_domain: shop_domain.to_string(),
            access_token: access_token.clone(),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn find(&self, shop_domain: &str) -> Result<Option<Credential>> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                r#"
                SELECT access_token, access_token_nonce, created_at, updated_at
                FROM stores
                WHERE shop_domain = ?1
                "#,
                params![shop_domain],
                |row| {
                    Ok((
                        SealedToken {
                            ciphertext: row.get(0)?,
                            nonce: row.get(1)?,
                        },
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query credential")?
        };

        let Some((sealed, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let access_token = self
            .cipher
            .open(&sealed)
            .context("Failed to open access token")?;

        Ok(Some(Credential {
            shop_domain: shop_domain.to_string(),
            access_token: SecretString::new(access_token),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in stores table: {}", value))
}
