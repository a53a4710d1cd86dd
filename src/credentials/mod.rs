//! Shop credential storage.
//!
//! One row per shop domain holding the access token obtained from the OAuth
//! exchange. The token is sealed with AES-256-GCM before it reaches SQLite.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  CredentialStore (trait)                 │
//! │  - upsert(shop_domain, access_token)     │
//! │  - find(shop_domain)                     │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!     (seal)                (open)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │  SqliteCredentialStore                   │
//! │  - ON CONFLICT(shop_domain) DO UPDATE    │
//! │  - TokenCipher, unique nonce per write   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use shopq::credentials::{CredentialStore, SqliteCredentialStore};
//! use secrecy::{ExposeSecret, SecretString};
//!
//! # fn main() -> anyhow::Result<()> {
//! let encryption_key = std::env::var("SHOPQ_ENCRYPTION_KEY")?;
//! let store = SqliteCredentialStore::new("shopq.db", &encryption_key)?;
//!
//! let token = SecretString::new("shpat_123".to_string());
//! store.upsert("foo.myshopify.com", &token)?;
//!
//! if let Some(credential) = store.find("foo.myshopify.com")? {
//!     assert_eq!(credential.access_token.expose_secret(), "shpat_123");
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

mod encryption;
mod storage;

pub use encryption::{SealedToken, TokenCipher};
pub use storage::SqliteCredentialStore;

/// One shop's authorization to call the platform and the answering service.
///
/// `Debug` never prints the access token.
#[derive(Clone, Debug)]
pub struct Credential {
    /// Natural key, unique across the store
    pub shop_domain: String,

    /// OAuth access token, replaced on every re-install
    pub access_token: SecretString,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable mapping from shop domain to credential.
///
/// Implementations own the uniqueness invariant: at most one credential per
/// shop domain, last writer wins on `access_token`.
pub trait CredentialStore: Send + Sync {
    /// Inserts a credential or overwrites the token of the existing one.
    fn upsert(&self, shop_domain: &str, access_token: &SecretString) -> Result<Credential>;

    /// Exact-match lookup.
    fn find(&self, shop_domain: &str) -> Result<Option<Credential>>;
}
