//! OAuth state management for CSRF protection.
//!
//! A state token is `<nonce>.<hex hmac-sha256(nonce "|" shop)>`, keyed by the
//! app's client secret. The nonce is also tracked in memory so each token is
//! accepted once, for one shop, within the expiry window.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// OAuth state entry
#[derive(Clone, Debug)]
pub struct StateEntry {
    pub shop: String,
    pub created_at: DateTime<Utc>,
}

/// Why a state token was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("malformed state token")]
    Malformed,
    #[error("state signature does not match shop")]
    BadSignature,
    #[error("state token unknown or already used")]
    Unknown,
    #[error("state token expired")]
    Expired,
}

/// OAuth state manager with automatic expiration
#[derive(Clone)]
pub struct StateManager {
    states: Arc<Mutex<HashMap<String, StateEntry>>>,
    mac: HmacSha256,
    expiry_duration: Duration,
}

impl StateManager {
    /// Create a new state manager
    ///
    /// # Arguments
    /// * `signing_key` - HMAC key (the app's client secret)
    /// * `expiry_seconds` - How long states remain valid (default: 600 = 10 minutes)
    pub fn new(signing_key: &[u8], expiry_seconds: i64) -> Result<Self> {
        if signing_key.is_empty() {
            return Err(anyhow!("OAuth state signing key must not be empty"));
        }
        let mac = HmacSha256::new_from_slice(signing_key)
            .map_err(|e| anyhow!("Invalid OAuth state signing key: {}", e))?;
        let expiry_duration = Duration::try_seconds(expiry_seconds)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| anyhow!("Invalid OAuth state expiry: {} seconds", expiry_seconds))?;

        Ok(Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            mac,
            expiry_duration,
        })
    }

    fn states(&self) -> MutexGuard<'_, HashMap<String, StateEntry>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signer(&self, nonce: &str, shop: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(nonce.as_bytes());
        mac.update(b"|");
        mac.update(shop.as_bytes());
        mac
    }

    /// Issue a signed state token bound to `shop`
    pub fn create_state(&self, shop: &str) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = hex::encode(self.signer(&nonce, shop).finalize().into_bytes());

        self.states().insert(
            nonce.clone(),
            StateEntry {
                shop: shop.to_string(),
                created_at: Utc::now(),
            },
        );

        format!("{}.{}", nonce, signature)
    }

    /// Validate and consume a state token presented with `shop`
    ///
    /// The signature is checked first (constant time), so a forged or
    /// mismatched token never consumes a pending nonce.
    pub fn validate_and_consume(&self, token: &str, shop: &str) -> Result<StateEntry, StateError> {
        let (nonce, signature) = token.split_once('.').ok_or(StateError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| StateError::Malformed)?;

        self.signer(nonce, shop)
            .verify_slice(&signature)
            .map_err(|_| StateError::BadSignature)?;

        // Single-use
        let entry = self.states().remove(nonce).ok_or(StateError::Unknown)?;

        if Utc::now() - entry.created_at > self.expiry_duration {
            return Err(StateError::Expired);
        }
        if entry.shop != shop {
            return Err(StateError::BadSignature);
        }

        Ok(entry)
    }

    /// Clean up expired states (should be called periodically)
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        let expiry = self.expiry_duration;

        self.states()
            .retain(|_, entry| now - entry.created_at <= expiry);
    }

    /// Get count of pending states
    pub fn count(&self) -> usize {
        self.states().len()
    }
}

/// Background task to periodically clean up expired states
pub async fn run_state_cleanup(manager: StateManager, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        manager.cleanup_expired();
        tracing::debug!(pending = manager.count(), "OAuth state cleanup complete");
    }
}
