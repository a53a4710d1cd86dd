//! Bounded exponential backoff for the answering-service call.

use crate::config::AnswerServiceConfig;
use std::time::Duration;

/// Retries transport failures only; HTTP error statuses are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AnswerServiceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Connect failures and timeouts are transient; everything else is final.
    pub fn should_retry(&self, error: &reqwest::Error, attempt: u32) -> bool {
        attempt < self.max_retries && (error.is_connect() || error.is_timeout())
    }
}
