//! HTTP client for the external answering service.

use super::retry::RetryPolicy;
use crate::config::AnswerServiceConfig;
use crate::credentials::Credential;
use anyhow::{anyhow, Context, Result};
use axum::body::Bytes;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Longest slice of an answering-service error body kept in the error message
const MAX_ERROR_BODY: usize = 200;

/// Body of POST {base_url}/ask
#[derive(Serialize)]
struct AskRequest<'a> {
    shop_domain: &'a str,
    access_token: &'a str,
    question: &'a str,
}

/// Forwards questions with the shop's credential attached.
pub struct AnswerClient {
    http_client: reqwest::Client,
    ask_url: String,
    retry: RetryPolicy,
}

impl AnswerClient {
    pub fn new(config: &AnswerServiceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build answering service HTTP client")?;

        Ok(Self {
            http_client,
            ask_url: format!("{}/ask", config.base_url.trim_end_matches('/')),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Sends one logical request and returns the raw JSON body.
    ///
    /// Transport failures are retried per the retry policy. A non-success
    /// status or a body that is not JSON is an error. The returned bytes are
    /// exactly what the service sent.
    pub async fn ask(&self, credential: &Credential, question: &str) -> Result<Bytes> {
        let request = AskRequest {
            shop_domain: &credential.shop_domain,
            access_token: credential.access_token.expose_secret(),
            question,
        };

        let mut attempt = 0;
        let response = loop {
            match self
                .http_client
                .post(&self.ask_url)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => break response,
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.backoff(attempt);
                    attempt += 1;
                    warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Answering service unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(anyhow!(
                        "Failed to reach answering service after {} attempt(s): {}",
                        attempt + 1,
                        e
                    ))
                }
            }
        };

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("Failed to read answering service response")?;

        if !status.is_success() {
            // The service may echo its input back, token included
            let preview: String = String::from_utf8_lossy(&body)
                .replace(credential.access_token.expose_secret(), "[REDACTED]")
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(anyhow!(
                "Answering service returned status {}: {}",
                status,
                preview
            ));
        }

        serde_json::from_slice::<serde::de::IgnoredAny>(&body)
            .context("Answering service returned a non-JSON body")?;

        Ok(body)
    }
}
