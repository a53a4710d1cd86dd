//! OAuth token exchange logic.
//!
//! Trades a single-use authorization code for a shop's offline access token.

use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Longest slice of a provider error body kept in the error message
const MAX_ERROR_BODY: usize = 200;

/// Token exchange request (form-encoded)
#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

/// Token exchange response
#[derive(Deserialize)]
struct TokenResponse {
    access_token: SecretString,
    #[serde(default)]
    scope: Option<String>,
}

/// Exchange authorization code for access token
///
/// Makes exactly one POST; the code is single-use so a failed attempt is
/// never repeated. Errors carry the provider status and body but never the
/// client secret or a token.
///
/// # Arguments
/// * `client` - HTTP client with the configured timeout
/// * `token_url` - Shop's `/admin/oauth/access_token` endpoint
/// * `client_id` - App client ID
/// * `client_secret` - App client secret
/// * `code` - Authorization code from callback
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &SecretString,
    code: &str,
) -> Result<SecretString> {
    let form = TokenRequest {
        client_id,
        client_secret: client_secret.expose_secret(),
        code,
    };

    tracing::debug!(token_url = %token_url, "Exchanging authorization code for token");

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to send token exchange request: {}", e.without_url()))?;

    let status = response.status();
    if !status.is_success() {
        let body: String = response
            .text()
            .await
            .unwrap_or_default()
            .replace(client_secret.expose_secret(), "[REDACTED]")
            .chars()
            .take(MAX_ERROR_BODY)
            .collect();
        return Err(anyhow!(
            "Token exchange failed with status {}: {}",
            status,
            body
        ));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    if token_response.access_token.expose_secret().is_empty() {
        return Err(anyhow!("Token response contained an empty access_token"));
    }

    tracing::debug!(
        scope = token_response.scope.as_deref().unwrap_or(""),
        "Token exchange successful"
    );

    Ok(token_response.access_token)
}
