//! Shopify OAuth 2.0 authorization-code flow.
//!
//! 1. Merchant opens GET /shopify/oauth/install?shop=<domain>
//! 2. We redirect to https://<domain>/admin/oauth/authorize with a signed state
//! 3. Merchant approves the app on Shopify
//! 4. Shopify redirects to /shopify/oauth/callback?shop=..&code=..&state=..
//! 5. State is verified, the code is exchanged once, the token is upserted
//! 6. Later questions for <domain> are answered with that token

mod exchange;
mod provider;
mod state_manager;

pub use provider::ShopifyProvider;
pub use state_manager::{run_state_cleanup, StateEntry, StateError, StateManager};

use crate::config::Config;
use crate::credentials::{Credential, CredentialStore};
use crate::error::{require_field, AppError};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Install query parameters
#[derive(Debug, Deserialize)]
pub struct InstallParams {
    pub shop: Option<String>,
}

/// OAuth callback query parameters
///
/// Shopify also sends `hmac`, `host` and `timestamp`; they are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub shop: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// OAuth success response
#[derive(Serialize)]
pub struct ConnectedResponse {
    status: &'static str,
}

/// Drives the install → callback flow and writes into the credential store.
pub struct OAuthHandler {
    provider: ShopifyProvider,
    state_manager: StateManager,
    credential_store: Arc<dyn CredentialStore>,
    http_client: reqwest::Client,
}

impl OAuthHandler {
    pub fn new(
        config: &Config,
        credential_store: Arc<dyn CredentialStore>,
        state_manager: StateManager,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.shopify.request_timeout_seconds))
            .build()
            .context("Failed to build platform HTTP client")?;

        Ok(Self {
            provider: ShopifyProvider::from_config(config),
            state_manager,
            credential_store,
            http_client,
        })
    }

    fn require_shop<'a>(&self, shop: Option<&'a str>) -> Result<&'a str, AppError> {
        let shop = require_field(shop, "shop")?;
        if !self.provider.is_valid_shop_domain(shop) {
            warn!(shop = %shop, "Rejected malformed shop domain");
            return Err(AppError::Validation(format!(
                "Invalid shop domain '{}'",
                shop
            )));
        }
        Ok(shop)
    }

    /// Builds the authorize URL for `shop`, bound to a fresh state token.
    ///
    /// No persistence and no outbound call.
    pub fn install(&self, shop: Option<&str>) -> Result<String, AppError> {
        let shop = self.require_shop(shop)?;

        let state = self.state_manager.create_state(shop);
        let auth_url = self.provider.build_auth_url(shop, &state);

        info!(shop = %shop, "Redirecting to Shopify authorization");
        Ok(auth_url)
    }

    /// Verifies state, exchanges the code once and upserts the token.
    ///
    /// Nothing is written unless the exchange succeeds.
    pub async fn callback(&self, params: &CallbackParams) -> Result<Credential, AppError> {
        if let Some(error) = &params.error {
            let description = params
                .error_description
                .as_deref()
                .unwrap_or("Unknown error");
            warn!(error = %error, description = %description, "OAuth authorization failed");
            return Err(AppError::Validation(format!(
                "OAuth authorization failed: {} - {}",
                error, description
            )));
        }

        let shop = self.require_shop(params.shop.as_deref())?;
        let code = require_field(params.code.as_deref(), "code")?;

        let state = params
            .state
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::InvalidState("Missing OAuth state".to_string()))?;

        self.state_manager
            .validate_and_consume(state, shop)
            .map_err(|e| {
                warn!(shop = %shop, reason = %e, "Invalid OAuth state");
                AppError::InvalidState(
                    "Invalid or expired OAuth state (possible CSRF attack)".to_string(),
                )
            })?;

        debug!(shop = %shop, "OAuth state validated");

        let access_token = exchange::exchange_code_for_token(
            &self.http_client,
            &self.provider.token_url(shop),
            &self.provider.client_id,
            &self.provider.client_secret,
            code,
        )
        .await
        .map_err(|e| {
            error!(shop = %shop, error = %format!("{:#}", e), "Token exchange failed");
            AppError::Upstream("Failed to exchange authorization code".to_string())
        })?;

        let credential = self
            .credential_store
            .upsert(shop, &access_token)
            .map_err(|e| {
                error!(shop = %shop, error = %format!("{:#}", e), "Failed to store credential");
                AppError::Storage
            })?;

        info!(shop = %shop, "Shop connected");
        Ok(credential)
    }
}

/// Create OAuth API router
pub fn create_oauth_router(handler: Arc<OAuthHandler>) -> Router {
    Router::new()
        .route("/shopify/oauth/install", get(oauth_install))
        .route("/shopify/oauth/callback", get(oauth_callback))
        .with_state(handler)
}

/// GET /shopify/oauth/install?shop=<domain>
///
/// 302 to the shop's authorize page.
async fn oauth_install(
    State(handler): State<Arc<OAuthHandler>>,
    Query(params): Query<InstallParams>,
) -> Result<Response, AppError> {
    let auth_url = handler.install(params.shop.as_deref())?;
    Ok((StatusCode::FOUND, [(header::LOCATION, auth_url)]).into_response())
}

/// GET /shopify/oauth/callback?shop=<domain>&code=<code>&state=<state>
async fn oauth_callback(
    State(handler): State<Arc<OAuthHandler>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<ConnectedResponse>, AppError> {
    handler.callback(&params).await?;
    Ok(Json(ConnectedResponse {
        status: "connected",
    }))
}
