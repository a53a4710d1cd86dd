// HTTP API: Shopify OAuth flow and question proxy

pub mod oauth;
pub mod questions;

pub use oauth::{create_oauth_router, run_state_cleanup, OAuthHandler, StateManager};
pub use questions::{create_question_router, AnswerPayload, QuestionProxy};

use crate::config::{Config, ServerConfig};
use crate::credentials::CredentialStore;
use anyhow::Result;
use axum::{
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Everything the router needs, built once from the configuration.
#[derive(Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthHandler>,
    pub questions: Arc<QuestionProxy>,
    pub state_manager: StateManager,
}

impl AppState {
    pub fn new(config: &Config, credential_store: Arc<dyn CredentialStore>) -> Result<Self> {
        let state_manager = StateManager::new(
            config.shopify.client_secret.expose_secret().as_bytes(),
            config.oauth.state_expiry_seconds,
        )?;

        let oauth = Arc::new(OAuthHandler::new(
            config,
            Arc::clone(&credential_store),
            state_manager.clone(),
        )?);
        let questions = Arc::new(QuestionProxy::new(config, credential_store)?);

        Ok(Self {
            oauth,
            questions,
            state_manager,
        })
    }
}

/// Create the full application router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(create_oauth_router(state.oauth))
        .merge(create_question_router(state.questions))
        .layer(build_cors_layer(server))
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn build_cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if server.cors_allowed_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
