//! Question proxy: POST /api/v1/questions.
//!
//! Resolves `store_id` to its stored credential and forwards the question to
//! the answering service. The answering service's JSON body is relayed
//! verbatim; the access token only ever leaves the process in that call.

mod client;
mod retry;

pub use client::AnswerClient;
pub use retry::RetryPolicy;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{require_field, AppError};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Question request body
#[derive(Debug, Default, Deserialize)]
pub struct QuestionRequest {
    pub store_id: Option<String>,
    pub question: Option<String>,
}

/// Raw answering-service response body, relayed unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerPayload(Bytes);

impl AnswerPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl IntoResponse for AnswerPayload {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            self.0,
        )
            .into_response()
    }
}

/// Shared state for the question API
pub struct QuestionProxy {
    credential_store: Arc<dyn CredentialStore>,
    answer_client: AnswerClient,
    max_body_bytes: usize,
}

impl QuestionProxy {
    pub fn new(config: &Config, credential_store: Arc<dyn CredentialStore>) -> Result<Self> {
        Ok(Self {
            credential_store,
            answer_client: AnswerClient::new(&config.answer_service)?,
            max_body_bytes: config.server.max_body_bytes,
        })
    }

    /// Answers `question` for `store_id`.
    ///
    /// Blank input fails before storage is touched; an unknown store fails
    /// before the answering service is contacted.
    pub async fn ask(
        &self,
        store_id: Option<&str>,
        question: Option<&str>,
    ) -> Result<AnswerPayload, AppError> {
        let store_id = require_field(store_id, "store_id")?;
        let question = require_field(question, "question")?;

        let credential = self
            .credential_store
            .find(store_id)
            .map_err(|e| {
                error!(store_id = %store_id, error = %format!("{:#}", e), "Credential lookup failed");
                AppError::Storage
            })?
            .ok_or_else(|| {
                debug!(store_id = %store_id, "Question for unknown store");
                AppError::NotFound("Store not found".to_string())
            })?;

        info!(
            store_id = %store_id,
            question_len = question.len(),
            "Forwarding question to answering service"
        );

        let body = self
            .answer_client
            .ask(&credential, question)
            .await
            .map_err(|e| {
                error!(store_id = %store_id, error = %format!("{:#}", e), "Answering service call failed");
                AppError::Upstream("Answering service unavailable".to_string())
            })?;

        Ok(AnswerPayload(body))
    }
}

/// Create question API router
///
/// The body limit replaces axum's 2 MB default so `max_body_bytes` is the
/// only limit in force.
pub fn create_question_router(proxy: Arc<QuestionProxy>) -> Router {
    let limit = proxy.max_body_bytes;
    Router::new()
        .route("/api/v1/questions", post(create_question))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(proxy)
}

/// POST /api/v1/questions
///
/// Body: `{"store_id": "<domain>", "question": "<text>"}`
async fn create_question(
    State(proxy): State<Arc<QuestionProxy>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<AnswerPayload, AppError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!(limit = proxy.max_body_bytes, "Question body too large");
            AppError::PayloadTooLarge
        } else {
            AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
        }
    })?;

    let request: QuestionRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))?;

    proxy
        .ask(request.store_id.as_deref(), request.question.as_deref())
        .await
}
