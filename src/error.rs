//! Error taxonomy shared by the OAuth and question endpoints.
//!
//! Every variant maps to a distinct HTTP status so the chat client can tell
//! "bad input" from "unknown store" from "service unavailable". Messages are
//! caller-facing and never carry provider detail or secret material; the
//! detail is logged where the error is created.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input, rejected before any storage or network I/O.
    #[error("{0}")]
    Validation(String),

    /// OAuth state token missing, forged, expired or already used.
    #[error("{0}")]
    InvalidState(String),

    /// No credential stored for the requested shop.
    #[error("{0}")]
    NotFound(String),

    /// Request body above the configured limit.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Platform token endpoint or answering service failed.
    #[error("{0}")]
    Upstream(String),

    /// Credential store failure.
    #[error("Internal server error")]
    Storage,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Returns the field value if it is present and not blank.
pub fn require_field<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!(
            "Missing required parameter '{}'",
            field
        ))),
    }
}
