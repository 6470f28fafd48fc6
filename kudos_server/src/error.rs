// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the Kudos server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::AiError;
use crate::store::StoreError;

/// Message returned when the AI key is missing.
pub const MISSING_API_KEY_MESSAGE: &str = "API key not configured";

/// Server error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Data store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// AI completion error.
    #[error("ai error: {0}")]
    Ai(#[from] AiError),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message.
    pub error: String,
    /// Error status string.
    pub status: String,
    /// HTTP status code.
    pub code: u16,
}

impl ApiError {
    /// Create a new API error.
    #[must_use]
    pub fn new(status: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            status: status.into(),
            code,
        }
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", 400, message)
    }

    /// Create a payment required error.
    #[must_use]
    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new("payment_required", 402, message)
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", 404, message)
    }

    /// Create a rate limited error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("rate_limited", 429, message)
    }

    /// Create an internal server error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", 500, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Config(msg) => Self::internal(msg),
            ServerError::Ai(AiError::MissingApiKey) => Self::internal(MISSING_API_KEY_MESSAGE),
            ServerError::Ai(AiError::RateLimited) => {
                Self::rate_limited("Rate limit exceeded. Please try again later.")
            },
            ServerError::Ai(AiError::PaymentRequired) => {
                Self::payment_required("Payment required. Please add credits to your workspace.")
            },
            ServerError::Ai(_) => Self::internal("AI processing failed"),
            ServerError::Store(StoreError::NotFound(msg)) | ServerError::NotFound(msg) => {
                Self::not_found(msg)
            },
            ServerError::Store(e) => Self::internal(e.to_string()),
            ServerError::InvalidArgument(msg) => Self::bad_request(msg),
            ServerError::Internal(msg) => Self::internal(msg),
            ServerError::Io(e) => Self::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Result type for HTTP handlers.
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;
