//! Error types for skola-commerce
//!
//! One error taxonomy serves both the service layer and the HTTP edge:
//! domain operations return [`CommerceError`] values describing what went
//! wrong in commerce terms, and the `IntoResponse` impl maps each category
//! to its HTTP status and the uniform error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for commerce operations
pub type Result<T> = std::result::Result<T, CommerceError>;

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, CommerceError>;

/// Commerce error taxonomy
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed or out-of-range input (400)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Actor not permitted for this operation (403)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Referenced entity absent (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// State transition not allowed, duplicate, or limit hit (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payout amount exceeds the available balance (409)
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Database operation error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// skola-common error (500)
    #[error("Common error: {0}")]
    Common(#[from] skola_common::Error),

    /// Internal error (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            CommerceError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg),
            CommerceError::Authorization(msg) => (StatusCode::FORBIDDEN, "AUTHORIZATION", msg),
            CommerceError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            CommerceError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            CommerceError::InsufficientFunds(msg) => {
                (StatusCode::CONFLICT, "INSUFFICIENT_FUNDS", msg)
            }
            CommerceError::Database(ref err) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE",
                    "database operation failed".to_string(),
                )
            }
            CommerceError::Common(ref err) => {
                tracing::error!("Common error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    err.to_string(),
                )
            }
            CommerceError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
