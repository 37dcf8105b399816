use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ai_client::AiError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Invalid upload ticket")]
    InvalidUploadTicket,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("AI service error: {0}")]
    Ai(#[from] AiError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidUploadTicket | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::Ai(e) => match e {
                AiError::ClientError { status, .. } => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                AiError::Upstream { .. } | AiError::Rejected { .. } => StatusCode::BAD_GATEWAY,
                AiError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
                AiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                AiError::Decode(_) | AiError::MissingField(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => ("UNPROCESSABLE_ENTITY", msg.clone()),
            AppError::InvalidUploadTicket => {
                ("INVALID_UPLOAD_TICKET", "Invalid upload ticket".to_string())
            }
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => ("FORBIDDEN", msg.clone()),
            AppError::Conflict(msg) => ("CONFLICT", msg.clone()),
            AppError::Gone(msg) => ("GONE", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                ("DATABASE_ERROR", "A database error occurred".to_string())
            }
            AppError::Ai(e) => {
                tracing::error!("AI service error: {e}");
                match e {
                    // 4xx bodies are passed through as the error detail
                    AiError::ClientError { body, .. } => ("AI_CLIENT_ERROR", body.clone()),
                    AiError::Upstream { .. } | AiError::Rejected { .. } => {
                        ("AI_UPSTREAM_ERROR", "The AI service failed".to_string())
                    }
                    AiError::Connection(_) => (
                        "AI_UNAVAILABLE",
                        "The AI service is unreachable".to_string(),
                    ),
                    AiError::Timeout => ("AI_TIMEOUT", "The AI service timed out".to_string()),
                    AiError::Decode(_) | AiError::MissingField(_) => (
                        "AI_RESPONSE_ERROR",
                        "The AI service returned an unexpected response".to_string(),
                    ),
                }
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                ("STORAGE_ERROR", "A storage error occurred".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Storage(format!("key-value store: {err}"))
    }
}
