//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ai::AiError;
use crate::core_state::CoreError;
use crate::db::StoreError;
use crate::pipeline::import::ImportError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API key required")]
    KeyRequired,
    #[error("Quota exhausted")]
    QuotaExhausted,
    #[error("AI service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("AI request failed: {0}")]
    AiFailure(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Duplicate of {existing_id}")]
    Duplicate { existing_id: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::KeyRequired => (
                StatusCode::UNAUTHORIZED,
                "KEY_REQUIRED",
                AiError::AuthenticationRequired.notice(None),
            ),
            ApiError::QuotaExhausted => (
                StatusCode::TOO_MANY_REQUESTS,
                "QUOTA_EXHAUSTED",
                AiError::QuotaExhausted.notice(None),
            ),
            ApiError::ServiceUnavailable(detail) => {
                tracing::warn!(detail, "AI service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    AiError::ServiceUnavailable(detail.clone()).notice(None),
                )
            }
            ApiError::AiFailure(detail) => {
                tracing::warn!(detail, "AI request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "AI_FAILURE",
                    AiError::GenericFailure(detail.clone()).notice(None),
                )
            }
            ApiError::Storage(detail) => {
                tracing::error!(detail, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "STORAGE ERROR: The archive could not be updated.".to_string(),
                )
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Duplicate { existing_id } => (
                StatusCode::CONFLICT,
                "DUPLICATE",
                format!("DUPLICATE DETECTED: already archived as {existing_id}"),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::AuthenticationRequired => ApiError::KeyRequired,
            AiError::QuotaExhausted => ApiError::QuotaExhausted,
            AiError::ServiceUnavailable(detail) => ApiError::ServiceUnavailable(detail),
            AiError::GenericFailure(detail) => ApiError::AiFailure(detail),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Store(e) => e.into(),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::PendingNotFound(id) => {
                ApiError::NotFound(format!("Pending candidate not found: {id}"))
            }
            ImportError::Duplicate { existing_id } => ApiError::Duplicate { existing_id },
            ImportError::Store(e) => e.into(),
            ImportError::State(e) => e.into(),
        }
    }
}
