//! External document-understanding service.
//!
//! One capability trait (`AssessmentAi`) covers extraction, translation and
//! form-script generation. Every failure is classified into the fixed
//! `AiError` taxonomy; the import workflow branches on that classification
//! alone.

pub mod gemini;
pub mod gemini_types;
pub mod mock;
pub mod prompt;
pub mod types;

pub use gemini::*;
pub use mock::*;
pub use prompt::*;
pub use types::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("API credential missing or rejected")]
    AuthenticationRequired,

    #[error("API quota exhausted")]
    QuotaExhausted,

    #[error("AI service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("AI request failed: {0}")]
    GenericFailure(String),
}

/// Serializable classification of an `AiError`, used in reports and API bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiErrorKind {
    KeyRequired,
    QuotaExhausted,
    ServiceUnavailable,
    GenericFailure,
}

impl AiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyRequired => "KEY_REQUIRED",
            Self::QuotaExhausted => "QUOTA_EXHAUSTED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::GenericFailure => "GENERIC_FAILURE",
        }
    }
}

impl AiError {
    pub fn kind(&self) -> AiErrorKind {
        match self {
            Self::AuthenticationRequired => AiErrorKind::KeyRequired,
            Self::QuotaExhausted => AiErrorKind::QuotaExhausted,
            Self::ServiceUnavailable(_) => AiErrorKind::ServiceUnavailable,
            Self::GenericFailure(_) => AiErrorKind::GenericFailure,
        }
    }

    /// Authentication and quota failures stop the rest of an import batch.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::AuthenticationRequired | Self::QuotaExhausted)
    }

    /// User-facing notice for this failure.
    pub fn notice(&self, file_name: Option<&str>) -> String {
        match self {
            Self::AuthenticationRequired => {
                "AUTHENTICATION REQUIRED: Please connect an API key to analyze files.".to_string()
            }
            Self::QuotaExhausted => {
                "RATE LIMIT EXCEEDED: The AI service quota has been reached. Please check your plan."
                    .to_string()
            }
            Self::ServiceUnavailable(_) => {
                "SERVER ERROR: The AI service is currently busy. Try again soon.".to_string()
            }
            Self::GenericFailure(_) => match file_name {
                Some(name) => format!("EXTRACTION FAILED: \"{name}\""),
                None => "REQUEST FAILED: Please try again.".to_string(),
            },
        }
    }
}

/// Classify an upstream failure from its HTTP status, API status string and message.
pub fn classify_upstream(http_status: Option<u16>, api_status: &str, message: &str) -> AiError {
    let lower = message.to_lowercase();
    // Numeric codes inside the message only count when no HTTP status is known.
    let status_less = http_status.is_none();

    let quota = http_status == Some(429)
        || api_status == "RESOURCE_EXHAUSTED"
        || lower.contains("quota")
        || (status_less && lower.contains("429"))
        || lower.contains("resource_exhausted");
    if quota {
        return AiError::QuotaExhausted;
    }

    let auth = matches!(http_status, Some(401) | Some(403))
        || api_status == "PERMISSION_DENIED"
        || api_status == "UNAUTHENTICATED"
        || (status_less && message.contains("403"))
        || message.contains("PERMISSION_DENIED")
        || message.contains("API key not valid");
    if auth {
        return AiError::AuthenticationRequired;
    }

    let unavailable = matches!(http_status, Some(500..=599))
        || api_status == "UNAVAILABLE"
        || api_status == "INTERNAL"
        || (status_less && (message.contains("500") || message.contains("503")));
    if unavailable {
        return AiError::ServiceUnavailable(message.to_string());
    }

    if message.is_empty() {
        AiError::GenericFailure("An unexpected error occurred.".into())
    } else {
        AiError::GenericFailure(message.to_string())
    }
}
