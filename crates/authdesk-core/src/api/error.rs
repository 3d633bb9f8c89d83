use serde::Deserialize;
use thiserror::Error;

use crate::error::LoginError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message} (status {status})")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", head, body.len())
        }
    }

    /// Build a rejection from a non-success response, preferring the
    /// backend's `{"message": ...}` over the raw body.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request rejected")
                        .to_string()
                } else {
                    Self::truncate_body(body)
                }
            });
        ApiError::Rejected { status, message }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Rejected { message, .. } => LoginError::BackendRejection(message),
            ApiError::InvalidResponse(detail) => LoginError::BackendRejection(detail),
            ApiError::NetworkError(e) => LoginError::TransportFailure(e.to_string()),
        }
    }
}
