use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::ports::LlmError;

/// Errors that can occur when talking to the Claude Messages API
#[derive(Error, Debug)]
pub enum ClaudeApiError {
    /// Invalid request parameters (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid or missing API key (HTTP 401)
    #[error("Invalid API key - authentication failed")]
    InvalidApiKey,

    /// Permission denied (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown model or endpoint (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    /// Server error (HTTP 5xx, including 529 overloaded)
    #[error("Server error ({0}): {1}")]
    ServerError(StatusCode, String),

    /// Transport failure
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Response body did not parse
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The request exceeded its timeout
    #[error("Request timeout")]
    Timeout,

    /// Any other non-success status
    #[error("Unknown error ({0}): {1}")]
    UnknownError(StatusCode, String),
}

impl ClaudeApiError {
    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::InvalidRequest(body),
            StatusCode::UNAUTHORIZED => Self::InvalidApiKey,
            StatusCode::FORBIDDEN => Self::Forbidden(body),
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimitExceeded,
            status if status.is_server_error() || status.as_u16() == 529 => {
                Self::ServerError(status, body)
            }
            _ => Self::UnknownError(status, body),
        }
    }

    /// Returns true if this error is transient and should be retried
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ServerError(_, _) | Self::Timeout | Self::NetworkError(_)
        )
    }

    /// Returns true if this is a permanent error that should not be retried
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::InvalidApiKey | Self::Forbidden(_) | Self::NotFound
        )
    }
}

impl From<ClaudeApiError> for LlmError {
    fn from(err: ClaudeApiError) -> Self {
        match err {
            ClaudeApiError::InvalidApiKey => Self::NotConfigured(err.to_string()),
            other => Self::RequestFailed(other.to_string()),
        }
    }
}
