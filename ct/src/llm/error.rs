//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: set the {0} environment variable")]
    MissingApiKey(String),
}

impl LlmError {
    /// Whether the client should resend the same request
    ///
    /// Only transient gateway/server statuses and network failures qualify.
    /// A rate limit is surfaced to the caller instead of waited out.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) => true,
            LlmError::ApiError { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504),
            LlmError::RateLimited { .. } | LlmError::InvalidResponse(_) | LlmError::MissingApiKey(_) => false,
        }
    }
}
