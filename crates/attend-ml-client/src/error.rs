//! Recognition client error types.

use attend_media::MediaError;
use thiserror::Error;

/// Result type for recognition service calls.
pub type MlClientResult<T> = Result<T, MlClientError>;

#[derive(Debug, Error)]
pub enum MlClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recognition service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("All detector backends failed: {0}")]
    DetectorsExhausted(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] MediaError),
}

impl MlClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Timeouts and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
