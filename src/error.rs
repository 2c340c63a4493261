//! Feed error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected ({status}): {message}")]
    ClientRequest { status: u16, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether a retry can reasonably succeed.
    ///
    /// Only transport-level failures qualify; a rejected request stays
    /// rejected no matter how often it is resent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Transport(_))
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.is_client_error() => FeedError::ClientRequest {
                status: status.as_u16(),
                message: err.to_string(),
            },
            _ => FeedError::Transport(err.to_string()),
        }
    }
}

/// Serializable error state for the rendering layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&FeedError> for ErrorResponse {
    fn from(err: &FeedError) -> Self {
        let code = match err {
            FeedError::Transport(_) => "TRANSPORT_ERROR",
            FeedError::ClientRequest { .. } => "CLIENT_REQUEST_ERROR",
            FeedError::Validation(_) => "VALIDATION_ERROR",
            FeedError::Processing(_) => "PROCESSING_ERROR",
            FeedError::Serialization(_) => "SERIALIZATION_ERROR",
            FeedError::Config(_) => "CONFIG_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(FeedError::Transport("connection reset".into()).is_retryable());
        assert!(!FeedError::ClientRequest {
            status: 422,
            message: "bad params".into()
        }
        .is_retryable());
        assert!(!FeedError::Validation("missing field".into()).is_retryable());
        assert!(!FeedError::Processing("target too small".into()).is_retryable());
    }

    #[test]
    fn test_error_response_codes() {
        let response = ErrorResponse::from(&FeedError::ClientRequest {
            status: 403,
            message: "forbidden".into(),
        });
        assert_eq!(response.code, "CLIENT_REQUEST_ERROR");
        assert!(response.message.contains("403"));
    }
}
