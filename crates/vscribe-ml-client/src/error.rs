//! ML client error types.

use reqwest::StatusCode;
use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("{service} unavailable: {message}")]
    ServiceUnavailable { service: &'static str, message: String },

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: &'static str, message: String },

    #[error("Failed to read input {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    pub fn invalid_response(service: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::ServiceUnavailable { .. } => true,
            MlError::Upstream { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            MlError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
