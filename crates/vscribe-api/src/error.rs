//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vscribe_models::ModelError;
use vscribe_queue::QueueError;
use vscribe_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A stage was triggered before its input exists.
    #[error("Source artifact missing: {0}")]
    SourceNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn source_not_found(msg: impl Into<String>) -> Self {
        Self::SourceNotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SourceNotFound(_) => StatusCode::CONFLICT,
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            ApiError::Queue(QueueError::UnknownHandle(_)) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Queue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::CONFLICT => "source_not_found",
            _ => "internal_error",
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl ErrorResponse {
    /// Body sent in place of a server error's detail in production.
    pub(crate) fn redacted() -> Self {
        Self {
            detail: "An internal error occurred".to_string(),
            code: "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        // production redaction happens in `middleware::redact_server_errors`
        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors_to_status() {
        let cases = [
            (ApiError::from(StorageError::not_found("audio/v1")), StatusCode::NOT_FOUND, "not_found"),
            (
                ApiError::from(QueueError::unknown_handle("nope")),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                ApiError::source_not_found("no audio for stem v1"),
                StatusCode::CONFLICT,
                "source_not_found",
            ),
            (
                ApiError::from(ModelError::UnknownStage("dance".to_string())),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (
                ApiError::from(StorageError::catalog("locked")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{err}");
            assert_eq!(err.code(), code);
        }
    }
}
