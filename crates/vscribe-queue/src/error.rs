//! Queue error types.

use thiserror::Error;
use vscribe_models::ModelError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Enqueue failed: {0}")]
    EnqueueFailed(String),

    #[error("Unknown job handle: {0}")]
    UnknownHandle(String),

    #[error("Illegal status transition: {0}")]
    IllegalTransition(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    pub fn unknown_handle(handle: impl Into<String>) -> Self {
        Self::UnknownHandle(handle.into())
    }

    pub fn illegal_transition(msg: impl Into<String>) -> Self {
        Self::IllegalTransition(msg.into())
    }
}

impl From<ModelError> for QueueError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::IllegalTransition { .. } => Self::IllegalTransition(e.to_string()),
            other => Self::InvalidJob(other.to_string()),
        }
    }
}
