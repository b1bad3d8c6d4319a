//! Worker error types.

use thiserror::Error;
use vscribe_media::MediaError;
use vscribe_ml_client::MlError;
use vscribe_models::{ArtifactKind, FailureKind, JobFailure, Stem};
use vscribe_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;
pub type StageResult<T> = Result<T, StageError>;

/// Why a stage run failed. Recorded on the job as a [`JobFailure`].
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Source artifact missing: no {kind} for stem {stem}")]
    SourceNotFound { kind: ArtifactKind, stem: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    /// A model collaborator (speech-to-text, classifier, tokenizer,
    /// renderer) failed or returned unusable output.
    #[error("{collaborator} failed: {source}")]
    Collaborator {
        collaborator: &'static str,
        #[source]
        source: MlError,
    },

    /// The remote completion API failed.
    #[error("Upstream service error: {0}")]
    Upstream(MlError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StageError {
    pub fn source_not_found(kind: ArtifactKind, stem: &Stem) -> Self {
        Self::SourceNotFound {
            kind,
            stem: stem.to_string(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// `map_err` adapter naming the collaborator that failed.
    pub fn collaborator(name: &'static str) -> impl FnOnce(MlError) -> Self {
        move |source| Self::Collaborator {
            collaborator: name,
            source,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            StageError::SourceNotFound { .. } => FailureKind::SourceNotFound,
            StageError::NotFound(_) => FailureKind::NotFound,
            StageError::Processing(_) | StageError::Media(_) | StageError::Collaborator { .. } => {
                FailureKind::ProcessingError
            }
            StageError::Upstream(_) => FailureKind::UpstreamServiceError,
            StageError::Storage(e) if e.is_not_found() => FailureKind::NotFound,
            StageError::Storage(_) | StageError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn to_failure(&self) -> JobFailure {
        JobFailure::new(self.failure_kind(), self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue error: {0}")]
    Queue(#[from] vscribe_queue::QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ML client error: {0}")]
    Ml(#[from] MlError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    #[error("Executor error: {0}")]
    Executor(String),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_source_names_the_kind() {
        let stem = Stem::parse("v1").unwrap();
        let err = StageError::source_not_found(ArtifactKind::Audio, &stem);
        let failure = err.to_failure();
        assert_eq!(failure.kind, FailureKind::SourceNotFound);
        assert!(failure.message.contains("audio"));
        assert!(failure.message.contains("v1"));
    }

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let err = StageError::from(StorageError::not_found("audio/v1"));
        assert_eq!(err.failure_kind(), FailureKind::NotFound);
    }

    #[test]
    fn model_failures_are_processing_and_name_the_model() {
        let err = StageError::collaborator("sentiment classifier")(MlError::invalid_response(
            "ML service",
            "bad labels",
        ));
        let failure = err.to_failure();
        assert_eq!(failure.kind, FailureKind::ProcessingError);
        assert!(failure.message.starts_with("sentiment classifier failed"));
    }

    #[test]
    fn completion_failures_are_upstream() {
        let err = StageError::Upstream(MlError::invalid_response("completion API", "empty"));
        assert_eq!(err.failure_kind(), FailureKind::UpstreamServiceError);
    }

    #[test]
    fn demux_errors_are_processing() {
        let err = StageError::from(MediaError::Timeout(30));
        assert_eq!(err.failure_kind(), FailureKind::ProcessingError);
    }
}
