//! Shared data models for the vscribe pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Artifact kinds, stems and typed artifact keys
//! - Stage names and their input/output contracts
//! - Job handles, states and status records
//! - Subtitle segments, sentiment labels, translations and frequency tables
//! - Catalog rows

pub mod artifact;
pub mod frequency;
pub mod job;
pub mod job_status;
pub mod sentiment;
pub mod stage;
pub mod stem;
pub mod subtitle;
pub mod translation;
pub mod video;

use thiserror::Error;

// Re-export common types
pub use artifact::{ArtifactKey, ArtifactKind, ArtifactLocation};
pub use frequency::FrequencyTable;
pub use job::{JobId, JobState};
pub use job_status::{FailureKind, JobFailure, JobRecord, StageOutput};
pub use sentiment::Sentiment;
pub use stage::StageName;
pub use stem::{Stem, MAX_STEM_LEN};
pub use subtitle::{compose_srt, parse_srt, ParsedSubtitles, SubtitleSegment, TimeRange};
pub use translation::{render_plain_text, TranslatedSegment, Translation};
pub use video::{VideoRecord, WordCloudRecord};

/// Validation errors raised by the model types.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid stem: {0:?}")]
    InvalidStem(String),

    #[error("unknown artifact kind: {0}")]
    UnknownArtifactKind(String),

    #[error("artifact kind {kind} has no .{extension} rendition")]
    UnsupportedExtension { kind: ArtifactKind, extension: String },

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("unknown sentiment label: {0}")]
    UnknownSentiment(String),

    #[error("invalid subtitle: {0}")]
    InvalidSubtitle(String),

    #[error("job {job_id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },
}
