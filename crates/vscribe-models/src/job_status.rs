//! Job status records kept by the status tracker.
//!
//! A record is created in `pending` when a stage is enqueued and is updated
//! by the worker. Once it reaches `succeeded` or `failed` it never changes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactLocation;
use crate::job::{JobId, JobState};
use crate::stage::StageName;
use crate::stem::Stem;
use crate::ModelError;

/// Error category recorded on a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    SourceNotFound,
    ProcessingError,
    UpstreamServiceError,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::SourceNotFound => "source_not_found",
            FailureKind::ProcessingError => "processing_error",
            FailureKind::UpstreamServiceError => "upstream_service_error",
            FailureKind::Internal => "internal",
        }
    }
}

/// Error detail of a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result payload of a succeeded job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StageOutput {
    /// Artifacts the stage published.
    pub artifacts: Vec<ArtifactLocation>,
    /// True when the stage returned an existing artifact without recomputing.
    #[serde(default)]
    pub cached: bool,
    /// Source indices of segments left out of the output (translation only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_segments: Vec<usize>,
}

impl StageOutput {
    pub fn new(artifacts: Vec<ArtifactLocation>) -> Self {
        Self {
            artifacts,
            ..Default::default()
        }
    }

    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    pub fn with_dropped_segments(mut self, dropped: Vec<usize>) -> Self {
        self.dropped_segments = dropped;
        self
    }
}

/// Status of one job handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub stage: StageName,
    pub stem: Stem,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    /// Number of times a worker picked the job up.
    #[serde(default)]
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// New pending record.
    pub fn pending(job_id: JobId, stage: StageName, stem: Stem) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            stage,
            stem,
            state: JobState::Pending,
            result: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, next: JobState) -> Result<(), ModelError> {
        if !self.state.can_transition_to(next) {
            return Err(ModelError::IllegalTransition {
                job_id: self.job_id.to_string(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether a worker marked the job running less than `lease` ago.
    ///
    /// A running record older than `lease` is treated as abandoned.
    pub fn held_within(&self, lease: std::time::Duration) -> bool {
        if self.state != JobState::Running {
            return false;
        }
        match (Utc::now() - self.updated_at).to_std() {
            Ok(age) => age < lease,
            // updated_at is in the future: clock skew between workers
            Err(_) => true,
        }
    }

    /// Refresh the lease on a running record.
    pub fn renew(&mut self) -> Result<(), ModelError> {
        if self.state != JobState::Running {
            return Err(ModelError::IllegalTransition {
                job_id: self.job_id.to_string(),
                from: self.state,
                to: JobState::Running,
            });
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark picked up by a worker.
    pub fn start(&mut self) -> Result<(), ModelError> {
        self.transition(JobState::Running)?;
        self.attempts += 1;
        Ok(())
    }

    /// Mark succeeded with the stage output.
    pub fn succeed(&mut self, output: StageOutput) -> Result<(), ModelError> {
        self.transition(JobState::Succeeded)?;
        self.result = Some(output);
        Ok(())
    }

    /// Mark failed with an error detail.
    pub fn fail(&mut self, failure: JobFailure) -> Result<(), ModelError> {
        self.transition(JobState::Failed)?;
        self.error = Some(failure);
        Ok(())
    }
}
