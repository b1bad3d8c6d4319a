//! Structured job logging.
//!
//! Every lifecycle event of a stage run carries the job handle, the stage
//! and the stem as tracing fields, so one job can be followed through the
//! logs with a single filter.

use tracing::{error, info, warn, Span};
use vscribe_models::{JobId, StageName, Stem};

/// Stamps job id, stage and stem on every lifecycle event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    stage: StageName,
    stem: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, stage: StageName, stem: &Stem) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage,
            stem: stem.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %self.stage,
            stem = %self.stem,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %self.stage,
            stem = %self.stem,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            stage = %self.stage,
            stem = %self.stem,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            stage = %self.stage,
            stem = %self.stem,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %self.stage,
            stem = %self.stem,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span covering one stage run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            stage = %self.stage,
            stem = %self.stem
        )
    }
}
