//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vscribe_models::{JobId, StageName, Stem};

/// Request to run one stage for one stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageJob {
    /// Handle returned to the enqueuer
    pub job_id: JobId,
    /// Stage to run
    pub stage: StageName,
    /// Stem of the artifacts the stage reads and writes
    pub stem: Stem,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl StageJob {
    pub fn new(stage: StageName, stem: Stem) -> Self {
        Self {
            job_id: JobId::new(),
            stage,
            stem,
            created_at: Utc::now(),
        }
    }
}

/// A job handed to a consumer, with the broker id needed to ack it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: String,
    pub job: StageJob,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let job = StageJob::new(StageName::ComputeFrequency, Stem::parse("v1").unwrap());
        let json: serde_json::Value = serde_json::to_value(&job).unwrap();
        assert_eq!(json["stage"], "compute-frequency");
        assert_eq!(json["stem"], "v1");
        assert_eq!(json["job_id"], job.job_id.as_str());

        let back: StageJob = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn payload_with_bad_stem_is_rejected() {
        let raw = r#"{"job_id":"x","stage":"transcribe","stem":"../etc","created_at":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<StageJob>(raw).is_err());
    }
}
