//! Job queue and status tracker.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use vscribe_models::{JobFailure, JobId, JobRecord, StageName, StageOutput, Stem};

use crate::backend::{JobBroker, StatusStore, WriteOutcome};
use crate::error::{QueueError, QueueResult};
use crate::job::{Delivery, StageJob};
use crate::memory::MemoryBackend;
use crate::redis_backend::RedisBackend;

/// Default status record lifetime: 7 days.
pub const JOB_STATUS_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Which backend carries jobs and status records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Memory,
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Backend selection
    pub backend: BackendKind,
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Prefix for status keys
    pub key_prefix: String,
    /// Status record lifetime
    pub status_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "vscribe:jobs".to_string(),
            consumer_group: "vscribe:workers".to_string(),
            key_prefix: "vscribe".to_string(),
            status_ttl: Duration::from_secs(JOB_STATUS_TTL_SECS),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            backend: match std::env::var("QUEUE_BACKEND").as_deref() {
                Ok("memory") => BackendKind::Memory,
                _ => BackendKind::Redis,
            },
            redis_url: std::env::var("REDIS_URL").unwrap_or(default.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(default.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(default.consumer_group),
            key_prefix: default.key_prefix,
            status_ttl: Duration::from_secs(
                std::env::var("JOB_STATUS_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(JOB_STATUS_TTL_SECS),
            ),
        }
    }
}

/// Job queue client.
///
/// Enqueue writes the `pending` record before pushing the job, so a handle
/// is queryable as soon as it is returned.
#[derive(Clone)]
pub struct JobQueue {
    broker: Arc<dyn JobBroker>,
    status: Arc<dyn StatusStore>,
}

impl JobQueue {
    pub fn new(broker: Arc<dyn JobBroker>, status: Arc<dyn StatusStore>) -> Self {
        Self { broker, status }
    }

    /// Build the configured backend.
    pub fn from_config(config: &QueueConfig) -> QueueResult<Self> {
        match config.backend {
            BackendKind::Redis => {
                let backend = Arc::new(RedisBackend::new(
                    &config.redis_url,
                    &config.stream_name,
                    &config.consumer_group,
                    &config.key_prefix,
                    config.status_ttl,
                )?);
                Ok(Self::new(backend.clone(), backend))
            }
            BackendKind::Memory => Ok(Self::in_memory(config.status_ttl)),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::from_config(&QueueConfig::from_env())
    }

    pub fn in_memory(status_ttl: Duration) -> Self {
        let backend = Arc::new(MemoryBackend::new(status_ttl));
        Self::new(backend.clone(), backend)
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        self.broker.init().await
    }

    /// Enqueue a stage run and return its handle.
    pub async fn enqueue(&self, stage: StageName, stem: Stem) -> QueueResult<JobId> {
        let job = StageJob::new(stage, stem);
        let record = JobRecord::pending(job.job_id.clone(), job.stage, job.stem.clone());
        self.status.create(&record).await?;

        match self.broker.push(&job).await {
            Ok(message_id) => {
                info!(
                    job_id = %job.job_id,
                    stage = %job.stage,
                    stem = %job.stem,
                    "Enqueued job with message ID {}",
                    message_id
                );
                Ok(job.job_id)
            }
            Err(e) => {
                warn!(job_id = %job.job_id, "Push failed, failing status record: {}", e);
                let failure = JobFailure::new(
                    vscribe_models::FailureKind::Internal,
                    format!("could not dispatch job: {e}"),
                );
                self.mark_failed(&job.job_id, failure).await.ok();
                Err(QueueError::enqueue_failed(e.to_string()))
            }
        }
    }

    /// Current record for a handle.
    pub async fn status(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        self.status
            .get(job_id)
            .await?
            .ok_or_else(|| QueueError::unknown_handle(job_id.as_str()))
    }

    /// Apply `change` to the stored record and write it back atomically
    /// unless it became terminal in the meantime.
    async fn transition<F>(&self, job_id: &JobId, change: F) -> QueueResult<JobRecord>
    where
        F: FnOnce(&mut JobRecord) -> Result<(), vscribe_models::ModelError>,
    {
        let mut record = self.status(job_id).await?;
        change(&mut record)?;
        match self.status.replace_if_open(&record).await? {
            WriteOutcome::Written => {
                debug!(job_id = %job_id, state = %record.state, "Job status updated");
                Ok(record)
            }
            WriteOutcome::RejectedTerminal => Err(QueueError::illegal_transition(format!(
                "job {job_id} is already terminal"
            ))),
            WriteOutcome::Missing => Err(QueueError::unknown_handle(job_id.as_str())),
        }
    }

    pub async fn mark_running(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        self.transition(job_id, |r| r.start()).await
    }

    /// Heartbeat from the worker running the job.
    pub async fn renew_lease(&self, job_id: &JobId) -> QueueResult<JobRecord> {
        self.transition(job_id, |r| r.renew()).await
    }

    pub async fn mark_succeeded(&self, job_id: &JobId, output: StageOutput) -> QueueResult<JobRecord> {
        self.transition(job_id, move |r| r.succeed(output)).await
    }

    pub async fn mark_failed(&self, job_id: &JobId, failure: JobFailure) -> QueueResult<JobRecord> {
        self.transition(job_id, move |r| r.fail(failure)).await
    }

    pub async fn consume(&self, consumer: &str, block_ms: u64, count: usize) -> QueueResult<Vec<Delivery>> {
        self.broker.consume(consumer, block_ms, count).await
    }

    /// Claim jobs from crashed workers.
    pub async fn claim_pending(
        &self,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        self.broker.claim_pending(consumer, min_idle_ms, count).await
    }

    /// Acknowledge a job (mark as completed).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        self.broker.ack(message_id).await
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        self.broker.len().await
    }

    pub async fn ping(&self) -> QueueResult<()> {
        self.broker.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscribe_models::{FailureKind, JobState};

    fn queue() -> JobQueue {
        JobQueue::in_memory(Duration::from_secs(60))
    }

    fn stem() -> Stem {
        Stem::parse("v1").unwrap()
    }

    #[tokio::test]
    async fn handle_is_pending_right_after_enqueue() {
        let queue = queue();
        let handle = queue.enqueue(StageName::Transcribe, stem()).await.unwrap();

        let record = queue.status(&handle).await.unwrap();
        assert_eq!(record.state, JobState::Pending);
        assert_eq!(record.stage, StageName::Transcribe);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_handle() {
        let err = queue()
            .status(&JobId::from_string("never-issued"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::UnknownHandle(_)));
    }

    #[tokio::test]
    async fn terminal_status_is_final() {
        let queue = queue();
        let handle = queue.enqueue(StageName::Transcribe, stem()).await.unwrap();
        queue.mark_running(&handle).await.unwrap();
        queue.mark_succeeded(&handle, StageOutput::default()).await.unwrap();

        let err = queue
            .mark_failed(&handle, JobFailure::new(FailureKind::Internal, "late"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::IllegalTransition(_)));
        assert!(queue.mark_running(&handle).await.is_err());

        let record = queue.status(&handle).await.unwrap();
        assert_eq!(record.state, JobState::Succeeded);
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn concurrent_terminal_writes_have_one_winner() {
        let queue = queue();
        let handle = queue.enqueue(StageName::Translate, stem()).await.unwrap();
        queue.mark_running(&handle).await.unwrap();

        let (a, b) = tokio::join!(
            queue.mark_succeeded(&handle, StageOutput::default()),
            queue.mark_failed(&handle, JobFailure::new(FailureKind::Internal, "x")),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }

    #[tokio::test]
    async fn redelivery_can_mark_running_again() {
        let queue = queue();
        let handle = queue.enqueue(StageName::ExtractAudio, stem()).await.unwrap();
        queue.mark_running(&handle).await.unwrap();
        let record = queue.mark_running(&handle).await.unwrap();
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn lease_renewal_keeps_attempts() {
        let queue = queue();
        let handle = queue.enqueue(StageName::Translate, stem()).await.unwrap();
        assert!(queue.renew_lease(&handle).await.is_err());

        let started = queue.mark_running(&handle).await.unwrap();
        let renewed = queue.renew_lease(&handle).await.unwrap();
        assert_eq!(renewed.attempts, 1);
        assert!(renewed.updated_at >= started.updated_at);

        queue.mark_succeeded(&handle, StageOutput::default()).await.unwrap();
        let err = queue.renew_lease(&handle).await.unwrap_err();
        assert!(matches!(err, QueueError::IllegalTransition(_)));
    }
}
