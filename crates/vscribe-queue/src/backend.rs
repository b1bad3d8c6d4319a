//! Backend ports: work dispatch and status storage.

use async_trait::async_trait;
use vscribe_models::{JobId, JobRecord};

use crate::error::QueueResult;
use crate::job::{Delivery, StageJob};

/// At-least-once work dispatch.
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Prepare the broker (e.g. create the consumer group).
    async fn init(&self) -> QueueResult<()>;

    /// Push a job; returns the broker message id.
    async fn push(&self, job: &StageJob) -> QueueResult<String>;

    /// Take up to `count` new jobs, waiting at most `block_ms` for one (0: no wait).
    async fn consume(&self, consumer: &str, block_ms: u64, count: usize) -> QueueResult<Vec<Delivery>>;

    /// Take over jobs delivered to some consumer but not acked for `min_idle_ms`.
    async fn claim_pending(
        &self,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>>;

    /// Acknowledge a delivery so it is never handed out again.
    async fn ack(&self, message_id: &str) -> QueueResult<()>;

    /// Jobs currently held by the broker.
    async fn len(&self) -> QueueResult<u64>;

    async fn ping(&self) -> QueueResult<()>;
}

/// Outcome of a conditional status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The stored record is already terminal; nothing was written.
    RejectedTerminal,
    /// No record exists for the handle (never issued or expired).
    Missing,
}

/// Job status storage with expiry.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Store a fresh record, overwriting nothing that is terminal.
    async fn create(&self, record: &JobRecord) -> QueueResult<()>;

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>>;

    /// Replace an existing record unless the stored one is terminal. The
    /// check and the write happen atomically.
    async fn replace_if_open(&self, record: &JobRecord) -> QueueResult<WriteOutcome>;
}
