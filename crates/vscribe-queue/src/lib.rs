//! Redis Streams job queue and job status tracker.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams (or an in-process backend)
//! - Worker consumption with ack and reclaim of stale deliveries
//! - Job status records with TTL and monotonic transitions

pub mod backend;
pub mod error;
pub mod job;
pub mod memory;
pub mod queue;
pub mod redis_backend;

pub use backend::{JobBroker, StatusStore, WriteOutcome};
pub use error::{QueueError, QueueResult};
pub use job::{Delivery, StageJob};
pub use memory::MemoryBackend;
pub use queue::{BackendKind, JobQueue, QueueConfig, JOB_STATUS_TTL_SECS};
pub use redis_backend::RedisBackend;
