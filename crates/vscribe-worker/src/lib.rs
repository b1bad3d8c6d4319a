//! Stage worker.
//!
//! This crate provides:
//! - The six pipeline stages and the registry that dispatches to them
//! - Job executor with bounded concurrency, reclaim and graceful shutdown
//! - Structured job logging and worker metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod stages;

pub use config::{PipelineConfig, WorkerConfig};
pub use error::{StageError, StageResult, WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobOutcome};
pub use logging::JobLogger;
pub use stages::{Collaborators, Stage, StageRegistry};
