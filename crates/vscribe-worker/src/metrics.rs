//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "vscribe_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vscribe_jobs_failed_total";
    pub const JOBS_SKIPPED_TOTAL: &str = "vscribe_jobs_skipped_total";
    pub const STAGE_DURATION_SECONDS: &str = "vscribe_stage_duration_seconds";
    pub const TRANSLATION_SEGMENTS_DROPPED_TOTAL: &str = "vscribe_translation_segments_dropped_total";
}

/// Install the recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::Metrics(e.to_string()))
}

pub fn record_job_completed(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_failed(stage: &str, kind: &str) {
    let labels = [("stage", stage.to_string()), ("kind", kind.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// A redelivered job whose record was already terminal.
pub fn record_job_skipped(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_SKIPPED_TOTAL, &labels).increment(1);
}

pub fn record_dropped_segments(count: usize) {
    counter!(names::TRANSLATION_SEGMENTS_DROPPED_TOTAL).increment(count as u64);
}
