//! Worker configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Consumer name inside the consumer group
    pub consumer_name: String,
    /// How long a consume call blocks waiting for jobs
    pub consume_block: Duration,
    /// How often the worker scans for deliveries abandoned by crashed workers
    pub claim_interval: Duration,
    /// Minimum idle time before a pending delivery can be claimed
    pub claim_min_idle: Duration,
    /// How long a `running` record stays owned by its worker without a
    /// heartbeat. Reclaimed deliveries of jobs still under lease are left
    /// pending; the worker renews every quarter lease.
    pub running_lease: Duration,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Serve Prometheus metrics
    pub metrics_enabled: bool,
    /// Listen address of the metrics exporter
    pub metrics_addr: SocketAddr,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            consumer_name: default_consumer_name(),
            consume_block: Duration::from_secs(1),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            running_lease: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(60),
            metrics_enabled: false,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9100)),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS", default.max_concurrent_jobs).max(1),
            consumer_name: std::env::var("WORKER_CONSUMER_NAME").unwrap_or(default.consumer_name),
            consume_block: Duration::from_millis(env_parse("WORKER_CONSUME_BLOCK_MS", 1000)),
            claim_interval: Duration::from_secs(env_parse("WORKER_CLAIM_INTERVAL_SECS", 30)),
            claim_min_idle: Duration::from_secs(env_parse("WORKER_CLAIM_MIN_IDLE_SECS", 300)),
            running_lease: Duration::from_secs(
                env_parse::<u64>("WORKER_RUNNING_LEASE_SECS", 600).max(4),
            ),
            shutdown_timeout: Duration::from_secs(env_parse("WORKER_SHUTDOWN_TIMEOUT", 60)),
            metrics_enabled: env_parse("METRICS_ENABLED", false),
            metrics_addr: env_parse("METRICS_ADDR", default.metrics_addr),
        }
    }
}

/// Settings handed to every stage at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Language passed to speech-to-text
    pub transcribe_language: String,
    /// Language translations are written in
    pub translate_target_language: String,
    /// Word-cloud image width in pixels
    pub wordcloud_width: u32,
    /// Word-cloud image height in pixels
    pub wordcloud_height: u32,
    /// FFmpeg is killed after this long
    pub ffmpeg_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transcribe_language: "Chinese".to_string(),
            translate_target_language: "English".to_string(),
            wordcloud_width: 800,
            wordcloud_height: 400,
            ffmpeg_timeout: Duration::from_secs(1800),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            transcribe_language: std::env::var("TRANSCRIBE_LANGUAGE")
                .unwrap_or(default.transcribe_language),
            translate_target_language: std::env::var("TRANSLATE_TARGET_LANGUAGE")
                .unwrap_or(default.translate_target_language),
            wordcloud_width: env_parse("WORDCLOUD_WIDTH", default.wordcloud_width),
            wordcloud_height: env_parse("WORDCLOUD_HEIGHT", default.wordcloud_height),
            ffmpeg_timeout: Duration::from_secs(
                env_parse::<u64>("FFMPEG_TIMEOUT_SECS", 1800).max(1),
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn default_consumer_name() -> String {
    format!("worker-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.transcribe_language, "Chinese");
        assert_eq!(config.translate_target_language, "English");
    }

    #[test]
    fn lease_outlasts_the_reclaim_idle_time() {
        let config = WorkerConfig::default();
        assert!(config.running_lease > config.claim_min_idle);
        assert_eq!(PipelineConfig::default().ffmpeg_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn consumer_names_are_unique() {
        assert_ne!(
            WorkerConfig::default().consumer_name,
            WorkerConfig::default().consumer_name
        );
    }
}
