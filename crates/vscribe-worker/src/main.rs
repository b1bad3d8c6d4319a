//! Stage worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vscribe_media::{check_ffmpeg, FfmpegDemuxer};
use vscribe_ml_client::{CompletionClient, MlClient};
use vscribe_queue::{JobQueue, QueueConfig};
use vscribe_storage::{ArtifactStore, StoreConfig};
use vscribe_worker::{
    metrics, Collaborators, JobExecutor, PipelineConfig, StageRegistry, WorkerConfig,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vscribe-worker");

    let config = WorkerConfig::from_env();
    let pipeline = PipelineConfig::from_env();
    info!("Worker config: {:?}", config);
    info!("Pipeline config: {:?}", pipeline);

    if config.metrics_enabled {
        match metrics::init_metrics(config.metrics_addr) {
            Ok(()) => info!("Serving metrics on {}", config.metrics_addr),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let store = match ArtifactStore::open(&StoreConfig::from_env()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open artifact store: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_config(&QueueConfig::from_env()) {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let ml = match MlClient::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create ML client: {}", e);
            std::process::exit(1);
        }
    };
    let completer = match CompletionClient::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create completion client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = check_ffmpeg() {
        warn!("{}; extract-audio jobs will fail", e);
    }
    match ml.health_check().await {
        Ok(true) => info!("ML service is healthy"),
        Ok(false) | Err(_) => warn!("ML service is not reachable yet"),
    }

    let collaborators = Collaborators {
        demuxer: Arc::new(FfmpegDemuxer::new().with_timeout(pipeline.ffmpeg_timeout.as_secs())),
        speech: ml.clone(),
        classifier: ml.clone(),
        tokenizer: ml.clone(),
        renderer: ml,
        completer,
    };
    let registry = StageRegistry::standard(store, collaborators, pipeline);
    info!("Registered {} stages", registry.len());
    let executor = Arc::new(JobExecutor::new(config, queue, registry));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vscribe=info,info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .with(env_filter)
            .init();
    }
}
