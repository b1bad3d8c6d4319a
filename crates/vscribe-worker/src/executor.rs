//! Job executor.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn, Instrument};

use vscribe_models::JobId;
use vscribe_queue::{Delivery, JobQueue, QueueError};

use crate::config::WorkerConfig;
use crate::error::{StageError, WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async_when, FailureTracker, RetryConfig};
use crate::stages::StageRegistry;

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    /// Redelivery of a job that already finished, or whose record expired.
    Skipped,
    /// Status could not be recorded; left pending for reclaim.
    Deferred,
    /// Another worker holds the job's lease; delivery left pending.
    InProgress,
}

/// Pulls stage jobs from the queue and runs them through the registry.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    registry: Arc<StageRegistry>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, registry: StageRegistry) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            queue: Arc::new(queue),
            registry: Arc::new(registry),
            job_semaphore,
            shutdown,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.config.consumer_name
    }

    /// Consume until [`shutdown`](Self::shutdown) is called, then wait for
    /// in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.config.consumer_name, self.config.max_concurrent_jobs
        );

        if self.registry.is_empty() {
            warn!("No stages registered; every job will fail");
        }
        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let claim_task = self.spawn_claim_task();

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown requested before start, stopping executor");
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}; they will be reclaimed",
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Run queued jobs inline until the queue has nothing ready. Returns how
    /// many deliveries were handled.
    pub async fn run_until_idle(&self) -> WorkerResult<usize> {
        let mut handled = 0;
        loop {
            let deliveries = self
                .queue
                .consume(&self.config.consumer_name, 0, self.config.max_concurrent_jobs)
                .await?;
            if deliveries.is_empty() {
                return Ok(handled);
            }
            for delivery in deliveries {
                Self::execute_job(&self.queue, &self.registry, self.config.running_lease, delivery)
                    .await;
                handled += 1;
            }
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn spawn_claim_task(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let registry = Arc::clone(&self.registry);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.config.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
        let lease = self.config.running_lease;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            let mut failures = FailureTracker::new(3);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue.claim_pending(&consumer_name, min_idle_ms, 5).await {
                            Ok(deliveries) => {
                                failures.record_success();
                                if deliveries.is_empty() {
                                    continue;
                                }
                                info!("Claimed {} pending jobs", deliveries.len());
                                for delivery in deliveries {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        break;
                                    };
                                    let queue = Arc::clone(&queue);
                                    let registry = Arc::clone(&registry);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(&queue, &registry, lease, delivery).await;
                                    });
                                }
                            }
                            Err(e) => {
                                if failures.record_failure() {
                                    warn!("Failed to claim pending jobs: {}", e);
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let deliveries = self
            .queue
            .consume(
                &self.config.consumer_name,
                self.config.consume_block.as_millis() as u64,
                available.min(5),
            )
            .await?;

        if deliveries.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", deliveries.len());

        for delivery in deliveries {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::executor("semaphore closed"))?;
            let queue = Arc::clone(&self.queue);
            let registry = Arc::clone(&self.registry);
            let lease = self.config.running_lease;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(&queue, &registry, lease, delivery).await;
            });
        }

        Ok(())
    }

    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Run one delivery to a terminal status and ack it.
    ///
    /// The delivery is acked only once its outcome is recorded, so a crash
    /// or a status-backend outage leaves it pending for reclaim. While the
    /// stage runs the job's lease is renewed; a delivery whose job is still
    /// under another worker's lease is not run.
    pub async fn execute_job(
        queue: &JobQueue,
        registry: &StageRegistry,
        lease: Duration,
        delivery: Delivery,
    ) -> JobOutcome {
        let Delivery { message_id, job } = delivery;
        let logger = JobLogger::new(&job.job_id, job.stage, &job.stem);
        let span = logger.create_span();

        async move {
            let job_id = &job.job_id;

            match queue.status(job_id).await {
                Ok(record) if record.is_terminal() => {
                    info!("Job already {}, acknowledging redelivery", record.state);
                    metrics::record_job_skipped(job.stage.as_str());
                    ack(queue, &message_id).await;
                    return JobOutcome::Skipped;
                }
                Ok(record) if record.held_within(lease) => {
                    info!("Job is running under another worker's lease, leaving delivery pending");
                    return JobOutcome::InProgress;
                }
                Ok(_) => {}
                Err(QueueError::UnknownHandle(_)) => {
                    warn!("Status record missing or expired, dropping delivery");
                    ack(queue, &message_id).await;
                    return JobOutcome::Skipped;
                }
                Err(e) => {
                    logger.log_error(&format!("cannot read status: {e}"));
                    return JobOutcome::Deferred;
                }
            }

            let retry = RetryConfig::new("mark_running");
            match retry_async_when(&retry, move || queue.mark_running(job_id), is_transient).await {
                Ok(record) => logger.log_start(&format!("attempt {}", record.attempts)),
                Err(QueueError::IllegalTransition(_)) => {
                    info!("Job finished elsewhere, acknowledging");
                    ack(queue, &message_id).await;
                    return JobOutcome::Skipped;
                }
                Err(e) => {
                    logger.log_error(&format!("cannot mark running: {e}"));
                    return JobOutcome::Deferred;
                }
            }

            let started = Instant::now();
            let run = async {
                match registry.get(job.stage) {
                    Some(stage) => stage.run(&job.stem, &logger).await,
                    None => Err(StageError::internal(format!(
                        "no stage registered for {}",
                        job.stage
                    ))),
                }
            };
            let result = with_heartbeat(queue, job_id, lease / 4, run).await;
            let elapsed = started.elapsed().as_secs_f64();

            let (outcome, recorded) = match result {
                Ok(output) => {
                    let summary = format!(
                        "{} artifacts{} in {:.2}s",
                        output.artifacts.len(),
                        if output.cached { " (cached)" } else { "" },
                        elapsed
                    );
                    let retry = RetryConfig::new("mark_succeeded");
                    let recorded = retry_async_when(
                        &retry,
                        move || queue.mark_succeeded(job_id, output.clone()),
                        is_transient,
                    )
                    .await;
                    if recorded.is_ok() {
                        logger.log_completion(&summary);
                        metrics::record_job_completed(job.stage.as_str(), elapsed);
                    }
                    (JobOutcome::Succeeded, recorded)
                }
                Err(e) => {
                    let failure = e.to_failure();
                    logger.log_error(&e.to_string());
                    let retry = RetryConfig::new("mark_failed");
                    let recorded = retry_async_when(
                        &retry,
                        move || queue.mark_failed(job_id, failure.clone()),
                        is_transient,
                    )
                    .await;
                    if recorded.is_ok() {
                        metrics::record_job_failed(job.stage.as_str(), e.failure_kind().as_str());
                    }
                    (JobOutcome::Failed, recorded)
                }
            };

            match recorded {
                Ok(_) => {
                    ack(queue, &message_id).await;
                    outcome
                }
                Err(QueueError::IllegalTransition(_)) => {
                    warn!("Job was finished by another worker, keeping that result");
                    ack(queue, &message_id).await;
                    JobOutcome::Skipped
                }
                Err(e) => {
                    logger.log_error(&format!("cannot record outcome: {e}"));
                    JobOutcome::Deferred
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Drive `run` to completion, renewing the job's lease every `every`.
async fn with_heartbeat<F, T>(
    queue: &JobQueue,
    job_id: &JobId,
    every: Duration,
    run: F,
) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(run);
    let every = every.max(Duration::from_millis(10));
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    loop {
        tokio::select! {
            result = &mut run => return result,
            _ = heartbeat.tick() => {
                if let Err(e) = queue.renew_lease(job_id).await {
                    warn!("Failed to renew job lease: {}", e);
                }
            }
        }
    }
}

async fn ack(queue: &JobQueue, message_id: &str) {
    if let Err(e) = queue.ack(message_id).await {
        error!("Failed to ack message {}: {}", message_id, e);
    }
}

fn is_transient(e: &QueueError) -> bool {
    matches!(e, QueueError::Redis(_) | QueueError::ConnectionFailed(_))
}
