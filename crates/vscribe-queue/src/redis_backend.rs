//! Redis backend: jobs on a stream with a consumer group, status records as
//! JSON strings with a TTL.

use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::{AsyncCommands, Script};
use tracing::{debug, info, warn};

use vscribe_models::{JobId, JobRecord};

use crate::backend::{JobBroker, StatusStore, WriteOutcome};
use crate::error::{QueueError, QueueResult};
use crate::job::{Delivery, StageJob};

/// Replaces a record unless the stored one is terminal.
/// Returns 1 when written, 0 when the stored record is terminal, -1 when absent.
const REPLACE_IF_OPEN: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
local state = cjson.decode(current)['state']
if state == 'succeeded' or state == 'failed' then
    return 0
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl > 0 then
    redis.call('SET', KEYS[1], ARGV[1], 'PX', ttl)
else
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
end
return 1
"#;

/// Redis Streams broker and status store.
pub struct RedisBackend {
    client: redis::Client,
    stream_name: String,
    consumer_group: String,
    key_prefix: String,
    status_ttl: Duration,
}

impl RedisBackend {
    pub fn new(
        redis_url: &str,
        stream_name: impl Into<String>,
        consumer_group: impl Into<String>,
        key_prefix: impl Into<String>,
        status_ttl: Duration,
    ) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            key_prefix: key_prefix.into(),
            status_ttl,
        })
    }

    fn status_key(&self, job_id: &JobId) -> String {
        format!("{}:job:{}", self.key_prefix, job_id)
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Decode stream entries, acking any whose payload cannot be parsed so
    /// they are not redelivered forever.
    async fn decode_entries(&self, entries: Vec<StreamId>) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(entries.len());
        for entry in entries {
            let message_id = entry.id.clone();
            let parsed = entry
                .get::<String>("job")
                .ok_or_else(|| "missing job field".to_string())
                .and_then(|payload| {
                    serde_json::from_str::<StageJob>(&payload).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(job) => deliveries.push(Delivery { message_id, job }),
                Err(e) => {
                    warn!("Failed to parse job payload {}: {}", message_id, e);
                    self.ack(&message_id).await.ok();
                }
            }
        }
        deliveries
    }
}

#[async_trait]
impl JobBroker for RedisBackend {
    async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        // Create consumer group (ignore error if already exists)
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    async fn push(&self, job: &StageJob) -> QueueResult<String> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(job)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("job_id")
            .arg(job.job_id.as_str())
            .query_async(&mut conn)
            .await?;

        Ok(message_id)
    }

    async fn consume(&self, consumer: &str, block_ms: u64, count: usize) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count);
        // BLOCK 0 would wait forever; zero means "do not block" here.
        if block_ms > 0 {
            cmd.arg("BLOCK").arg(block_ms);
        }
        cmd.arg("STREAMS").arg(&self.stream_name).arg(">"); // Only new messages

        // Nil reply when BLOCK times out
        let reply: Option<StreamReadReply> = cmd.query_async(&mut conn).await?;

        let entries = reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default();
        Ok(self.decode_entries(entries).await)
    }

    async fn claim_pending(
        &self,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.conn().await?;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let stale: Vec<String> = pending
            .ids
            .into_iter()
            .filter(|p| p.last_delivered_ms as u64 >= min_idle_ms)
            .map(|p| p.id)
            .collect();
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        // XCLAIM re-checks the idle time, so a job acked in between is skipped
        let claimed: StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(consumer)
            .arg(min_idle_ms)
            .arg(&stale)
            .query_async(&mut conn)
            .await?;

        let deliveries = self.decode_entries(claimed.ids).await;
        for d in &deliveries {
            info!(job_id = %d.job.job_id, "Claimed pending job {}", d.message_id);
        }
        Ok(deliveries)
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        redis::cmd("XACK")
            .arg(&self.stream_name)
            .arg(&self.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(&self.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.xlen(&self.stream_name).await?;
        Ok(len)
    }

    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for RedisBackend {
    async fn create(&self, record: &JobRecord) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(record)?;

        // NX: a handle is never reused, so an existing key means a collision
        let created: Option<String> = redis::cmd("SET")
            .arg(self.status_key(&record.job_id))
            .arg(&payload)
            .arg("NX")
            .arg("EX")
            .arg(self.status_ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        if created.is_none() {
            return Err(QueueError::enqueue_failed(format!(
                "status record {} already exists",
                record.job_id
            )));
        }
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(self.status_key(job_id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(QueueError::from))
            .transpose()
    }

    async fn replace_if_open(&self, record: &JobRecord) -> QueueResult<WriteOutcome> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(record)?;

        let result: i32 = Script::new(REPLACE_IF_OPEN)
            .key(self.status_key(&record.job_id))
            .arg(&payload)
            .arg(self.status_ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(match result {
            1 => WriteOutcome::Written,
            0 => WriteOutcome::RejectedTerminal,
            _ => WriteOutcome::Missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobQueue;
    use std::sync::Arc;
    use vscribe_models::{FailureKind, JobFailure, JobState, StageName, StageOutput, Stem};

    fn backend() -> Arc<RedisBackend> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Arc::new(
            RedisBackend::new(
                &url,
                format!("vscribe-test:jobs:{suffix}"),
                "vscribe-test:workers",
                format!("vscribe-test:{suffix}"),
                Duration::from_secs(60),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn enqueue_consume_ack() {
        let backend = backend();
        let queue = JobQueue::new(backend.clone(), backend.clone());
        queue.init().await.unwrap();

        let handle = queue
            .enqueue(StageName::Transcribe, Stem::parse("v1").unwrap())
            .await
            .unwrap();
        assert_eq!(queue.status(&handle).await.unwrap().state, JobState::Pending);

        let deliveries = queue.consume("c1", 100, 10).await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].job.job_id, handle);

        queue.mark_running(&handle).await.unwrap();
        queue
            .mark_failed(&handle, JobFailure::new(FailureKind::SourceNotFound, "audio/v1"))
            .await
            .unwrap();
        queue.ack(&deliveries[0].message_id).await.unwrap();

        let err = queue
            .mark_succeeded(&handle, StageOutput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::IllegalTransition(_)));
        assert_eq!(queue.status(&handle).await.unwrap().state, JobState::Failed);
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn stale_deliveries_are_reclaimed() {
        let backend = backend();
        let queue = JobQueue::new(backend.clone(), backend.clone());
        queue.init().await.unwrap();
        queue
            .enqueue(StageName::ExtractAudio, Stem::parse("v1").unwrap())
            .await
            .unwrap();

        let first = queue.consume("crashed", 100, 1).await.unwrap();
        assert_eq!(first.len(), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let claimed = queue.claim_pending("rescuer", 10, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].message_id, first[0].message_id);
    }
}
