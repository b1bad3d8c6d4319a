//! In-process backend for tests and single-process deployments.
//!
//! Mirrors the Redis semantics: deliveries stay in flight until acked and can
//! be claimed by another consumer once idle, and status records expire.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use vscribe_models::{JobId, JobRecord};

use crate::backend::{JobBroker, StatusStore, WriteOutcome};
use crate::error::{QueueError, QueueResult};
use crate::job::{Delivery, StageJob};

struct InFlight {
    delivery: Delivery,
    consumer: String,
    delivered_at: Instant,
}

#[derive(Default)]
struct BrokerState {
    next_id: u64,
    ready: VecDeque<Delivery>,
    in_flight: HashMap<String, InFlight>,
}

/// Memory broker and status store.
pub struct MemoryBackend {
    broker: Mutex<BrokerState>,
    records: Mutex<HashMap<JobId, (JobRecord, Instant)>>,
    notify: Notify,
    status_ttl: Duration,
}

impl MemoryBackend {
    pub fn new(status_ttl: Duration) -> Self {
        Self {
            broker: Mutex::new(BrokerState::default()),
            records: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            status_ttl,
        }
    }

    async fn take_ready(&self, consumer: &str, count: usize) -> Vec<Delivery> {
        let mut state = self.broker.lock().await;
        let n = count.min(state.ready.len());
        let taken: Vec<Delivery> = state.ready.drain(..n).collect();
        let now = Instant::now();
        for d in &taken {
            state.in_flight.insert(
                d.message_id.clone(),
                InFlight {
                    delivery: d.clone(),
                    consumer: consumer.to_string(),
                    delivered_at: now,
                },
            );
        }
        taken
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(7 * 24 * 60 * 60))
    }
}

#[async_trait]
impl JobBroker for MemoryBackend {
    async fn init(&self) -> QueueResult<()> {
        Ok(())
    }

    async fn push(&self, job: &StageJob) -> QueueResult<String> {
        let mut state = self.broker.lock().await;
        state.next_id += 1;
        let message_id = format!("{}-0", state.next_id);
        state.ready.push_back(Delivery {
            message_id: message_id.clone(),
            job: job.clone(),
        });
        drop(state);
        self.notify.notify_one();
        Ok(message_id)
    }

    async fn consume(&self, consumer: &str, block_ms: u64, count: usize) -> QueueResult<Vec<Delivery>> {
        let taken = self.take_ready(consumer, count).await;
        if !taken.is_empty() || block_ms == 0 {
            return Ok(taken);
        }
        let _ = tokio::time::timeout(Duration::from_millis(block_ms), self.notify.notified()).await;
        Ok(self.take_ready(consumer, count).await)
    }

    async fn claim_pending(
        &self,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<Delivery>> {
        let mut state = self.broker.lock().await;
        let now = Instant::now();
        let min_idle = Duration::from_millis(min_idle_ms);

        let mut stale: Vec<&mut InFlight> = state
            .in_flight
            .values_mut()
            .filter(|f| now.duration_since(f.delivered_at) >= min_idle)
            .collect();
        stale.sort_by(|a, b| a.delivered_at.cmp(&b.delivered_at));

        let mut claimed = Vec::new();
        for entry in stale.into_iter().take(count) {
            entry.consumer = consumer.to_string();
            entry.delivered_at = now;
            claimed.push(entry.delivery.clone());
        }
        Ok(claimed)
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        self.broker.lock().await.in_flight.remove(message_id);
        Ok(())
    }

    async fn len(&self) -> QueueResult<u64> {
        let state = self.broker.lock().await;
        Ok((state.ready.len() + state.in_flight.len()) as u64)
    }

    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryBackend {
    async fn create(&self, record: &JobRecord) -> QueueResult<()> {
        let mut records = self.records.lock().await;
        let now = Instant::now();
        records.retain(|_, (_, expires)| *expires > now);
        if records.contains_key(&record.job_id) {
            return Err(QueueError::enqueue_failed(format!(
                "status record {} already exists",
                record.job_id
            )));
        }
        records.insert(record.job_id.clone(), (record.clone(), now + self.status_ttl));
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<JobRecord>> {
        let mut records = self.records.lock().await;
        match records.get(job_id) {
            Some((record, expires)) if *expires > Instant::now() => Ok(Some(record.clone())),
            Some(_) => {
                records.remove(job_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn replace_if_open(&self, record: &JobRecord) -> QueueResult<WriteOutcome> {
        let mut records = self.records.lock().await;
        let Some((stored, expires)) = records.get_mut(&record.job_id) else {
            return Ok(WriteOutcome::Missing);
        };
        if *expires <= Instant::now() {
            records.remove(&record.job_id);
            return Ok(WriteOutcome::Missing);
        }
        if stored.is_terminal() {
            return Ok(WriteOutcome::RejectedTerminal);
        }
        *stored = record.clone();
        Ok(WriteOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscribe_models::{StageName, Stem};

    fn job() -> StageJob {
        StageJob::new(StageName::Transcribe, Stem::parse("v1").unwrap())
    }

    #[tokio::test]
    async fn delivery_stays_in_flight_until_acked() {
        let backend = MemoryBackend::default();
        backend.push(&job()).await.unwrap();

        let got = backend.consume("w1", 0, 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert!(backend.consume("w2", 0, 10).await.unwrap().is_empty());
        assert_eq!(backend.len().await.unwrap(), 1);

        backend.ack(&got[0].message_id).await.unwrap();
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn consume_wakes_on_push() {
        let backend = std::sync::Arc::new(MemoryBackend::default());
        let consumer = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.consume("w1", 5_000, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        backend.push(&job()).await.unwrap();

        let got = consumer.await.unwrap().unwrap();
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn idle_deliveries_can_be_claimed() {
        let backend = MemoryBackend::default();
        backend.push(&job()).await.unwrap();
        let first = backend.consume("crashed", 0, 1).await.unwrap();

        assert!(backend.claim_pending("w2", 60_000, 10).await.unwrap().is_empty());
        let claimed = backend.claim_pending("w2", 0, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].message_id, first[0].message_id);
    }

    #[tokio::test]
    async fn records_expire() {
        let backend = MemoryBackend::new(Duration::from_millis(10));
        let j = job();
        let record = JobRecord::pending(j.job_id.clone(), j.stage, j.stem.clone());
        backend.create(&record).await.unwrap();
        assert!(backend.get(&j.job_id).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(backend.get(&j.job_id).await.unwrap().is_none());
        assert_eq!(
            backend.replace_if_open(&record).await.unwrap(),
            WriteOutcome::Missing
        );
    }
}
