//! Application state.

use std::sync::Arc;

use vscribe_queue::{JobQueue, QueueConfig};
use vscribe_storage::{ArtifactStore, StoreConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: ArtifactStore,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    pub fn new(config: ApiConfig, store: ArtifactStore, queue: JobQueue) -> Self {
        Self {
            config,
            store,
            queue: Arc::new(queue),
        }
    }

    /// Open the artifact store and queue configured in the environment.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = ArtifactStore::open(&StoreConfig::from_env())?;
        let queue = JobQueue::from_config(&QueueConfig::from_env())?;
        queue.init().await?;
        Ok(Self::new(config, store, queue))
    }
}
