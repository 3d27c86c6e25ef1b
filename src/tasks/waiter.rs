//! Waiting on prerequisite tasks.
//!
//! A tool that consumes other tasks' outputs calls [`DependencyWaiter::wait_for`]
//! before doing its own work. The waiter polls the task store until every
//! dependency is `Completed`, then reads each distinct handle's payload from the
//! blob store. Blob reads never start before every dependency is ready.

use crate::error::ToolCallError;
use crate::tasks::error::StoreError;
use crate::tasks::store::{BlobStore, TaskStore};
use crate::tasks::task::TaskStatus;
use crate::types::{TaskHandle, TaskId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outputs of a satisfied dependency set, keyed by handle.
pub type DependencyOutputs = BTreeMap<TaskHandle, Value>;

/// Polling behaviour for [`DependencyWaiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaiterConfig {
    /// Time between status polls
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub max_wait: Option<Duration>,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl WaiterConfig {
    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bounds the total wait.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Blocks the calling tool until a set of tasks completes.
///
/// Each waiter keeps its own cache of payloads it has already read, so
/// repeated waits on overlapping sets fetch each handle once. Waiters share
/// nothing with each other except the stores.
#[derive(Debug)]
pub struct DependencyWaiter {
    task_store: Arc<dyn TaskStore>,
    blob_store: Arc<dyn BlobStore>,
    config: WaiterConfig,
    materialized: HashMap<TaskHandle, Value>,
}

impl DependencyWaiter {
    /// Creates a waiter over the given stores.
    #[must_use]
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        blob_store: Arc<dyn BlobStore>,
        config: WaiterConfig,
    ) -> Self {
        Self {
            task_store,
            blob_store,
            config,
            materialized: HashMap::new(),
        }
    }

    /// Returns the polling configuration.
    #[must_use]
    pub fn config(&self) -> &WaiterConfig {
        &self.config
    }

    /// Waits until every task in `task_ids` is `Completed` and returns their
    /// outputs.
    ///
    /// An empty set returns an empty mapping without touching either store.
    /// A dependency whose payload is missing from the blob store maps to an
    /// empty JSON array.
    ///
    /// # Errors
    ///
    /// - `DependencyFailed` if any dependency is `Failed`
    /// - `DependencyTimeout` if `max_wait` elapses first
    /// - `StoreError` if a store call fails or a task id is unknown
    pub async fn wait_for(&mut self, task_ids: &[TaskId]) -> Result<DependencyOutputs, ToolCallError> {
        if task_ids.is_empty() {
            return Ok(DependencyOutputs::new());
        }

        let started = Instant::now();
        let handles = loop {
            let (handles, pending) = self.poll_once(task_ids).await?;
            if pending == 0 {
                break handles;
            }

            if let Some(max_wait) = self.config.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    tracing::warn!(
                        pending,
                        waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                        "giving up on dependencies"
                    );
                    return Err(ToolCallError::dependency_timeout(waited, pending));
                }
            }

            tracing::trace!(pending, total = task_ids.len(), "dependencies not ready");
            sleep(self.config.poll_interval).await;
        };

        let mut outputs = DependencyOutputs::new();
        for handle in handles {
            if outputs.contains_key(&handle) {
                continue;
            }
            let payload = self.materialize(&handle).await?;
            outputs.insert(handle, payload);
        }

        tracing::debug!(
            dependencies = task_ids.len(),
            outputs = outputs.len(),
            "dependencies satisfied"
        );
        Ok(outputs)
    }

    /// Reads every task once. Returns the handles of completed tasks and the
    /// number still in flight.
    async fn poll_once(&self, task_ids: &[TaskId]) -> Result<(Vec<TaskHandle>, usize), ToolCallError> {
        let mut handles = Vec::with_capacity(task_ids.len());
        let mut pending = 0;

        for id in task_ids {
            let task = self
                .task_store
                .get_task(id)
                .await?
                .ok_or_else(|| StoreError::task_not_found("get_task", id.clone()))?;

            match task.status {
                TaskStatus::Completed => handles.push(task.handle),
                TaskStatus::Failed => {
                    tracing::warn!(task_id = %id, tool_name = %task.tool_name, "dependency failed");
                    return Err(ToolCallError::dependency_failed(id.clone()));
                }
                TaskStatus::Pending | TaskStatus::Running => pending += 1,
            }
        }

        Ok((handles, pending))
    }

    async fn materialize(&mut self, handle: &TaskHandle) -> Result<Value, ToolCallError> {
        if let Some(cached) = self.materialized.get(handle) {
            return Ok(cached.clone());
        }

        let payload = self
            .blob_store
            .try_get(handle.as_str())
            .await?
            .unwrap_or_else(|| Value::Array(Vec::new()));
        self.materialized.insert(handle.clone(), payload.clone());
        Ok(payload)
    }
}
