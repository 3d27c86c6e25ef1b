//! Store interfaces consumed by the orchestration core.
//!
//! Both stores are shared by every wrapper, scheduler job and waiter in the
//! process, so implementations must make each call atomic on its own. The core
//! never holds a lock across calls.

use crate::tasks::error::StoreError;
use crate::tasks::task::{NewTask, Task, TaskStatus};
use crate::types::TaskId;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

/// Persists task records.
#[async_trait]
pub trait TaskStore: Send + Sync + Debug {
    /// Creates a `Pending` task and returns the stored record.
    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError>;

    /// Fetches a task by id.
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Moves a task to `status`.
    ///
    /// Implementations reject transitions that `TaskStatus::can_transition_to`
    /// forbids. On `Completed` the task's `result_blob_path` is set to its handle.
    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError>;

    /// Lists tasks owned by a thread, oldest first.
    async fn list_thread_tasks(&self, thread_id: &str) -> Result<Vec<Task>, StoreError>;
}

/// Keyed payload cache for task outputs.
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Returns the payload stored under `key`, if any.
    async fn try_get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Stores `payload` under `key`, replacing any previous value.
    async fn put(&self, key: &str, payload: Value) -> Result<(), StoreError>;
}
