//! In-process task and blob stores.
//!
//! Used by the CLI's default `memory` backend and by tests. State lives behind
//! tokio `RwLock`s; each trait call takes the lock once, so every operation is
//! atomic with respect to the others.

use crate::tasks::error::StoreError;
use crate::tasks::store::{BlobStore, TaskStore};
use crate::tasks::task::{NewTask, Task, TaskStatus};
use crate::types::TaskId;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Task store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Returns true if no task has been created.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let task = Task::pending(TaskId::new(), new);
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::task_not_found("update_task_status", id.clone()))?;

        if !task.status.can_transition_to(status) {
            return Err(StoreError::invalid_transition(id.clone(), task.status, status));
        }

        task.status = status;
        task.updated_at = Utc::now();
        if status == TaskStatus::Completed {
            task.result_blob_path = Some(task.handle.to_string());
        }
        Ok(())
    }

    async fn list_thread_tasks(&self, thread_id: &str) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.owner_thread_id == thread_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }
}

/// Blob store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Value>>,
}

impl InMemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn try_get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, payload: Value) -> Result<(), StoreError> {
        self.blobs.write().await.insert(key.to_string(), payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskHandle;
    use serde_json::json;

    fn new_task(thread: &str, call: &str) -> NewTask {
        NewTask {
            owner_thread_id: thread.to_string(),
            tool_call_id: call.to_string(),
            tool_name: "run_code".to_string(),
            args: json!({"code": "(module)"}),
            handle: TaskHandle::derive(call, "run_code"),
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(new_task("t1", "c1")).await.unwrap();
        let fetched = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched, task);
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = InMemoryTaskStore::new();
        assert!(store.get_task(&TaskId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completion_records_blob_path() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(new_task("t1", "c1")).await.unwrap();
        store
            .update_task_status(&task.id, TaskStatus::Running)
            .await
            .unwrap();
        store
            .update_task_status(&task.id, TaskStatus::Completed)
            .await
            .unwrap();

        let fetched = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.result_blob_path.as_deref(), Some("c1run_code"));
    }

    #[tokio::test]
    async fn reverse_transition_is_rejected() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(new_task("t1", "c1")).await.unwrap();
        store
            .update_task_status(&task.id, TaskStatus::Failed)
            .await
            .unwrap();
        let err = store
            .update_task_status(&task.id, TaskStatus::Running)
            .await
            .unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test]
    async fn list_filters_by_thread() {
        let store = InMemoryTaskStore::new();
        store.create_task(new_task("t1", "a")).await.unwrap();
        store.create_task(new_task("t2", "b")).await.unwrap();
        store.create_task(new_task("t1", "c")).await.unwrap();

        let tasks = store.list_thread_tasks("t1").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.owner_thread_id == "t1"));
    }

    #[tokio::test]
    async fn blob_put_overwrites() {
        let blobs = InMemoryBlobStore::new();
        assert!(blobs.try_get("h").await.unwrap().is_none());
        blobs.put("h", json!([1])).await.unwrap();
        blobs.put("h", json!([2])).await.unwrap();
        assert_eq!(blobs.try_get("h").await.unwrap(), Some(json!([2])));
    }
}
