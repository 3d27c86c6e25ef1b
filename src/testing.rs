//! Recording store doubles for tests.
//!
//! Provides:
//! - [`RecordingTaskStore`] and [`RecordingBlobStore`]: in-memory stores that
//!   append every call to a shared [`EventLog`], so tests can assert on call
//!   counts and on the relative order of task-store and blob-store calls
//! - [`StubTool`]: a configurable tool that counts its `execute` calls
//! - [`module_returning`]: the smallest sandbox guest that returns a given
//!   JSON document
//!
//! # Usage
//!
//! ```rust,ignore
//! use acton_toolcall::testing::{EventLog, RecordingBlobStore, RecordingTaskStore};
//!
//! let log = EventLog::new();
//! let tasks = RecordingTaskStore::new(log.clone());
//! let blobs = RecordingBlobStore::new(log.clone());
//! ```

use crate::error::ToolCallError;
use crate::tasks::{BlobStore, InMemoryBlobStore, InMemoryTaskStore, NewTask, StoreError, Task, TaskStatus, TaskStore};
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolExecutionFuture};
use crate::types::TaskId;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// `TaskStore::create_task` for the given tool call
    CreateTask {
        /// The tool call id
        tool_call_id: String,
    },
    /// `TaskStore::get_task`
    GetTask(TaskId),
    /// `TaskStore::update_task_status`
    UpdateStatus(TaskId, TaskStatus),
    /// `BlobStore::try_get`
    BlobGet(String),
    /// `BlobStore::put`
    BlobPut(String),
}

/// Shared, append-only log of store calls.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: StoreEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Returns a copy of every recorded event, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Counts events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&StoreEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// Returns the index of the first event matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&StoreEvent) -> bool) -> Option<usize> {
        self.events().iter().position(predicate)
    }

    /// Counts status updates to `status` for `task_id`.
    #[must_use]
    pub fn status_updates(&self, task_id: &TaskId, status: TaskStatus) -> usize {
        self.count(|e| matches!(e, StoreEvent::UpdateStatus(id, s) if id == task_id && *s == status))
    }
}

/// Task store that records calls and can be told to fail task creation or
/// particular status updates.
#[derive(Debug)]
pub struct RecordingTaskStore {
    inner: InMemoryTaskStore,
    log: EventLog,
    fail_create: AtomicBool,
    fail_status: Mutex<Option<TaskStatus>>,
}

impl RecordingTaskStore {
    /// Creates an empty recording store writing to `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: InMemoryTaskStore::new(),
            log,
            fail_create: AtomicBool::new(false),
            fail_status: Mutex::new(None),
        }
    }

    /// Makes every subsequent `create_task` fail.
    pub fn fail_creates(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent update to `status` fail. Other updates still
    /// go through.
    pub fn fail_updates_to(&self, status: TaskStatus) {
        if let Ok(mut fail) = self.fail_status.lock() {
            *fail = Some(status);
        }
    }

    /// Moves a task through `Running` to `status` without recording events.
    ///
    /// Lets tests play the role of another task's scheduler job.
    ///
    /// # Errors
    ///
    /// Returns the store's error if either transition is rejected.
    pub async fn settle(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        self.inner
            .update_task_status(id, TaskStatus::Running)
            .await?;
        self.inner.update_task_status(id, status).await
    }
}

#[async_trait]
impl TaskStore for RecordingTaskStore {
    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        self.log.push(StoreEvent::CreateTask {
            tool_call_id: new.tool_call_id.clone(),
        });
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("create_task", "injected failure"));
        }
        self.inner.create_task(new).await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        self.log.push(StoreEvent::GetTask(id.clone()));
        self.inner.get_task(id).await
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        self.log.push(StoreEvent::UpdateStatus(id.clone(), status));
        let injected = self
            .fail_status
            .lock()
            .map(|fail| *fail == Some(status))
            .unwrap_or(false);
        if injected {
            return Err(StoreError::unavailable("update_task_status", "injected failure"));
        }
        self.inner.update_task_status(id, status).await
    }

    async fn list_thread_tasks(&self, thread_id: &str) -> Result<Vec<Task>, StoreError> {
        self.inner.list_thread_tasks(thread_id).await
    }
}

/// Blob store that records calls and can be told to fail writes.
#[derive(Debug)]
pub struct RecordingBlobStore {
    inner: InMemoryBlobStore,
    log: EventLog,
    fail_put: AtomicBool,
}

impl RecordingBlobStore {
    /// Creates an empty recording store writing to `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: InMemoryBlobStore::new(),
            log,
            fail_put: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `put` fail.
    pub fn fail_puts(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    /// Stores a payload without recording an event.
    ///
    /// # Errors
    ///
    /// Returns whatever the underlying store returns.
    pub async fn seed(&self, key: &str, payload: Value) -> Result<(), StoreError> {
        self.inner.put(key, payload).await
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn try_get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.log.push(StoreEvent::BlobGet(key.to_string()));
        self.inner.try_get(key).await
    }

    async fn put(&self, key: &str, payload: Value) -> Result<(), StoreError> {
        self.log.push(StoreEvent::BlobPut(key.to_string()));
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("put", "injected failure"));
        }
        self.inner.put(key, payload).await
    }
}

/// What a [`StubTool`] does when validated or executed.
#[derive(Debug, Clone)]
pub struct StubBehavior {
    /// Validation failure reason, if validation should fail
    pub reject_with: Option<String>,
    /// Execution failure reason, if execution should fail
    pub fail_with: Option<String>,
    /// How many leading executions time out (retriable) before the others
    /// behave normally
    pub time_outs: usize,
    /// Counts `execute` calls across every instance built from this behavior
    pub executions: Arc<AtomicUsize>,
}

impl StubBehavior {
    /// A tool that validates and succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            reject_with: None,
            fail_with: None,
            time_outs: 0,
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A tool whose validation fails with `reason`.
    #[must_use]
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            reject_with: Some(reason.into()),
            ..Self::succeeding()
        }
    }

    /// A tool whose execution fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::succeeding()
        }
    }

    /// A tool whose first `count` executions time out. Use `usize::MAX` for
    /// a tool that always times out.
    #[must_use]
    pub fn timing_out(count: usize) -> Self {
        Self {
            time_outs: count,
            ..Self::succeeding()
        }
    }

    /// Number of `execute` calls so far.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

/// Tool double that echoes its arguments as `{"size": <len>, "args": ...}`.
#[derive(Debug)]
pub struct StubTool {
    name: String,
    args: Value,
    behavior: StubBehavior,
}

impl StubTool {
    /// Builds an instance for one call.
    #[must_use]
    pub fn new(name: impl Into<String>, ctx: ToolContext, behavior: StubBehavior) -> Self {
        Self {
            name: name.into(),
            args: ctx.args,
            behavior,
        }
    }

    /// Static definition used when registering a stub under `name`.
    #[must_use]
    pub fn definition(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "Test double that reports the size of its arguments",
            json!({"type": "object"}),
        )
    }
}

impl Tool for StubTool {
    fn describe(&self) -> ToolDefinition {
        Self::definition(&self.name)
    }

    fn validate(&self) -> Result<(), ToolCallError> {
        match &self.behavior.reject_with {
            Some(reason) => Err(ToolCallError::validation(&self.name, reason.clone())),
            None => Ok(()),
        }
    }

    fn execute(&self) -> ToolExecutionFuture {
        let attempt = self.behavior.executions.fetch_add(1, Ordering::SeqCst);
        let times_out = attempt < self.behavior.time_outs;
        let name = self.name.clone();
        let args = self.args.clone();
        let fail_with = self.behavior.fail_with.clone();
        Box::pin(async move {
            if times_out {
                return Err(ToolCallError::timeout(Duration::from_secs(1)));
            }
            if let Some(reason) = fail_with {
                return Err(ToolCallError::execution(name, reason));
            }
            let size = args.as_object().map_or(0, serde_json::Map::len);
            Ok(json!({"size": size, "args": args}))
        })
    }
}

/// WebAssembly text for a guest whose `run` returns `json` verbatim.
#[must_use]
pub fn module_returning(json: &str) -> String {
    let escaped = json.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"(module
  (memory (export "memory") 1)
  (data (i32.const 0) "{escaped}")
  (func (export "run") (result i32 i32)
    i32.const 0
    i32.const {len}))"#,
        len = json.len()
    )
}
