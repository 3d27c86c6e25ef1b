//! Deferred execution of scheduled tool calls.
//!
//! Every scheduled call becomes one tokio task (a *job*) that owns its task
//! record for the rest of its life:
//!
//! ```text
//! PENDING --delay--> RUNNING --execute ok--> blob put --> COMPLETED
//!    |                  |                        |
//!    | cancel           |                        +--store err--> FAILED
//!    |                  +--execute err (after retries)--> FAILED
//!    +--------------------------------------------------> FAILED
//! ```
//!
//! The job is the only writer of its task's status. A job can be cancelled
//! while it is still waiting on its delay; once it starts executing it runs to
//! completion.

use crate::error::ToolCallError;
use crate::tasks::store::{BlobStore, TaskStore};
use crate::tasks::task::{Task, TaskStatus};
use crate::tools::Tool;
use crate::types::{TaskHandle, TaskId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Default delay before a scheduled call runs.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1);

/// How many times a scheduled run retries a retriable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub max_retries: u32,
    /// Pause before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Retries up to `max_retries` times with a fixed `backoff`.
    #[must_use]
    pub fn fixed(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay used when a call does not name one
    pub default_delay: Duration,
    /// Retry behaviour for failed runs
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_delay: DEFAULT_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

/// One scheduled call handed to [`TaskScheduler::schedule`].
#[derive(Debug)]
pub struct ScheduledRun {
    /// The freshly created `Pending` task
    pub task: Task,
    /// The tool instance that will execute
    pub tool: Box<dyn Tool>,
    /// Delay before execution; `None` uses the configured default
    pub delay: Option<Duration>,
}

/// Receipt for a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTicket {
    /// The task the job owns
    pub task_id: TaskId,
    /// Where the payload will be stored
    pub handle: TaskHandle,
    /// The effective delay
    pub delay: Duration,
}

type Waiting = Arc<Mutex<HashMap<TaskId, CancellationToken>>>;

/// Runs scheduled tool calls after their delay.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    config: SchedulerConfig,
    task_store: Arc<dyn TaskStore>,
    blob_store: Arc<dyn BlobStore>,
    waiting: Waiting,
    tracker: TaskTracker,
}

impl TaskScheduler {
    /// Creates a scheduler over the given stores.
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        task_store: Arc<dyn TaskStore>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config,
            task_store,
            blob_store,
            waiting: Arc::default(),
            tracker: TaskTracker::new(),
        }
    }

    /// Returns the scheduler settings.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Spawns the job for a scheduled call and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, run: ScheduledRun) -> ScheduleTicket {
        let ScheduledRun { task, tool, delay } = run;
        let delay = delay.unwrap_or(self.config.default_delay);
        let token = CancellationToken::new();
        lock(&self.waiting).insert(task.id.clone(), token.clone());

        let ticket = ScheduleTicket {
            task_id: task.id.clone(),
            handle: task.handle.clone(),
            delay,
        };

        tracing::debug!(
            task_id = %task.id,
            tool_name = %task.tool_name,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "task scheduled"
        );

        let job = Job {
            task_store: self.task_store.clone(),
            blob_store: self.blob_store.clone(),
            waiting: self.waiting.clone(),
            retry: self.config.retry,
            task,
            tool,
        };
        self.tracker.spawn(job.run(delay, token));

        ticket
    }

    /// Cancels a job that is still waiting on its delay.
    ///
    /// Returns false if the job already started or no such job exists.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        match lock(&self.waiting).remove(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of jobs still waiting on their delay.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.waiting).len()
    }

    /// Cancels every job still waiting on its delay.
    ///
    /// Returns how many jobs were cancelled. Jobs already executing finish
    /// normally.
    pub fn shutdown(&self) -> usize {
        let tokens: Vec<CancellationToken> = lock(&self.waiting).drain().map(|(_, t)| t).collect();
        for token in &tokens {
            token.cancel();
        }
        if !tokens.is_empty() {
            tracing::info!(cancelled = tokens.len(), "scheduler shut down");
        }
        tokens.len()
    }

    /// Waits until every job spawned so far has settled its task.
    pub async fn idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

fn lock(waiting: &Waiting) -> std::sync::MutexGuard<'_, HashMap<TaskId, CancellationToken>> {
    waiting.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything one deferred run needs, moved into its tokio task.
struct Job {
    task_store: Arc<dyn TaskStore>,
    blob_store: Arc<dyn BlobStore>,
    waiting: Waiting,
    retry: RetryPolicy,
    task: Task,
    tool: Box<dyn Tool>,
}

impl Job {
    async fn run(self, delay: Duration, token: CancellationToken) {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                self.cancelled().await;
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }

        // Leaving the waiting set is the commit point; a cancel that won the
        // lock first still counts.
        if lock(&self.waiting).remove(&self.task.id).is_none() {
            self.cancelled().await;
            return;
        }

        let id = &self.task.id;
        if let Err(error) = self.task_store.update_task_status(id, TaskStatus::Running).await {
            tracing::error!(
                task_id = %id,
                tool_name = %self.task.tool_name,
                error = %error,
                "could not mark task running"
            );
            self.mark_failed().await;
            return;
        }

        match self.execute().await {
            Ok(payload) => self.complete(payload).await,
            Err(error) => {
                tracing::error!(
                    task_id = %id,
                    tool_name = %self.task.tool_name,
                    error_type = error.error_type(),
                    error = %error,
                    "scheduled tool execution failed"
                );
                self.mark_failed().await;
            }
        }
    }

    async fn execute(&self) -> Result<Value, ToolCallError> {
        let mut attempt = 0;
        loop {
            match self.tool.execute().await {
                Ok(payload) => return Ok(payload),
                Err(error) if error.is_retriable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        task_id = %self.task.id,
                        tool_name = %self.task.tool_name,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %error,
                        "retrying scheduled tool"
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn complete(&self, payload: Value) {
        let id = &self.task.id;
        let handle = &self.task.handle;

        if let Err(error) = self.blob_store.put(handle.as_str(), payload).await {
            tracing::error!(
                task_id = %id,
                tool_name = %self.task.tool_name,
                handle = %handle,
                error = %error,
                "could not store task output"
            );
            self.mark_failed().await;
            return;
        }

        match self.task_store.update_task_status(id, TaskStatus::Completed).await {
            Ok(()) => tracing::info!(
                task_id = %id,
                tool_name = %self.task.tool_name,
                handle = %handle,
                "scheduled task completed"
            ),
            Err(error) => {
                tracing::error!(
                    task_id = %id,
                    tool_name = %self.task.tool_name,
                    error = %error,
                    "could not mark task completed"
                );
                self.mark_failed().await;
            }
        }
    }

    async fn cancelled(&self) {
        tracing::warn!(
            task_id = %self.task.id,
            tool_name = %self.task.tool_name,
            "scheduled task cancelled before it ran"
        );
        self.mark_failed().await;
    }

    async fn mark_failed(&self) {
        if let Err(error) = self
            .task_store
            .update_task_status(&self.task.id, TaskStatus::Failed)
            .await
        {
            tracing::error!(
                task_id = %self.task.id,
                tool_name = %self.task.tool_name,
                error = %error,
                "could not mark task failed"
            );
        }
    }
}
