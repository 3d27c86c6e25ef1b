//! The single entry point for tool calls.
//!
//! ```text
//! wrap(thread, call, name, args, mode, delay)
//!   |
//!   +-- registry lookup ----------- unknown --> error / LookupError
//!   +-- Tool::validate ------------ fails ----> error / ValidationError
//!   |
//!   +-- SYNC ------ Tool::execute ------------> success { payload } | error
//!   +-- SCHEDULE -- TaskStore::create_task ---> success { handle_name } | error / StoreError
//!                        |
//!                        +-- TaskScheduler job (after delay):
//!                              execute -> BlobStore::put -> COMPLETED | FAILED
//! ```

use crate::error::ToolCallError;
use crate::tasks::{NewTask, ScheduledRun, SchedulerConfig, TaskScheduler};
use crate::tools::context::{ToolContext, ToolServices};
use crate::tools::registry::ToolRegistry;
use crate::tools::result::{ExecutionMode, ToolCallResult};
use crate::types::{TaskHandle, HANDLE_KEY};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Resolves, validates and runs (or schedules) tool calls.
#[derive(Debug, Clone)]
pub struct ToolCallWrapper {
    registry: Arc<ToolRegistry>,
    services: ToolServices,
    scheduler: TaskScheduler,
}

impl ToolCallWrapper {
    /// Creates a wrapper. Scheduled calls run on a scheduler over the
    /// services' stores.
    #[must_use]
    pub fn new(registry: ToolRegistry, services: ToolServices, scheduler: SchedulerConfig) -> Self {
        let scheduler = TaskScheduler::new(
            scheduler,
            services.task_store.clone(),
            services.blob_store.clone(),
        );
        Self {
            registry: Arc::new(registry),
            services,
            scheduler,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn services(&self) -> &ToolServices {
        &self.services
    }

    /// The scheduler running deferred calls.
    #[must_use]
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Runs one tool call and describes the outcome.
    ///
    /// In `Schedule` mode the result only reflects whether the task was
    /// created; the deferred execution's outcome is recorded on the task.
    /// `delay` applies to `Schedule` mode only and defaults to the scheduler's
    /// configured delay.
    pub async fn wrap(
        &self,
        thread_id: &str,
        tool_call_id: &str,
        tool_name: &str,
        args: Value,
        mode: ExecutionMode,
        delay: Option<Duration>,
    ) -> ToolCallResult {
        let ctx = ToolContext::new(thread_id, tool_call_id, args.clone(), self.services.clone());

        let tool = match self.registry.create(tool_name, ctx) {
            Ok(tool) => tool,
            Err(error) => {
                tracing::warn!(
                    thread_id,
                    tool_call_id,
                    tool_name,
                    error = %error,
                    "tool lookup failed"
                );
                return ToolCallResult::error(None, tool_call_id, thread_id, &error);
            }
        };

        let fail = |error: &ToolCallError| {
            ToolCallResult::error(Some(tool_name.to_string()), tool_call_id, thread_id, error)
        };

        if let Err(error) = tool.validate() {
            tracing::info!(
                thread_id,
                tool_call_id,
                tool_name,
                error_type = error.error_type(),
                error = %error,
                "tool call rejected"
            );
            return fail(&error);
        }

        match mode {
            ExecutionMode::Sync => match tool.execute().await {
                Ok(content) => {
                    tracing::debug!(thread_id, tool_call_id, tool_name, "tool call succeeded");
                    ToolCallResult::success(tool_name, tool_call_id, thread_id, content)
                }
                Err(error) => {
                    tracing::warn!(
                        thread_id,
                        tool_call_id,
                        tool_name,
                        error_type = error.error_type(),
                        error = %error,
                        "tool call failed"
                    );
                    fail(&error)
                }
            },
            ExecutionMode::Schedule => {
                let handle = TaskHandle::derive(tool_call_id, tool_name);
                let new_task = NewTask {
                    owner_thread_id: thread_id.to_string(),
                    tool_call_id: tool_call_id.to_string(),
                    tool_name: tool_name.to_string(),
                    args,
                    handle: handle.clone(),
                };

                let task = match self.services.task_store.create_task(new_task).await {
                    Ok(task) => task,
                    Err(error) => {
                        let error = ToolCallError::from(error);
                        tracing::error!(
                            thread_id,
                            tool_call_id,
                            tool_name,
                            error = %error,
                            "could not create task"
                        );
                        return fail(&error);
                    }
                };

                let ticket = self.scheduler.schedule(ScheduledRun { task, tool, delay });
                tracing::info!(
                    thread_id,
                    tool_call_id,
                    tool_name,
                    task_id = %ticket.task_id,
                    handle = %handle,
                    "tool call scheduled"
                );
                ToolCallResult::success(
                    tool_name,
                    tool_call_id,
                    thread_id,
                    json!({ HANDLE_KEY: handle.as_str() }),
                )
            }
        }
    }
}
