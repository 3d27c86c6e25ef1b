//! Per-call context and the shared services tools may use.

use crate::sandbox::SandboxExecutor;
use crate::tasks::{BlobStore, DependencyWaiter, InMemoryBlobStore, InMemoryTaskStore, TaskStore, WaiterConfig};
use serde_json::Value;
use std::sync::Arc;

/// Collaborators handed to every tool instance.
///
/// Cloning is cheap; every field is shared.
#[derive(Debug, Clone)]
pub struct ToolServices {
    /// Where tasks are persisted
    pub task_store: Arc<dyn TaskStore>,
    /// Where task outputs are stored
    pub blob_store: Arc<dyn BlobStore>,
    /// Runs caller-supplied WebAssembly
    pub sandbox: Arc<SandboxExecutor>,
    /// Polling settings for dependency waits
    pub waiter: WaiterConfig,
}

impl ToolServices {
    /// Creates services over the given stores with a default sandbox and
    /// waiter configuration.
    #[must_use]
    pub fn new(task_store: Arc<dyn TaskStore>, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            task_store,
            blob_store,
            sandbox: Arc::new(SandboxExecutor::default()),
            waiter: WaiterConfig::default(),
        }
    }

    /// Services backed by fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(InMemoryBlobStore::new()),
        )
    }

    /// Replaces the sandbox.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxExecutor) -> Self {
        self.sandbox = Arc::new(sandbox);
        self
    }

    /// Replaces the waiter configuration.
    #[must_use]
    pub fn with_waiter(mut self, waiter: WaiterConfig) -> Self {
        self.waiter = waiter;
        self
    }

    /// A fresh dependency waiter over these stores.
    #[must_use]
    pub fn dependency_waiter(&self) -> DependencyWaiter {
        DependencyWaiter::new(
            self.task_store.clone(),
            self.blob_store.clone(),
            self.waiter,
        )
    }
}

/// Everything a tool instance learns about the call it serves.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Conversation thread that issued the call
    pub thread_id: String,
    /// Caller-assigned id of the call
    pub tool_call_id: String,
    /// Raw call arguments
    pub args: Value,
    /// Shared collaborators
    pub services: ToolServices,
}

impl ToolContext {
    #[must_use]
    pub fn new(
        thread_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        args: Value,
        services: ToolServices,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            tool_call_id: tool_call_id.into(),
            args,
            services,
        }
    }
}
