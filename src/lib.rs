//! # acton-toolcall: tool-call orchestration for agent runtimes
//!
//! Runs the tool calls an agent emits, either immediately or as persisted
//! tasks that execute after a delay. Later calls can wait on earlier tasks
//! and consume their outputs, and caller-supplied WebAssembly runs in a
//! wasmtime sandbox with an import allow-list, a memory cap and a wall-clock
//! timeout.
//!
//! ## Architecture
//!
//! - **Tools**: a registry of tool factories and the [`ToolCallWrapper`](tools::ToolCallWrapper)
//!   that resolves, validates and runs or schedules each call
//! - **Tasks**: task and blob stores (in-memory or libSQL), the scheduler
//!   that runs deferred calls, and the dependency waiter
//! - **Sandbox**: WebAssembly text compilation with positioned diagnostics,
//!   and guest execution on wasmtime
//! - **Config**: TOML configuration at XDG locations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acton_toolcall::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ToolCallError> {
//!     let mut registry = ToolRegistry::new();
//!     BuiltinTools::register_all(&mut registry)?;
//!
//!     let code = r#"(module
//!         (memory (export "memory") 1)
//!         (data (i32.const 0) "2")
//!         (func (export "run") (result i32 i32) i32.const 0 i32.const 1))"#;
//!
//!     let wrapper = ToolCallWrapper::new(registry, ToolServices::in_memory(), SchedulerConfig::default());
//!     let result = wrapper
//!         .wrap("thread-1", "call-1", "run_code", json!({"code": code}), ExecutionMode::Sync, None)
//!         .await;
//!     assert_eq!(result.content(), Some(&json!({"output": 2})));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod sandbox;
pub mod tasks;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tools;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{StorageBackend, ToolCallConfig};
    pub use crate::error::{ToolCallError, ToolCallErrorKind};
    pub use crate::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
    pub use crate::sandbox::{SandboxConfig, SandboxExecutor};
    pub use crate::tasks::{
        BlobStore, InMemoryBlobStore, InMemoryTaskStore, LibSqlStore, RetryPolicy,
        SchedulerConfig, StoreError, Task, TaskScheduler, TaskStatus, TaskStore, WaiterConfig,
    };
    pub use crate::tools::builtins::BuiltinTools;
    pub use crate::tools::{
        ExecutionMode, Tool, ToolCallResult, ToolCallWrapper, ToolContext, ToolDefinition,
        ToolRegistry, ToolServices, ToolSpec,
    };
    pub use crate::types::{TaskHandle, TaskId, HANDLE_KEY};
}
