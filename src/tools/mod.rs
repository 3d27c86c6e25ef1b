//! Tool system.
//!
//! - **[`Tool`]**: one unit of work, built per call from a [`ToolContext`]
//! - **[`ToolRegistry`]**: maps names to tool factories
//! - **[`ToolCallWrapper`]**: resolves, validates and runs or schedules a call
//! - **[`builtins`]**: `run_code` and `gather_outputs`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use acton_toolcall::prelude::*;
//!
//! let mut registry = ToolRegistry::new();
//! BuiltinTools::register_all(&mut registry)?;
//!
//! let wrapper = ToolCallWrapper::new(registry, ToolServices::in_memory(), SchedulerConfig::default());
//! let result = wrapper
//!     .wrap("thread-1", "call-1", "gather_outputs", json!({"task_ids": []}), ExecutionMode::Sync, None)
//!     .await;
//! ```

pub mod builtins;
mod context;
mod definition;
mod registry;
mod result;
mod wrapper;

pub use context::{ToolContext, ToolServices};
pub use definition::{Tool, ToolDefinition, ToolExecutionFuture, ToolSpec};
pub use registry::{RegisteredTool, ToolFactory, ToolRegistry};
pub use result::{ExecutionMode, ToolCallResult};
pub use wrapper::ToolCallWrapper;
