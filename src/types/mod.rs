//! Core identifier types.
//!
//! - [`TaskId`]: TypeID-formatted identifier of a persisted task
//! - [`TaskHandle`]: caller-visible reference to a task's eventual output

mod handle;
mod task_id;

pub use handle::{TaskHandle, HANDLE_KEY};
pub use task_id::{InvalidTaskId, TaskId};
