//! The Task record and its status machine.

use crate::types::{TaskHandle, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a scheduled task.
///
/// Transitions are monotonic: `Pending -> Running -> {Completed | Failed}`.
/// A task cancelled before it starts may go straight from `Pending` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, waiting for its delay to elapse
    Pending,
    /// The tool is executing
    Running,
    /// The tool succeeded and its payload is in the blob store
    Completed,
    /// The tool failed or the run was cancelled
    Failed,
}

impl TaskStatus {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` respects the status machine.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Returns the stored string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Fields supplied by the wrapper when it creates a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    /// Conversation thread that owns the task
    pub owner_thread_id: String,
    /// The tool call this task executes
    pub tool_call_id: String,
    /// Registered tool name
    pub tool_name: String,
    /// Arguments exactly as the caller supplied them
    pub args: Value,
    /// Handle dependents use to reference the output
    pub handle: TaskHandle,
}

/// A persisted record of one deferred tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier
    pub id: TaskId,
    /// Conversation thread that owns the task
    pub owner_thread_id: String,
    /// The tool call this task executes
    pub tool_call_id: String,
    /// Registered tool name
    pub tool_name: String,
    /// Arguments exactly as the caller supplied them
    pub args: Value,
    /// Handle dependents use to reference the output
    pub handle: TaskHandle,
    /// Current lifecycle state
    pub status: TaskStatus,
    /// Blob store key of the payload, set when the task completes
    pub result_blob_path: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh `Pending` task from creation fields.
    #[must_use]
    pub fn pending(id: TaskId, new: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_thread_id: new.owner_thread_id,
            tool_call_id: new.tool_call_id,
            tool_name: new.tool_name,
            args: new.args,
            handle: new.handle,
            status: TaskStatus::Pending,
            result_blob_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true once the task has completed successfully.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
