//! Task handles.
//!
//! A handle is the token a dependent tool uses to refer to a scheduled task's
//! eventual output. It is derived from the tool call, not from the task record,
//! so it is known before the task finishes (and before the task id is read
//! back from the store). The blob store keys payloads by handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key under which a scheduled call's handle appears in the acknowledgment.
pub const HANDLE_KEY: &str = "handle_name";

/// Reference to a scheduled task's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    /// Derives the handle for a tool call: the call id followed by the tool name.
    #[must_use]
    pub fn derive(tool_call_id: &str, tool_name: &str) -> Self {
        Self(format!("{tool_call_id}{tool_name}"))
    }

    /// Wraps an already-derived handle, e.g. one read back from storage.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
