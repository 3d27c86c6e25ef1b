//! Outward-facing result of a wrapped tool call.

use crate::error::ToolCallError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Whether a call runs now or later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Execute immediately and return the payload
    #[default]
    Sync,
    /// Persist a task, return its handle and execute after a delay
    Schedule,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("sync"),
            Self::Schedule => f.write_str("schedule"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = ToolCallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "schedule" => Ok(Self::Schedule),
            other => Err(ToolCallError::configuration(
                "mode",
                format!("unknown execution mode '{other}', expected 'sync' or 'schedule'"),
            )),
        }
    }
}

/// Result of one `wrap` call, serialized with a `status` tag.
///
/// ```json
/// {"status": "success", "tool_name": "sizeTool", "tool_call_id": "c1",
///  "thread_id": "t1", "content": {"handle_name": "c1sizeTool"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolCallResult {
    /// The call succeeded (or, when scheduled, its task was created)
    Success {
        /// Tool that ran
        tool_name: String,
        /// The call's id
        tool_call_id: String,
        /// Thread that issued the call
        thread_id: String,
        /// Payload, or `{"handle_name": ...}` for scheduled calls
        content: Value,
    },
    /// The call failed
    Error {
        /// Tool that was resolved; absent when lookup failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        /// The call's id
        tool_call_id: String,
        /// Thread that issued the call
        thread_id: String,
        /// Stable error class tag
        error_type: String,
        /// Human-readable message
        error_message: String,
    },
}

impl ToolCallResult {
    /// A success result.
    #[must_use]
    pub fn success(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        thread_id: impl Into<String>,
        content: Value,
    ) -> Self {
        Self::Success {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            thread_id: thread_id.into(),
            content,
        }
    }

    /// An error result carrying `error`'s class tag and message.
    #[must_use]
    pub fn error(
        tool_name: Option<String>,
        tool_call_id: impl Into<String>,
        thread_id: impl Into<String>,
        error: &ToolCallError,
    ) -> Self {
        Self::Error {
            tool_name,
            tool_call_id: tool_call_id.into(),
            thread_id: thread_id.into(),
            error_type: error.error_type().to_string(),
            error_message: error.to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The success payload.
    #[must_use]
    pub fn content(&self) -> Option<&Value> {
        match self {
            Self::Success { content, .. } => Some(content),
            Self::Error { .. } => None,
        }
    }

    /// The error class tag.
    #[must_use]
    pub fn error_type(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error_type, .. } => Some(error_type),
        }
    }

    /// The error message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error_message, .. } => Some(error_message),
        }
    }

    #[must_use]
    pub fn tool_call_id(&self) -> &str {
        match self {
            Self::Success { tool_call_id, .. } | Self::Error { tool_call_id, .. } => tool_call_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_wire_format() {
        let result = ToolCallResult::success("sizeTool", "c1", "t1", json!({"handle_name": "c1sizeTool"}));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "status": "success",
                "tool_name": "sizeTool",
                "tool_call_id": "c1",
                "thread_id": "t1",
                "content": {"handle_name": "c1sizeTool"}
            })
        );
    }

    #[test]
    fn error_wire_format_omits_unknown_tool_name() {
        let error = ToolCallError::lookup("nope", None);
        let result = ToolCallResult::error(None, "c1", "t1", &error);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_type"], "LookupError");
        assert!(json.get("tool_name").is_none());
        assert_eq!(result.error_message(), Some(error.to_string().as_str()));
    }

    #[test]
    fn deserializes_tagged_results() {
        let result: ToolCallResult = serde_json::from_value(json!({
            "status": "error",
            "tool_call_id": "c1",
            "thread_id": "t1",
            "error_type": "StoreError",
            "error_message": "disk full"
        }))
        .unwrap();
        assert!(!result.is_success());
        assert_eq!(result.error_type(), Some("StoreError"));
        assert_eq!(result.tool_call_id(), "c1");
    }

    #[test]
    fn execution_mode_parses() {
        assert_eq!("sync".parse::<ExecutionMode>().unwrap(), ExecutionMode::Sync);
        assert_eq!("SCHEDULE".parse::<ExecutionMode>().unwrap(), ExecutionMode::Schedule);
        assert!("later".parse::<ExecutionMode>().is_err());
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sync);
    }
}
