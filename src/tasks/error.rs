//! Store error types.
//!
//! Failures from task and blob stores, with enough context to log an
//! actionable message. The wrapper surfaces every one of them to callers as
//! a `StoreError`.

use crate::error::ToolCallError;
use crate::tasks::task::TaskStatus;
use crate::types::TaskId;
use std::fmt;

/// Errors that can occur in task or blob store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The store operation that failed
    pub operation: &'static str,
    kind: Box<StoreErrorKind>,
}

/// Specific store error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Failed to open or create the database
    DatabaseOpen {
        /// Path to the database file
        path: String,
        /// Error message from the database
        message: String,
    },
    /// Failed to initialize the schema
    SchemaInit {
        /// Error message from the database
        message: String,
    },
    /// Query execution failed
    QueryFailed {
        /// Error message from the database
        message: String,
    },
    /// The referenced task does not exist
    TaskNotFound {
        /// The missing task
        task_id: TaskId,
    },
    /// The status change would break monotonicity
    InvalidTransition {
        /// The task being updated
        task_id: TaskId,
        /// Its current status
        from: TaskStatus,
        /// The requested status
        to: TaskStatus,
    },
    /// A stored value could not be encoded or decoded
    Serialization {
        /// Error message
        message: String,
    },
    /// The store refused the operation for its own reasons
    Unavailable {
        /// Error message
        message: String,
    },
}

impl StoreError {
    /// Creates a new store error for `operation`.
    #[must_use]
    pub fn new(operation: &'static str, kind: StoreErrorKind) -> Self {
        Self {
            operation,
            kind: Box::new(kind),
        }
    }

    /// Returns a reference to the error kind.
    #[must_use]
    pub fn kind(&self) -> &StoreErrorKind {
        &self.kind
    }

    /// Creates a database open error.
    #[must_use]
    pub fn database_open(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            "open_database",
            StoreErrorKind::DatabaseOpen {
                path: path.into(),
                message: message.into(),
            },
        )
    }

    /// Creates a schema initialization error.
    #[must_use]
    pub fn schema_init(message: impl Into<String>) -> Self {
        Self::new(
            "initialize_schema",
            StoreErrorKind::SchemaInit {
                message: message.into(),
            },
        )
    }

    /// Creates a query failed error.
    #[must_use]
    pub fn query_failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            operation,
            StoreErrorKind::QueryFailed {
                message: message.into(),
            },
        )
    }

    /// Creates a task-not-found error.
    #[must_use]
    pub fn task_not_found(operation: &'static str, task_id: TaskId) -> Self {
        Self::new(operation, StoreErrorKind::TaskNotFound { task_id })
    }

    /// Creates an invalid transition error.
    #[must_use]
    pub fn invalid_transition(task_id: TaskId, from: TaskStatus, to: TaskStatus) -> Self {
        Self::new(
            "update_task_status",
            StoreErrorKind::InvalidTransition { task_id, from, to },
        )
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            operation,
            StoreErrorKind::Serialization {
                message: message.into(),
            },
        )
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            operation,
            StoreErrorKind::Unavailable {
                message: message.into(),
            },
        )
    }

    /// Returns true if the error is an invalid status transition.
    #[must_use]
    pub fn is_invalid_transition(&self) -> bool {
        matches!(*self.kind, StoreErrorKind::InvalidTransition { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            StoreErrorKind::DatabaseOpen { path, message } => {
                write!(
                    f,
                    "failed to open database '{}': {}; check the path and permissions",
                    path, message
                )
            }
            StoreErrorKind::SchemaInit { message } => {
                write!(f, "failed to initialize task schema: {}", message)
            }
            StoreErrorKind::QueryFailed { message } => {
                write!(f, "{} query failed: {}", self.operation, message)
            }
            StoreErrorKind::TaskNotFound { task_id } => {
                write!(f, "task '{}' not found", task_id)
            }
            StoreErrorKind::InvalidTransition { task_id, from, to } => {
                write!(
                    f,
                    "task '{}' cannot move from {} to {}; status transitions are monotonic",
                    task_id, from, to
                )
            }
            StoreErrorKind::Serialization { message } => {
                write!(f, "{} could not encode stored value: {}", self.operation, message)
            }
            StoreErrorKind::Unavailable { message } => {
                write!(f, "{} unavailable: {}", self.operation, message)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for ToolCallError {
    fn from(error: StoreError) -> Self {
        ToolCallError::store(error.operation, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let id = TaskId::new();
        let error =
            StoreError::invalid_transition(id.clone(), TaskStatus::Completed, TaskStatus::Running);
        let message = error.to_string();
        assert!(message.contains(&id.to_string()));
        assert!(message.contains("COMPLETED"));
        assert!(message.contains("monotonic"));
        assert!(error.is_invalid_transition());
    }

    #[test]
    fn converts_to_store_tool_call_error() {
        let error: ToolCallError = StoreError::query_failed("create_task", "disk full").into();
        assert_eq!(error.error_type(), "StoreError");
        assert!(error.to_string().contains("create_task"));
        assert!(error.to_string().contains("disk full"));
    }
}
