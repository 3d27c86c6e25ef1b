//! Error types for tool-call orchestration.
//!
//! Every failure that can reach a caller of [`ToolCallWrapper::wrap`] is a
//! [`ToolCallError`]. Each kind maps to a stable `error_type` tag that is
//! placed on the wire; the human-readable message comes from `Display`.
//!
//! `anyhow` appears only at the wasmtime boundary inside the sandbox, where
//! host functions and traps are converted into a [`ToolCallError`] before
//! leaving the module.
//!
//! [`ToolCallWrapper::wrap`]: crate::wrapper::ToolCallWrapper::wrap

use crate::sandbox::Diagnostic;
use crate::types::TaskId;
use std::fmt;
use std::time::Duration;

/// Errors produced while resolving, validating, scheduling or executing a tool.
///
/// The kind is boxed to keep `Result<Value, ToolCallError>` small.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallError {
    kind: Box<ToolCallErrorKind>,
    retriable: bool,
}

/// Specific tool-call error types.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallErrorKind {
    /// No tool is registered under the requested name
    Lookup {
        /// The requested tool name
        tool_name: String,
        /// Closest registered name, if any is similar enough
        suggestion: Option<String>,
    },
    /// The tool rejected its arguments
    Validation {
        /// The tool that rejected its arguments
        tool_name: String,
        /// What was wrong
        reason: String,
    },
    /// The task or blob store failed
    Store {
        /// The store operation that failed
        operation: String,
        /// Message from the store
        message: String,
    },
    /// The tool's own logic failed
    Execution {
        /// The tool that failed
        tool_name: String,
        /// Reason for failure
        reason: String,
    },
    /// Sandboxed code did not compile
    Compilation {
        /// Every diagnostic reported by the compiler
        diagnostics: Vec<Diagnostic>,
    },
    /// Sandboxed code exceeded its deadline
    Timeout {
        /// The deadline that was exceeded
        duration: Duration,
    },
    /// Sandboxed code requested a module outside the allow-list
    ModuleNotAvailable {
        /// The requested module
        module: String,
    },
    /// A task this tool depends on ended in the FAILED state
    DependencyFailed {
        /// The failed task
        task_id: TaskId,
    },
    /// Dependencies did not complete within the waiter's bound
    DependencyTimeout {
        /// How long the waiter polled
        waited: Duration,
        /// Dependencies still not completed
        pending: usize,
    },
    /// The operation was cancelled before it ran
    Cancelled {
        /// What was cancelled
        what: String,
    },
    /// Configuration could not be loaded or was invalid
    Configuration {
        /// The offending field or file
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ToolCallError {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ToolCallErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            retriable: false,
        }
    }

    /// Returns a reference to the error kind.
    #[must_use]
    pub fn kind(&self) -> &ToolCallErrorKind {
        &self.kind
    }

    /// Creates a lookup error for an unregistered tool.
    #[must_use]
    pub fn lookup(tool_name: impl Into<String>, suggestion: Option<String>) -> Self {
        Self::new(ToolCallErrorKind::Lookup {
            tool_name: tool_name.into(),
            suggestion,
        })
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolCallErrorKind::Validation {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Creates a store error.
    #[must_use]
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToolCallErrorKind::Store {
            operation: operation.into(),
            message: message.into(),
        })
    }

    /// Creates an execution error.
    #[must_use]
    pub fn execution(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolCallErrorKind::Execution {
            tool_name: tool_name.into(),
            reason: reason.into(),
        })
    }

    /// Creates a compilation error carrying every diagnostic.
    #[must_use]
    pub fn compilation(diagnostics: Vec<Diagnostic>) -> Self {
        Self::new(ToolCallErrorKind::Compilation { diagnostics })
    }

    /// Creates a sandbox timeout error.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self::new(ToolCallErrorKind::Timeout { duration }).retriable()
    }

    /// Creates a module-not-available error.
    #[must_use]
    pub fn module_not_available(module: impl Into<String>) -> Self {
        Self::new(ToolCallErrorKind::ModuleNotAvailable {
            module: module.into(),
        })
    }

    /// Creates a dependency-failed error.
    #[must_use]
    pub fn dependency_failed(task_id: TaskId) -> Self {
        Self::new(ToolCallErrorKind::DependencyFailed { task_id })
    }

    /// Creates a dependency wait timeout error.
    #[must_use]
    pub fn dependency_timeout(waited: Duration, pending: usize) -> Self {
        Self::new(ToolCallErrorKind::DependencyTimeout { waited, pending })
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(what: impl Into<String>) -> Self {
        Self::new(ToolCallErrorKind::Cancelled { what: what.into() })
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ToolCallErrorKind::Configuration {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Marks this error as safe to retry under a scheduler retry policy.
    #[must_use]
    pub fn retriable(mut self) -> Self {
        self.retriable = true;
        self
    }

    /// Returns true if a scheduled run failing with this error may be retried.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        self.retriable
    }

    /// Returns true if this error is an unregistered tool lookup.
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        matches!(*self.kind, ToolCallErrorKind::Lookup { .. })
    }

    /// Returns true if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(*self.kind, ToolCallErrorKind::Validation { .. })
    }

    /// Returns the compiler diagnostics, if this is a compilation error.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&[Diagnostic]> {
        match self.kind.as_ref() {
            ToolCallErrorKind::Compilation { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }

    /// Returns the stable tag placed in `error_type` on the wire.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self.kind.as_ref() {
            ToolCallErrorKind::Lookup { .. } => "LookupError",
            ToolCallErrorKind::Validation { .. } => "ValidationError",
            ToolCallErrorKind::Store { .. } => "StoreError",
            ToolCallErrorKind::Execution { .. } => "ExecutionError",
            ToolCallErrorKind::Compilation { .. } => "CompilationError",
            ToolCallErrorKind::Timeout { .. } => "TimeoutError",
            ToolCallErrorKind::ModuleNotAvailable { .. } => "ModuleNotAvailable",
            ToolCallErrorKind::DependencyFailed { .. } => "DependencyFailed",
            ToolCallErrorKind::DependencyTimeout { .. } => "DependencyTimeout",
            ToolCallErrorKind::Cancelled { .. } => "Cancelled",
            ToolCallErrorKind::Configuration { .. } => "ConfigurationError",
        }
    }
}

impl fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            ToolCallErrorKind::Lookup {
                tool_name,
                suggestion,
            } => {
                write!(f, "tool '{}' not found", tool_name)?;
                match suggestion {
                    Some(name) => write!(f, "; did you mean '{}'?", name),
                    None => write!(f, "; verify the tool is registered"),
                }
            }
            ToolCallErrorKind::Validation { tool_name, reason } => {
                write!(
                    f,
                    "tool '{}' validation failed: {}; check the input arguments",
                    tool_name, reason
                )
            }
            ToolCallErrorKind::Store { operation, message } => {
                write!(f, "store operation '{}' failed: {}", operation, message)
            }
            ToolCallErrorKind::Execution { tool_name, reason } => {
                write!(f, "tool '{}' execution failed: {}", tool_name, reason)
            }
            ToolCallErrorKind::Compilation { diagnostics } => {
                write!(f, "compilation failed with {} diagnostic", diagnostics.len())?;
                if diagnostics.len() != 1 {
                    write!(f, "s")?;
                }
                for diagnostic in diagnostics {
                    write!(f, "\n  {}", diagnostic)?;
                }
                Ok(())
            }
            ToolCallErrorKind::Timeout { duration } => {
                write!(
                    f,
                    "sandboxed code timed out after {} ms",
                    duration.as_millis()
                )
            }
            ToolCallErrorKind::ModuleNotAvailable { module } => {
                write!(
                    f,
                    "module '{}' is not available in the sandbox; only allow-listed modules can be imported",
                    module
                )
            }
            ToolCallErrorKind::DependencyFailed { task_id } => {
                write!(f, "dependency task '{}' failed; its output will never be available", task_id)
            }
            ToolCallErrorKind::DependencyTimeout { waited, pending } => {
                write!(
                    f,
                    "gave up after {} s with {} dependencies still incomplete",
                    waited.as_secs(),
                    pending
                )
            }
            ToolCallErrorKind::Cancelled { what } => {
                write!(f, "{} was cancelled", what)
            }
            ToolCallErrorKind::Configuration { field, reason } => {
                write!(f, "invalid configuration for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ToolCallError {}
