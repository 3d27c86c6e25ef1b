//! Tool definition and the traits every tool implements.

use crate::error::ToolCallError;
use crate::tools::context::ToolContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

/// Static description of a tool: its name, what it does and the JSON schema
/// of its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the tool's input parameters
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Creates a definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// The result type for tool execution futures.
pub type ToolExecutionFuture = Pin<Box<dyn Future<Output = Result<Value, ToolCallError>> + Send + 'static>>;

/// One tool instance, bound to the arguments of a single call.
///
/// Instances are built per call by the registry, so `validate` and `execute`
/// take no arguments: everything they need was captured from the
/// [`ToolContext`] at construction.
///
/// # Example
///
/// ```rust
/// use acton_toolcall::tools::{Tool, ToolDefinition, ToolExecutionFuture};
/// use serde_json::{json, Value};
///
/// #[derive(Debug)]
/// struct EchoTool {
///     args: Value,
/// }
///
/// impl Tool for EchoTool {
///     fn describe(&self) -> ToolDefinition {
///         ToolDefinition::new("echo", "Returns its arguments", json!({"type": "object"}))
///     }
///
///     fn execute(&self) -> ToolExecutionFuture {
///         let args = self.args.clone();
///         Box::pin(async move { Ok(args) })
///     }
/// }
/// ```
pub trait Tool: Send + Sync + Debug {
    /// Returns the tool's definition. Does not depend on instance state.
    fn describe(&self) -> ToolDefinition;

    /// Checks the call's arguments. Always runs before `execute`.
    ///
    /// The default implementation accepts any arguments.
    ///
    /// # Errors
    ///
    /// Returns a validation (or compilation) error describing what is wrong.
    fn validate(&self) -> Result<(), ToolCallError> {
        Ok(())
    }

    /// Runs the tool and produces its payload.
    fn execute(&self) -> ToolExecutionFuture;
}

/// A tool type that can be registered by name.
pub trait ToolSpec: Tool + Sized + 'static {
    /// Registry name.
    const NAME: &'static str;

    /// The definition shown to callers.
    fn definition() -> ToolDefinition;

    /// Builds an instance for one call.
    fn from_context(ctx: ToolContext) -> Self;
}
