//! Run a caller-supplied WebAssembly text module in the sandbox.

use crate::error::ToolCallError;
use crate::sandbox::SandboxExecutor;
use crate::tools::{Tool, ToolContext, ToolDefinition, ToolExecutionFuture, ToolSpec};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Longest module source accepted.
const MAX_CODE_BYTES: usize = 256 * 1024;

/// Runs a guest module and returns `{"output": <result>}`.
#[derive(Debug, Clone)]
pub struct RunCodeTool {
    args: Value,
    sandbox: Arc<SandboxExecutor>,
}

/// Arguments for the run_code tool.
#[derive(Debug, Deserialize)]
struct RunCodeArgs {
    /// WebAssembly text source
    code: String,
}

impl RunCodeTool {
    fn parse_args(&self) -> Result<RunCodeArgs, ToolCallError> {
        let args: RunCodeArgs = serde_json::from_value(self.args.clone())
            .map_err(|e| ToolCallError::validation(Self::NAME, format!("invalid arguments: {e}")))?;

        if args.code.trim().is_empty() {
            return Err(ToolCallError::validation(Self::NAME, "code cannot be empty"));
        }
        if args.code.len() > MAX_CODE_BYTES {
            return Err(ToolCallError::validation(
                Self::NAME,
                format!("code is too long (max {MAX_CODE_BYTES} bytes)"),
            ));
        }

        Ok(args)
    }
}

impl ToolSpec for RunCodeTool {
    const NAME: &'static str = "run_code";

    fn definition() -> ToolDefinition {
        ToolDefinition::new(
            Self::NAME,
            "Run a WebAssembly text module in an isolated sandbox. The module exports `memory` and `run: [] -> [i32 i32]`; the JSON at the returned (ptr, len) becomes `output`. Importable host modules: console, math, timers.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "WebAssembly text, e.g. `(module (memory (export \"memory\") 1) (data (i32.const 0) \"42\") (func (export \"run\") (result i32 i32) i32.const 0 i32.const 2))`"
                    }
                },
                "required": ["code"]
            }),
        )
    }

    fn from_context(ctx: ToolContext) -> Self {
        Self {
            args: ctx.args,
            sandbox: ctx.services.sandbox,
        }
    }
}

impl Tool for RunCodeTool {
    fn describe(&self) -> ToolDefinition {
        Self::definition()
    }

    fn validate(&self) -> Result<(), ToolCallError> {
        let args = self.parse_args()?;
        self.sandbox.validate(&args.code)
    }

    fn execute(&self) -> ToolExecutionFuture {
        let parsed = self.parse_args();
        let sandbox = self.sandbox.clone();
        Box::pin(async move {
            let args = parsed?;
            let output = sandbox.execute(&args.code).await?;
            Ok(json!({ "output": output }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::module_returning;
    use crate::tools::ToolServices;

    fn tool(args: Value) -> RunCodeTool {
        RunCodeTool::from_context(ToolContext::new(
            "thread",
            "call",
            args,
            ToolServices::in_memory(),
        ))
    }

    #[tokio::test]
    async fn hello_world() {
        let tool = tool(json!({"code": module_returning(r#"{"message":"Hello World"}"#)}));
        assert!(tool.validate().is_ok());
        let result = tool.execute().await.unwrap();
        assert_eq!(result, json!({"output": {"message": "Hello World"}}));
    }

    #[test]
    fn missing_code_is_validation_error() {
        let err = tool(json!({})).validate().unwrap_err();
        assert!(err.is_validation());
        let err = tool(json!({"code": "  "})).validate().unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn invalid_code_is_compilation_error() {
        let err = tool(json!({"code": "(module (func (export \"run\") (result i32 i32)))"}))
            .validate()
            .unwrap_err();
        assert_eq!(err.error_type(), "CompilationError");
        assert!(!err.diagnostics().unwrap().is_empty());
    }

    #[tokio::test]
    async fn runtime_failure_is_execution_error() {
        let code = r#"(module
            (memory (export "memory") 1)
            (func (export "run") (result i32 i32)
              (i32.div_u (i32.const 1) (i32.const 0))
              i32.const 0))"#;
        let result = tool(json!({"code": code}))
            .execute()
            .await;
        assert_eq!(result.unwrap_err().error_type(), "ExecutionError");
    }

    #[test]
    fn definition_requires_code() {
        let definition = RunCodeTool::definition();
        assert_eq!(definition.name, "run_code");
        assert_eq!(definition.input_schema["required"], json!(["code"]));
    }
}
