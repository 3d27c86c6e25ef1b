//! Built-in tools.
//!
//! ## Available Tools
//!
//! - **run_code**: run a WebAssembly text module in the sandbox
//! - **gather_outputs**: wait for scheduled tasks and collect their outputs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use acton_toolcall::tools::{builtins::BuiltinTools, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! BuiltinTools::register_all(&mut registry)?;
//!
//! // Or only some of them
//! BuiltinTools::register_selected(&mut registry, &["run_code"])?;
//! ```

mod gather_outputs;
mod run_code;

pub use gather_outputs::GatherOutputsTool;
pub use run_code::RunCodeTool;

use crate::error::ToolCallError;
use crate::tools::{ToolRegistry, ToolSpec};

/// Entry point for registering the built-in tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTools;

impl BuiltinTools {
    /// Lists all available built-in tool names.
    #[must_use]
    pub fn available() -> Vec<&'static str> {
        vec![RunCodeTool::NAME, GatherOutputsTool::NAME]
    }

    /// Registers every built-in tool.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a built-in name is already taken.
    pub fn register_all(registry: &mut ToolRegistry) -> Result<(), ToolCallError> {
        Self::register_selected(registry, &Self::available())
    }

    /// Registers only the named built-in tools.
    ///
    /// # Errors
    ///
    /// Returns a lookup error for an unknown name, or a configuration error
    /// if a name is already taken.
    pub fn register_selected(registry: &mut ToolRegistry, names: &[&str]) -> Result<(), ToolCallError> {
        for name in names {
            if *name == RunCodeTool::NAME {
                registry.register_spec::<RunCodeTool>()?;
            } else if *name == GatherOutputsTool::NAME {
                registry.register_spec::<GatherOutputsTool>()?;
            } else {
                return Err(ToolCallError::lookup(*name, None));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_all_registers_every_tool() {
        let mut registry = ToolRegistry::new();
        BuiltinTools::register_all(&mut registry).unwrap();
        assert_eq!(registry.len(), BuiltinTools::available().len());
        for name in BuiltinTools::available() {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn register_selected_specific() {
        let mut registry = ToolRegistry::new();
        BuiltinTools::register_selected(&mut registry, &["run_code"]).unwrap();
        assert!(registry.contains("run_code"));
        assert!(!registry.contains("gather_outputs"));
    }

    #[test]
    fn register_selected_unknown_fails() {
        let mut registry = ToolRegistry::new();
        let err = BuiltinTools::register_selected(&mut registry, &["bash"]).unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn definitions_have_descriptions_and_object_schemas() {
        let mut registry = ToolRegistry::new();
        BuiltinTools::register_all(&mut registry).unwrap();
        for definition in registry.definitions() {
            assert!(!definition.description.is_empty(), "{} has no description", definition.name);
            assert_eq!(definition.input_schema["type"], "object");
        }
    }
}
