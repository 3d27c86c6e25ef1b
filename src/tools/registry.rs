//! Tool registry.
//!
//! Maps tool names to factories that build a fresh [`Tool`] instance per
//! call. Tools are registered at start-up; the registry is then shared
//! read-only behind an `Arc`.

use crate::error::ToolCallError;
use crate::tools::context::ToolContext;
use crate::tools::definition::{Tool, ToolDefinition, ToolSpec};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Largest edit distance at which an unknown name gets a suggestion.
const SUGGESTION_DISTANCE: usize = 3;

/// Builds a tool instance for one call.
pub type ToolFactory = Arc<dyn Fn(ToolContext) -> Box<dyn Tool> + Send + Sync>;

/// A registered tool entry.
#[derive(Clone)]
pub struct RegisteredTool {
    /// The tool definition
    pub definition: ToolDefinition,
    /// Builds instances
    pub factory: ToolFactory,
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Registered tools, by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its definition's name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty or already taken.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        factory: impl Fn(ToolContext) -> Box<dyn Tool> + Send + Sync + 'static,
    ) -> Result<(), ToolCallError> {
        let name = definition.name.clone();
        if name.is_empty() {
            return Err(ToolCallError::configuration("tools", "tool name cannot be empty"));
        }
        if self.tools.contains_key(&name) {
            return Err(ToolCallError::configuration(
                "tools",
                format!("tool '{name}' is already registered"),
            ));
        }

        self.tools.insert(
            name.clone(),
            RegisteredTool {
                definition,
                factory: Arc::new(factory),
            },
        );
        tracing::debug!(tool_name = %name, "tool registered");
        Ok(())
    }

    /// Registers a [`ToolSpec`] type.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is already taken.
    pub fn register_spec<T: ToolSpec>(&mut self) -> Result<(), ToolCallError> {
        self.register(T::definition(), |ctx| Box::new(T::from_context(ctx)))
    }

    /// Returns the entry for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Builds a tool instance for one call.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if no tool is registered under `name`. The error
    /// suggests the closest registered name when one is near.
    pub fn create(&self, name: &str, ctx: ToolContext) -> Result<Box<dyn Tool>, ToolCallError> {
        match self.tools.get(name) {
            Some(registered) => Ok((registered.factory)(ctx)),
            None => Err(ToolCallError::lookup(name, self.suggest(name))),
        }
    }

    /// Closest registered name within a small edit distance.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<String> {
        self.tools
            .keys()
            .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
            .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate.clone())
    }

    /// Definitions of every registered tool, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Checks if a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubBehavior, StubTool};
    use crate::tools::ToolServices;
    use serde_json::json;

    fn registry_with(names: &[&str]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            let owned = (*name).to_string();
            registry
                .register(StubTool::definition(name), move |ctx| {
                    Box::new(StubTool::new(owned.clone(), ctx, StubBehavior::succeeding()))
                })
                .unwrap();
        }
        registry
    }

    fn ctx() -> ToolContext {
        ToolContext::new("thread", "call", json!({}), ToolServices::in_memory())
    }

    #[test]
    fn register_and_create() {
        let registry = registry_with(&["sizeTool"]);
        assert!(registry.contains("sizeTool"));
        assert_eq!(registry.len(), 1);
        let tool = registry.create("sizeTool", ctx()).unwrap();
        assert_eq!(tool.describe().name, "sizeTool");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry_with(&["sizeTool"]);
        let err = registry
            .register(StubTool::definition("sizeTool"), |ctx| {
                Box::new(StubTool::new("sizeTool", ctx, StubBehavior::succeeding()))
            })
            .unwrap_err();
        assert_eq!(err.error_type(), "ConfigurationError");
    }

    #[test]
    fn unknown_name_is_lookup_error_with_suggestion() {
        let registry = registry_with(&["sizeTool", "run_code"]);
        let err = registry.create("sizeTol", ctx()).unwrap_err();
        assert!(err.is_lookup());
        assert!(err.to_string().contains("did you mean 'sizeTool'"));

        let err = registry.create("completely_different", ctx()).unwrap_err();
        assert!(err.is_lookup());
        assert!(!err.to_string().contains("did you mean"));
    }

    #[test]
    fn definitions_are_sorted() {
        let registry = registry_with(&["b_tool", "a_tool"]);
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a_tool", "b_tool"]);
    }

    #[test]
    fn empty_registry() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
    }
}
