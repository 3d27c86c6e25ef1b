//! Sandbox configuration types.

use crate::error::ToolCallError;
use crate::sandbox::host::BUILTIN_MODULES;
use std::collections::BTreeSet;
use std::time::Duration;

/// Default execution timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default prefix for guest console output.
pub const DEFAULT_CONSOLE_PREFIX: &str = "[sandbox]";

/// Default linear memory limit (64 MiB).
pub const DEFAULT_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

/// Configuration for guest execution.
///
/// # Example
///
/// ```rust,ignore
/// use acton_toolcall::sandbox::SandboxConfig;
/// use std::time::Duration;
///
/// let config = SandboxConfig::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_allowed_modules(["math"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Wall-clock limit for one execution.
    ///
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Host modules a guest may import from. `console` is always linked.
    ///
    /// Default: every built-in module
    pub allowed_modules: BTreeSet<String>,

    /// Prefix written before every console line.
    pub console_prefix: String,

    /// Largest linear memory a guest may grow to, in bytes.
    ///
    /// Default: 64 MiB
    pub memory_limit: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            allowed_modules: BUILTIN_MODULES.iter().map(|m| (*m).to_string()).collect(),
            console_prefix: DEFAULT_CONSOLE_PREFIX.to_string(),
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl SandboxConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the execution timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the module allow-list.
    #[must_use]
    pub fn with_allowed_modules(
        mut self,
        modules: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.allowed_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the console prefix.
    #[must_use]
    pub fn with_console_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.console_prefix = prefix.into();
        self
    }

    /// Sets the linear memory limit.
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the timeout or memory limit is zero,
    /// or if the allow-list names a module that does not exist.
    pub fn validate(&self) -> Result<(), ToolCallError> {
        if self.timeout.is_zero() {
            return Err(ToolCallError::configuration(
                "sandbox.timeout",
                "must be greater than zero",
            ));
        }

        if self.memory_limit == 0 {
            return Err(ToolCallError::configuration(
                "sandbox.memory_limit",
                "must be greater than zero",
            ));
        }

        if let Some(unknown) = self
            .allowed_modules
            .iter()
            .find(|m| !BUILTIN_MODULES.contains(&m.as_str()))
        {
            return Err(ToolCallError::configuration(
                "sandbox.allowed_modules",
                format!(
                    "unknown module '{unknown}', expected one of: {}",
                    BUILTIN_MODULES.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let config = SandboxConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.allowed_modules.len(), BUILTIN_MODULES.len());
        assert_eq!(config.console_prefix, "[sandbox]");
        assert_eq!(config.memory_limit, DEFAULT_MEMORY_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder() {
        let config = SandboxConfig::new()
            .with_timeout(Duration::from_secs(2))
            .with_allowed_modules(["math"])
            .with_console_prefix("[job]")
            .with_memory_limit(1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert!(config.allowed_modules.contains("math"));
        assert_eq!(config.allowed_modules.len(), 1);
        assert_eq!(config.console_prefix, "[job]");
        assert_eq!(config.memory_limit, 1024 * 1024);
    }

    #[test]
    fn config_validate_zero_timeout() {
        let err = SandboxConfig::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert_eq!(err.error_type(), "ConfigurationError");
        assert!(err.to_string().contains("sandbox.timeout"));
    }

    #[test]
    fn config_validate_zero_memory() {
        let err = SandboxConfig::new()
            .with_memory_limit(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("sandbox.memory_limit"));
    }

    #[test]
    fn config_validate_unknown_module() {
        let err = SandboxConfig::new()
            .with_allowed_modules(["wasi_snapshot_preview1"])
            .validate()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("unknown module 'wasi_snapshot_preview1'"));
    }
}
