//! Configuration types.
//!
//! File-level types mirror the TOML layout and use plain integers for
//! durations; each converts into the runtime configuration of the component
//! it describes.

use crate::error::ToolCallError;
use crate::logging::LoggingConfig;
use crate::sandbox::{
    SandboxConfig, SandboxExecutor, BUILTIN_MODULES, DEFAULT_CONSOLE_PREFIX, DEFAULT_MEMORY_LIMIT,
};
use crate::tasks::{
    BlobStore, InMemoryBlobStore, InMemoryTaskStore, LibSqlStore, RetryPolicy, SchedulerConfig,
    TaskStore, WaiterConfig,
};
use crate::tools::ToolServices;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Root configuration structure.
///
/// ```toml
/// [scheduler]
/// default_delay_ms = 1
///
/// [scheduler.retry]
/// max_retries = 2
/// backoff_ms = 500
///
/// [dependencies]
/// poll_interval_ms = 1000
/// max_wait_secs = 600
///
/// [sandbox]
/// timeout_secs = 30
/// allowed_modules = ["math"]
/// memory_limit_mib = 16
///
/// [persistence]
/// backend = "libsql"
/// db_path = "/var/lib/acton-toolcall/tasks.db"
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallConfig {
    /// Deferred execution settings
    pub scheduler: SchedulerFileConfig,
    /// Dependency wait settings
    pub dependencies: DependencyFileConfig,
    /// Guest sandbox settings
    pub sandbox: SandboxFileConfig,
    /// Task and blob storage
    pub persistence: PersistenceFileConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl ToolCallConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> Result<(), ToolCallError> {
        if self.dependencies.poll_interval_ms == 0 {
            return Err(ToolCallError::configuration(
                "dependencies.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.persistence.backend == StorageBackend::Libsql
            && self.persistence.resolve_db_path().is_none()
        {
            return Err(ToolCallError::configuration(
                "persistence.db_path",
                "no db_path given and no data directory could be determined",
            ));
        }
        self.sandbox.to_sandbox_config().validate()
    }

    /// Validates and opens everything tools need: stores, sandbox and
    /// dependency waiter settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unusable values, or a store error
    /// if the database cannot be opened.
    pub async fn services(&self) -> Result<ToolServices, ToolCallError> {
        self.validate()?;
        let (tasks, blobs) = self.persistence.open().await?;
        Ok(ToolServices::new(tasks, blobs)
            .with_sandbox(SandboxExecutor::new(self.sandbox.to_sandbox_config()))
            .with_waiter(self.dependencies.to_waiter_config()))
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerFileConfig {
    /// Delay before a scheduled call runs when the caller gives none.
    pub default_delay_ms: u64,
    /// Retry policy for scheduled runs.
    pub retry: RetryFileConfig,
}

impl Default for SchedulerFileConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: 1,
            retry: RetryFileConfig::default(),
        }
    }
}

impl SchedulerFileConfig {
    #[must_use]
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            default_delay: Duration::from_millis(self.default_delay_ms),
            retry: RetryPolicy::fixed(
                self.retry.max_retries,
                Duration::from_millis(self.retry.backoff_ms),
            ),
        }
    }
}

/// `[scheduler.retry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryFileConfig {
    /// Additional attempts for retriable failures. Default 0.
    pub max_retries: u32,
    /// Pause before each retry.
    pub backoff_ms: u64,
}

impl Default for RetryFileConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 500,
        }
    }
}

/// `[dependencies]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyFileConfig {
    /// Time between status polls.
    pub poll_interval_ms: u64,
    /// Give up after this many seconds. Unset waits indefinitely.
    pub max_wait_secs: Option<u64>,
}

impl Default for DependencyFileConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_wait_secs: None,
        }
    }
}

impl DependencyFileConfig {
    #[must_use]
    pub fn to_waiter_config(&self) -> WaiterConfig {
        let config =
            WaiterConfig::default().with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        match self.max_wait_secs {
            Some(secs) => config.with_max_wait(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// `[sandbox]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxFileConfig {
    /// Wall-clock limit per run.
    pub timeout_secs: u64,
    /// Host modules guests may import besides `console`.
    pub allowed_modules: Vec<String>,
    /// Prefix for guest console output.
    pub console_prefix: String,
    /// Linear memory limit per run, in MiB.
    pub memory_limit_mib: usize,
}

impl Default for SandboxFileConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            allowed_modules: BUILTIN_MODULES.iter().map(|m| (*m).to_string()).collect(),
            console_prefix: DEFAULT_CONSOLE_PREFIX.to_string(),
            memory_limit_mib: DEFAULT_MEMORY_LIMIT / MIB,
        }
    }
}

const MIB: usize = 1024 * 1024;

impl SandboxFileConfig {
    #[must_use]
    pub fn to_sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::new()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_allowed_modules(self.allowed_modules.iter().cloned())
            .with_console_prefix(self.console_prefix.clone())
            .with_memory_limit(self.memory_limit_mib.saturating_mul(MIB))
    }
}

/// Which store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local maps; nothing survives a restart
    #[default]
    Memory,
    /// A local libSQL database file
    Libsql,
}

/// `[persistence]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceFileConfig {
    /// Store implementation.
    pub backend: StorageBackend,
    /// Database file for the libsql backend. Defaults to
    /// `$XDG_DATA_HOME/acton-toolcall/tasks.db`.
    pub db_path: Option<PathBuf>,
}

impl PersistenceFileConfig {
    /// The database path the libsql backend would open.
    #[must_use]
    pub fn resolve_db_path(&self) -> Option<PathBuf> {
        self.db_path
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join("acton-toolcall").join("tasks.db")))
    }

    /// Opens the configured stores.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no database path can be determined,
    /// or a store error if the database cannot be opened.
    pub async fn open(&self) -> Result<(Arc<dyn TaskStore>, Arc<dyn BlobStore>), ToolCallError> {
        match self.backend {
            StorageBackend::Memory => {
                let tasks: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
                let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
                Ok((tasks, blobs))
            }
            StorageBackend::Libsql => {
                let path = self.resolve_db_path().ok_or_else(|| {
                    ToolCallError::configuration(
                        "persistence.db_path",
                        "no db_path given and no data directory could be determined",
                    )
                })?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ToolCallError::configuration(
                            "persistence.db_path",
                            format!("cannot create '{}': {e}", parent.display()),
                        )
                    })?;
                }
                let store = Arc::new(LibSqlStore::open(path.to_string_lossy()).await?);
                let tasks: Arc<dyn TaskStore> = store.clone();
                let blobs: Arc<dyn BlobStore> = store;
                Ok((tasks, blobs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let config = ToolCallConfig::default();
        assert_eq!(config.scheduler.to_scheduler_config(), SchedulerConfig::default());
        assert_eq!(config.dependencies.to_waiter_config(), WaiterConfig::default());
        assert_eq!(config.sandbox.to_sandbox_config(), SandboxConfig::default());
        assert_eq!(config.persistence.backend, StorageBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn retry_and_wait_convert() {
        let config = ToolCallConfig {
            scheduler: SchedulerFileConfig {
                default_delay_ms: 250,
                retry: RetryFileConfig {
                    max_retries: 3,
                    backoff_ms: 100,
                },
            },
            dependencies: DependencyFileConfig {
                poll_interval_ms: 50,
                max_wait_secs: Some(9),
            },
            ..ToolCallConfig::default()
        };

        let scheduler = config.scheduler.to_scheduler_config();
        assert_eq!(scheduler.default_delay, Duration::from_millis(250));
        assert_eq!(scheduler.retry, RetryPolicy::fixed(3, Duration::from_millis(100)));

        let waiter = config.dependencies.to_waiter_config();
        assert_eq!(waiter.poll_interval, Duration::from_millis(50));
        assert_eq!(waiter.max_wait, Some(Duration::from_secs(9)));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = ToolCallConfig::default();
        config.dependencies.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dependencies.poll_interval_ms"));
    }

    #[test]
    fn validate_checks_sandbox_section() {
        let mut config = ToolCallConfig::default();
        config.sandbox.allowed_modules = vec!["net".into()];
        assert_eq!(config.validate().unwrap_err().error_type(), "ConfigurationError");
    }

    #[tokio::test]
    async fn services_carry_section_settings() {
        let mut config = ToolCallConfig::default();
        config.sandbox.timeout_secs = 3;
        config.dependencies.poll_interval_ms = 20;
        let services = config.services().await.unwrap();
        assert_eq!(services.sandbox.config().timeout, Duration::from_secs(3));
        assert_eq!(services.waiter.poll_interval, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn opens_libsql_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let persistence = PersistenceFileConfig {
            backend: StorageBackend::Libsql,
            db_path: Some(dir.path().join("nested").join("tasks.db")),
        };
        let (tasks, _blobs) = persistence.open().await.unwrap();
        assert!(tasks.list_thread_tasks("nobody").await.unwrap().is_empty());
        assert!(dir.path().join("nested").join("tasks.db").exists());
    }
}
