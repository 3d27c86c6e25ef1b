//! Configuration management for acton-toolcall.
//!
//! # Configuration File Format
//!
//! Configuration is stored in TOML format. The search order is:
//! 1. `./acton-toolcall.toml` (project-local)
//! 2. `~/.config/acton-toolcall/config.toml` (XDG config)
//!
//! Every section and key is optional.
//!
//! ```toml
//! [scheduler]
//! default_delay_ms = 1
//!
//! [dependencies]
//! poll_interval_ms = 1000
//!
//! [sandbox]
//! timeout_secs = 30
//! allowed_modules = ["math", "json", "timers"]
//!
//! [persistence]
//! backend = "memory"
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use acton_toolcall::config;
//!
//! let config = config::load()?;
//! config.validate()?;
//! let (tasks, blobs) = config.persistence.open().await?;
//! ```

mod file;
mod types;

pub use file::{from_path, from_str, load, search_paths, xdg_config_dir};

pub use types::{
    DependencyFileConfig, PersistenceFileConfig, RetryFileConfig, SandboxFileConfig,
    SchedulerFileConfig, StorageBackend, ToolCallConfig,
};
