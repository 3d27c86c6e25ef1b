//! Configuration file loading.
//!
//! Loads acton-toolcall configuration from TOML files at XDG-compliant
//! locations.

use crate::config::types::ToolCallConfig;
use crate::error::ToolCallError;
use std::path::{Path, PathBuf};

/// Project-local config file name.
const LOCAL_CONFIG_NAME: &str = "acton-toolcall.toml";

/// Config file name within the XDG config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

/// Application name for XDG directory lookup.
const APP_NAME: &str = "acton-toolcall";

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./acton-toolcall.toml` (project-local)
/// 2. `~/.config/acton-toolcall/config.toml` (XDG config)
///
/// Returns the default configuration if no file is found.
///
/// # Errors
///
/// Returns a configuration error if a file exists but cannot be read or
/// parsed.
pub fn load() -> Result<ToolCallConfig, ToolCallError> {
    for path in search_paths() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading configuration");
            return from_path(&path);
        }
    }
    Ok(ToolCallConfig::default())
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns a configuration error if:
/// - The file cannot be read
/// - The file contains invalid TOML
/// - The TOML doesn't match the expected schema
pub fn from_path(path: &Path) -> Result<ToolCallConfig, ToolCallError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ToolCallError::configuration(
            "config_file",
            format!("failed to read '{}': {e}", path.display()),
        )
    })?;

    toml::from_str(&contents).map_err(|e| {
        ToolCallError::configuration(
            "config_file",
            format!("failed to parse '{}': {e}", path.display()),
        )
    })
}

/// Parses configuration from a TOML string.
///
/// # Errors
///
/// Returns a configuration error if the TOML is invalid or doesn't match the
/// schema.
pub fn from_str(toml_str: &str) -> Result<ToolCallConfig, ToolCallError> {
    toml::from_str(toml_str)
        .map_err(|e| ToolCallError::configuration("config", format!("invalid TOML: {e}")))
}

/// Returns the paths that would be searched for configuration files.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];
    if let Some(dir) = xdg_config_dir() {
        paths.push(dir.join(XDG_CONFIG_NAME));
    }
    paths
}

/// Returns the XDG config directory for acton-toolcall.
///
/// This is `~/.config/acton-toolcall` on most systems.
#[must_use]
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}
