//! Logging setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a
//! formatter writing to stderr, plus an optional journald layer. `RUST_LOG`
//! takes precedence over the configured level.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Configuration for logging.
///
/// # Example
///
/// ```rust
/// use acton_toolcall::logging::{LogFormat, LogLevel, LoggingConfig};
///
/// let config = LoggingConfig::new()
///     .with_level(LogLevel::Debug)
///     .with_format(LogFormat::Compact);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether logging is installed at all.
    pub enabled: bool,
    /// Level used when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Output layout.
    pub format: LogFormat,
    /// Also send events to the systemd journal.
    pub journald: bool,
}

impl LoggingConfig {
    /// Creates a new LoggingConfig with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled logging configuration.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Sets the log level filter.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the output layout.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables the journald layer.
    #[must_use]
    pub fn with_journald(mut self, enabled: bool) -> Self {
        self.journald = enabled;
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::default(),
            format: LogFormat::default(),
            journald: false,
        }
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level - default.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level - least verbose.
    Error,
}

impl LogLevel {
    /// Converts to tracing_subscriber LevelFilter.
    #[must_use]
    pub fn to_filter(self) -> tracing_subscriber::filter::LevelFilter {
        match self {
            Self::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
            Self::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            Self::Info => tracing_subscriber::filter::LevelFilter::INFO,
            Self::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            Self::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        }
    }
}

/// Layout of formatted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-field default layout
    #[default]
    Full,
    /// Single-line compact layout
    Compact,
}

/// Errors that can occur during logging initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingError {
    /// The specific error that occurred.
    pub kind: LoggingErrorKind,
}

/// Specific logging error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// The journald socket could not be opened.
    JournaldUnavailable {
        /// The reason for failure.
        reason: String,
    },
    /// Subscriber initialization failed.
    SubscriberInitFailed {
        /// The reason for failure.
        reason: String,
    },
}

impl LoggingError {
    /// Creates a new LoggingError with the given kind.
    #[must_use]
    pub fn new(kind: LoggingErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an error for an unreachable journal.
    #[must_use]
    pub fn journald_unavailable(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::JournaldUnavailable {
            reason: reason.into(),
        })
    }

    /// Creates an error for subscriber initialization failure.
    #[must_use]
    pub fn subscriber_init_failed(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::SubscriberInitFailed {
            reason: reason.into(),
        })
    }

    /// Returns true if a global subscriber was already installed.
    #[must_use]
    pub fn is_already_initialized(&self) -> bool {
        matches!(self.kind, LoggingErrorKind::SubscriberInitFailed { .. })
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoggingErrorKind::JournaldUnavailable { reason } => {
                write!(
                    f,
                    "could not connect to journald: {}; disable logging.journald",
                    reason
                )
            }
            LoggingErrorKind::SubscriberInitFailed { reason } => {
                write!(
                    f,
                    "failed to initialize tracing subscriber: {}; \
                     a subscriber may already be set",
                    reason
                )
            }
        }
    }
}

impl std::error::Error for LoggingError {}

/// Builds the level filter: `RUST_LOG` if set and valid, else `level`.
fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.to_filter().into())
        .from_env_lossy()
}

/// Installs the global subscriber.
///
/// Returns `Ok(false)` if logging is disabled in config.
///
/// # Errors
///
/// Returns an error if journald was requested but is unreachable, or if a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    if !config.enabled {
        return Ok(false);
    }

    let journald = if config.journald {
        Some(
            tracing_journald::layer()
                .map_err(|e| LoggingError::journald_unavailable(e.to_string()))?,
        )
    } else {
        None
    };

    let full = (config.format == LogFormat::Full)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let compact = (config.format == LogFormat::Compact).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter(config.level))
        .with(full)
        .with(compact)
        .with(journald)
        .try_init()
        .map_err(|e| LoggingError::subscriber_init_failed(e.to_string()))?;

    Ok(true)
}
