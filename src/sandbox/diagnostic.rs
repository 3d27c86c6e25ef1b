//! Compiler diagnostics.

use serde::Serialize;
use std::fmt;

/// A location in guest source. Lines and columns start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    /// Line number
    pub line: u32,
    /// Column number, counted in bytes
    pub column: u32,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// How serious a diagnostic is. Both severities fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The code is wrong
    Error,
    /// The code is suspicious
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// One problem found while compiling a guest module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Line of the offending token
    pub line: u32,
    /// Column of the offending token
    pub column: u32,
    /// Error or warning
    pub severity: Severity,
    /// What is wrong
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    #[must_use]
    pub fn new(line: u32, column: u32, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            severity,
            message: message.into(),
        }
    }

    /// Creates an error at `pos`.
    #[must_use]
    pub fn error(pos: Position, message: impl Into<String>) -> Self {
        Self::new(pos.line, pos.column, Severity::Error, message)
    }

    /// Creates a warning at `pos`.
    #[must_use]
    pub fn warning(pos: Position, message: impl Into<String>) -> Self {
        Self::new(pos.line, pos.column, Severity::Warning, message)
    }

    /// Returns the diagnostic's position.
    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}: {}",
            self.line, self.column, self.severity, self.message
        )
    }
}
