//! Error types for robotscheck.
//!
//! Library crates use [`RobotsCheckError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Undecodable robots.txt artifacts are deliberately absent here: they are a
//! per-row outcome recorded by the annotator, never a run-level error.

use std::path::PathBuf;

/// Top-level error type for all robotscheck operations.
#[derive(Debug, thiserror::Error)]
pub enum RobotsCheckError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A ledger row that cannot be annotated (missing fields, no header, ...).
    #[error("ledger error at line {line}: {message}")]
    Ledger { line: u64, message: String },

    /// Malformed CSV in the input ledger, or a failed write to the output.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The robots.txt matcher rejected its input.
    #[error("matcher error for id {id}: {message}")]
    Matcher { id: String, message: String },

    /// Invalid runtime settings.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A concurrent row evaluation panicked or was aborted.
    #[error("worker task failed: {0}")]
    Task(String),

    /// The run was cancelled before the ledger was exhausted.
    #[error("cancelled after {rows} rows")]
    Cancelled { rows: u64 },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RobotsCheckError>;

impl RobotsCheckError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a ledger error for the given 1-based input line.
    pub fn ledger(line: u64, msg: impl Into<String>) -> Self {
        Self::Ledger {
            line,
            message: msg.into(),
        }
    }

    /// Create a matcher error for the row with the given id.
    pub fn matcher(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Matcher {
            id: id.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
