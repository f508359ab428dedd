//! Typed error handling for antimagic.
//!
//! Only conditions that abort a run live here. Literals that cannot be named
//! and name collisions are ordinary outcomes of the resolver and are carried
//! as [`crate::constants::NameStatus`] values instead.

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for antimagic operations.
///
/// Every variant except [`AntimagicError::Parse`] is fatal: the pipeline
/// rolls back the transaction and propagates the error.
#[derive(Error, Debug)]
pub enum AntimagicError {
    /// I/O error when reading/writing files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Source that tree-sitter could not parse cleanly
    #[error("Parse error in {path}: {message}")]
    Parse {
        path: PathBuf,
        message: String,
        /// Line number (1-indexed) if available
        line: Option<usize>,
        /// Column number (1-indexed) if available
        column: Option<usize>,
    },

    /// Invalid configuration, raised before any file is touched
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The naming assistant did not shrink the set of duplicate names
    #[error("Duplicate resolution did not converge for values: {}", format_values(.values))]
    DuplicateResolution { values: BTreeSet<String> },

    /// A constant's usage sites share no common ancestor
    #[error("Placement invariant violated for {value:?}: {message}")]
    Placement { value: String, message: String },

    /// The naming assistant could not be reached or answered garbage
    #[error("Naming assistant unavailable: {message}")]
    Assistant { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_values(values: &BTreeSet<String>) -> String {
    values
        .iter()
        .map(|v| format!("{:?}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

impl AntimagicError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a parse error without location.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a parse error with line/column info.
    pub fn parse_at(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a duplicate-resolution failure carrying the unresolved values.
    pub fn duplicate_resolution(values: impl IntoIterator<Item = String>) -> Self {
        Self::DuplicateResolution {
            values: values.into_iter().collect(),
        }
    }

    /// Create a placement invariant violation.
    pub fn placement(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Placement {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create an assistant error.
    pub fn assistant(message: impl Into<String>) -> Self {
        Self::Assistant {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error (the run can skip the offending file).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for antimagic results.
pub type AntimagicResult<T> = Result<T, AntimagicError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> AntimagicResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> AntimagicResult<T> {
        self.map_err(|e| AntimagicError::io(path, e))
    }
}
