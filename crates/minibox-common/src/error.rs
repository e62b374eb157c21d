//! Unified error types for the minibox workspace.
//!
//! Every library crate returns [`Result`]. Teardown paths use
//! [`MiniboxError::is_not_found`] to treat an already-absent resource as
//! success, while lookup paths surface it to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MiniboxError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or argument is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A hash validation failed.
    #[error("hash mismatch for {resource}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected hash value.
        expected: String,
        /// Actual computed hash value.
        actual: String,
    },

    /// A privileged system call was refused or failed.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("`{program} {}` failed: {stderr}", .args.join(" "))]
    Command {
        /// Program that was invoked.
        program: String,
        /// Arguments passed to the program.
        args: Vec<String>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl MiniboxError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` when the error means the target no longer exists.
    ///
    /// Covers missing files, `NotFound` lookups, and `ip` reporting an
    /// unknown device.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::NotFound { .. } => true,
            Self::Command { stderr, .. } => {
                stderr.contains("Cannot find device") || stderr.contains("does not exist")
            }
            _ => false,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MiniboxError>;
