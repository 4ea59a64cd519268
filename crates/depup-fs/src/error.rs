//! Error types for filesystem, process, and configuration primitives.
//!
//! **What**: Defines the typed errors returned by [`crate::filesystem`],
//! [`crate::command`], and [`crate::config`].
//!
//! **How**: One `thiserror` enum per domain, following the same shape as the
//! rest of this workspace's error modules (see `depup-core::error`).
//!
//! **Why**: Typed, per-domain errors let callers branch on failure kind
//! (e.g. "not found" vs "permission denied") without string matching.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for filesystem operations.
pub type FsResult<T> = Result<T, FileSystemError>;

/// Errors that can occur during filesystem operations.
#[derive(Error, Debug, Clone)]
pub enum FileSystemError {
    /// Path not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied for accessing the path.
    #[error("permission denied for path: {path}")]
    PermissionDenied {
        /// The path for which permission was denied.
        path: PathBuf,
    },

    /// Generic I/O error during a filesystem operation.
    #[error("I/O error accessing '{path}': {message}")]
    Io {
        /// The path where the I/O error occurred.
        path: PathBuf,
        /// The underlying I/O error message.
        message: String,
    },

    /// An atomic write could not complete and the temp file could not be
    /// cleaned up either; both failures are reported together.
    #[error("atomic write to '{path}' failed: {reason} (temp file cleanup: {cleanup})")]
    AtomicWriteFailed {
        /// Destination path of the write.
        path: PathBuf,
        /// Description of the write failure.
        reason: String,
        /// Outcome of the best-effort temp-file cleanup.
        cleanup: String,
    },
}

impl FileSystemError {
    /// Builds a [`FileSystemError`] from an [`io::Error`] and the path it occurred on.
    #[must_use]
    pub fn from_io(error: &io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, message: error.to_string() },
        }
    }
}

/// Result alias for subprocess operations.
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur while running a subprocess.
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    /// The command could not be spawned at all (missing binary, bad cwd, ...).
    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed {
        /// The command line that failed to spawn.
        command: String,
        /// Description of the spawn failure.
        reason: String,
    },

    /// The command ran but exited with a non-zero status.
    #[error("command '{command}' exited with status {status}: {stderr}")]
    NonZeroExit {
        /// The command line that was run.
        command: String,
        /// The process exit status (or -1 if terminated by signal).
        status: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The command exceeded its configured timeout and was killed.
    #[error("command '{command}' timed out after {timeout_secs}s")]
    TimedOut {
        /// The command line that timed out.
        command: String,
        /// The timeout that was exceeded, in seconds.
        timeout_secs: u64,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while validating or merging configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A configuration value failed validation.
    #[error("{message}")]
    ValidationError {
        /// Human-readable description of the validation failure.
        message: String,
    },
}
