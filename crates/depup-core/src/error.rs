//! Error types for the planning-and-execution engine.
//!
//! **What**: Defines [`UpdateError`], the single error enum returned by every
//! capability call, config resolution, drift check, and executor step.
//!
//! **How**: One `thiserror` enum with one variant per failure kind from
//! spec §7, modeled directly on the teacher's `error::upgrade::UpgradeError`
//! (`AsRef<str>` for a short category string, plus predicate methods). The
//! one addition the teacher's error type doesn't need: [`UpdateError::Unsupported`]
//! is a first-class tagged variant rather than a sentinel string, precisely
//! because classifying it must be total, not a string match (design note,
//! spec §9).
//!
//! **Why**: keeping this flat (rather than nesting `FileSystemError`/
//! `CommandError` behind their own sub-enum) matches the teacher's own
//! `UpgradeError`, which folds filesystem failures into its own variant set
//! instead of re-exporting a foreign error type to callers.

use depup_fs::{CommandError, FileSystemError};
use thiserror::Error;

/// Result alias for update-engine operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors produced while planning or executing dependency updates.
#[derive(Debug, Error, Clone)]
pub enum UpdateError {
    /// The package or ecosystem cannot be handled — not a bug, and never
    /// counted as a failure. Maps to status `NotConfigured` or `Floating`
    /// depending on where it originated.
    #[error("unsupported: {reason}")]
    Unsupported {
        /// Human-readable reason, surfaced to the unsupported tracker.
        reason: String,
    },

    /// Global or per-rule configuration is missing or internally inconsistent.
    #[error("configuration error: {reason}")]
    ConfigError {
        /// Description of the configuration problem.
        reason: String,
    },

    /// The version summarizer rejected the candidate set (e.g. no candidate
    /// could be parsed into comparable segments).
    #[error("failed to summarize available versions for '{package}': {reason}")]
    SummarizeError {
        /// Name of the package being summarized.
        package: String,
        /// Description of why summarization failed.
        reason: String,
    },

    /// The `ManifestUpdater` returned a non-unsupported error while applying an update.
    #[error("failed to update '{package}' to '{target}': {reason}")]
    ApplyFailed {
        /// Name of the package being updated.
        package: String,
        /// Target version that was being applied.
        target: String,
        /// Description of the failure.
        reason: String,
    },

    /// A post-update (or post-rollback) drift check found the reloaded state
    /// does not match what was expected.
    #[error("drift detected for '{package}': expected '{expected}', found '{actual}'")]
    ValidationError {
        /// Name of the package being validated.
        package: String,
        /// Version (or installed version) that was expected.
        expected: String,
        /// Version (or installed version) actually observed.
        actual: String,
    },

    /// The group lock command (e.g. `npm install`, `composer update`) failed.
    #[error("lock command failed for group '{group}': {reason}")]
    LockError {
        /// The group whose lock command failed.
        group: String,
        /// Description of the failure, typically captured stderr.
        reason: String,
    },

    /// A rollback attempt failed, or its own drift check failed.
    #[error("rollback failed for '{package}': {reason}")]
    RollbackError {
        /// Name of the package that failed to roll back.
        package: String,
        /// Description of the rollback failure.
        reason: String,
    },

    /// A system test reported a failure after one or more updates were applied.
    #[error("system test failure: {summary}")]
    SystemTestError {
        /// Whether this failure should halt further updates (`has_critical_failure && stop_on_fail`).
        critical: bool,
        /// Summary of the failing test run.
        summary: String,
    },

    /// A filesystem operation (read, write, atomic rename) failed.
    #[error(transparent)]
    Filesystem(#[from] FileSystemError),

    /// A subprocess invocation (lock command, system test) failed or timed out.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Multiple causes joined in encounter order — a group error accumulated
    /// across several applied plans, or a rollback failure layered onto the
    /// original cause that triggered the rollback (spec §7: "Rollback errors
    /// are additionally joined into the group error").
    #[error("{reason}")]
    Joined {
        /// Pre-rendered, order-preserving join of every contributing error's message.
        reason: String,
    },
}

impl UpdateError {
    /// Joins `self` with `other` in encounter order, per the group-error
    /// propagation policy in spec §7. Flattens repeated joins into one
    /// semicolon-separated message rather than nesting [`UpdateError::Joined`].
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        match self {
            Self::Joined { reason } => Self::Joined { reason: format!("{reason}; {other}") },
            first => Self::Joined { reason: format!("{first}; {other}") },
        }
    }

    /// The human-readable reason text for this error, used when recording it
    /// in [`crate::capabilities::UnsupportedTracker`] — for [`Self::Unsupported`]
    /// this is the bare reason, for every other variant it's the rendered message.
    #[must_use]
    pub fn reason_text(&self) -> String {
        match self {
            Self::Unsupported { reason } => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Wraps this error's message with the package identity, matching the
    /// propagation policy in spec §7: `"<name> (<packageType>/<rule>): <inner>"`.
    ///
    /// Only ever called on non-[`UpdateError::Unsupported`] errors — those
    /// are tracked separately and never accrue into `UpdateContext.failures`
    /// (see [`crate::executor::record_update_error`]). Uses [`Self::Joined`]
    /// rather than [`Self::ApplyFailed`] so the rendered message is exactly
    /// the identity-prefixed string the propagation policy calls for, with no
    /// extra "failed to update ... to ''" wrapper text from a variant whose
    /// fields don't actually apply here.
    #[must_use]
    pub fn with_package_identity(self, name: &str, package_type: &str, rule: &str) -> Self {
        Self::Joined { reason: format!("{name} ({package_type}/{rule}): {self}") }
    }

    /// Whether this is the `Unsupported` kind — never counted as a failure
    /// by [`crate::result::collect_update_errors`].
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Whether this failure is plausibly transient and worth a caller-level retry
    /// (a timed-out subprocess or a generic I/O hiccup, as opposed to a
    /// structural misconfiguration or a confirmed version mismatch).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Command(CommandError::TimedOut { .. }) | Self::Filesystem(FileSystemError::Io { .. })
        )
    }
}

impl AsRef<str> for UpdateError {
    fn as_ref(&self) -> &str {
        match self {
            Self::Unsupported { .. } => "unsupported",
            Self::ConfigError { .. } => "config error",
            Self::SummarizeError { .. } => "summarize error",
            Self::ApplyFailed { .. } => "apply failed",
            Self::ValidationError { .. } => "validation error",
            Self::LockError { .. } => "lock error",
            Self::RollbackError { .. } => "rollback error",
            Self::SystemTestError { .. } => "system test error",
            Self::Filesystem(_) => "filesystem error",
            Self::Command(_) => "command error",
            Self::Joined { .. } => "joined error",
        }
    }
}

/// Joins an optional accumulated group error with a newly observed one,
/// per the order-preserving join policy in spec §7.
#[must_use]
pub fn join_optional(existing: Option<UpdateError>, new: UpdateError) -> UpdateError {
    match existing {
        Some(err) => err.join(new),
        None => new,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_preserves_encounter_order_and_flattens() {
        let a = UpdateError::ApplyFailed { package: "react".to_string(), target: "18.0.0".to_string(), reason: "boom".to_string() };
        let b = UpdateError::LockError { group: "npm".to_string(), reason: "exit 1".to_string() };
        let joined = a.join(b);
        match &joined {
            UpdateError::Joined { reason } => {
                assert!(reason.contains("react"));
                assert!(reason.find("react").unwrap() < reason.find("exit 1").unwrap());
            }
            other => panic!("expected Joined, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_is_tagged_not_stringly_typed() {
        let err = UpdateError::Unsupported { reason: "no update block".to_string() };
        assert!(err.is_unsupported());

        let other = UpdateError::ConfigError { reason: "unsupported".to_string() };
        assert!(!other.is_unsupported());
    }

    #[test]
    fn timeout_is_transient() {
        let err = UpdateError::Command(CommandError::TimedOut {
            command: "npm install".to_string(),
            timeout_secs: 30,
        });
        assert!(err.is_transient());
    }
}
