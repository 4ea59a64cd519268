//! Capability traits the host application supplies to the planner and executor.
//!
//! **What**: Defines every piece of behavior this crate consumes but does not
//! implement: listing candidate versions, mutating a manifest, reloading
//! package state from disk, and running post-update system tests.
//!
//! **How**: Small `async_trait` traits, one method each, the same shape as
//! the teacher's own capability seams (`AsyncFileSystem`, `Executor`) —
//! first-class behavior handles rather than an inheritance hierarchy, so a
//! test can hand the planner a closure-backed fake instead of a real
//! registry client or subprocess.
//!
//! **Why**: spec §9 calls this out explicitly: "capability functions instead
//! of inheritance." Everything ecosystem-specific (npm vs. go vs. composer)
//! lives on the other side of these traits.

use crate::cancel::CancelToken;
use crate::error::UpdateError;
use crate::types::{Package, PackageKey, RawVersion, UpdateCfg};
use async_trait::async_trait;
use std::path::Path;

/// Lists candidate versions for a single package.
///
/// Implementations may return [`UpdateError::Unsupported`] for ecosystems
/// without catalog access (e.g. a generic manifest with no registry).
#[async_trait]
pub trait VersionLister: Send + Sync {
    /// Lists every version the registry (or equivalent) reports for `pkg`.
    async fn list(
        &self,
        cancel: &CancelToken,
        pkg: &Package,
        cfg: &UpdateCfg,
        work_dir: &Path,
    ) -> Result<Vec<RawVersion>, UpdateError>;
}

/// Mutates a manifest (and, unless `skip_lock`, its lock file) to the target version.
///
/// Implementations must be idempotent for a repeated call with the same
/// `target`, must perform no mutation and no subprocess side effects when
/// `dry_run` is set, and must touch only the manifest (never invoke the lock
/// command) when `skip_lock` is set.
#[async_trait]
pub trait ManifestUpdater: Send + Sync {
    /// Applies `target` as the new declared version for `pkg`.
    async fn update(
        &self,
        pkg: &Package,
        target: &str,
        cfg: &UpdateCfg,
        work_dir: &Path,
        dry_run: bool,
        skip_lock: bool,
    ) -> Result<(), UpdateError>;
}

/// Re-reads manifests and lock files, returning the current package list.
///
/// Must observe whatever [`ManifestUpdater`] last wrote — this is the only
/// way the drift checker can confirm a mutation actually landed on disk.
#[async_trait]
pub trait PackageReloader: Send + Sync {
    /// Reloads every package known to the host.
    async fn reload(&self) -> Result<Vec<Package>, UpdateError>;
}

/// Outcome of running the host's configured system tests after one or more updates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemTestOutcome {
    /// Whether every test passed.
    pub passed: bool,
    /// Whether a failure occurred that should halt further updates.
    pub has_critical_failure: bool,
    /// Whether the host is configured to stop on any critical failure.
    pub stop_on_fail: bool,
    /// Human-readable summary of the run.
    pub summary: String,
    /// Per-test results.
    pub results: Vec<SystemTestCaseResult>,
}

impl SystemTestOutcome {
    /// Number of tests that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Whether this outcome should abort the in-flight group or package.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.has_critical_failure && self.stop_on_fail
    }
}

/// Result of a single named system test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTestCaseResult {
    /// Name of the test, as configured by the host.
    pub name: String,
    /// Whether this individual test passed.
    pub passed: bool,
    /// Captured output or failure reason.
    pub detail: String,
    /// Whether a failure here should stop subsequent tests/updates.
    pub continue_on_fail: bool,
}

/// Runs the host's configured system tests after an update (or a group of updates).
#[async_trait]
pub trait SystemTestRunner: Send + Sync {
    /// Runs the configured tests for the given set of just-applied packages.
    async fn run_after_update(&self, applied: &[PackageKey]) -> SystemTestOutcome;
}

/// Progress sink for the executor's progress-reporting variant (spec §4.7).
///
/// `increment` is called exactly once per plan, whether it was applied,
/// skipped, or failed — callers driving a progress bar never need to
/// reconcile partial updates against a total count computed elsewhere.
pub trait ProgressReporter: Send + Sync {
    /// Signals that one plan has reached a terminal state this run.
    fn increment(&self);
}

/// Run-scope accumulator of packages the engine could not plan or update.
///
/// Unlike the other capabilities this is plain state, not a host-supplied
/// behavior — spec §6 is explicit that this is an accumulator, not a
/// contract the host implements.
#[derive(Debug, Clone, Default)]
pub struct UnsupportedTracker {
    entries: Vec<(PackageKey, String)>,
}

impl UnsupportedTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `key` could not be planned or updated, with a human-readable `reason`.
    pub fn add(&mut self, key: PackageKey, reason: impl Into<String>) {
        self.entries.push((key, reason.into()));
    }

    /// Iterates the recorded `(key, reason)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(PackageKey, String)> {
        self.entries.iter()
    }

    /// Number of tracked packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any package has been tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
