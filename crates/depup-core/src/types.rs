//! Core data model: packages, configuration, plans, and results.
//!
//! **What**: Every type spec §3 names — `Package`, `UpdateCfg`, `UpdateResult`,
//! `PlannedUpdate`, the `Status` taxonomy, and `UpdateContext` — plus the
//! newtypes this workspace adds to keep those types from leaning on bare
//! strings where a typo would otherwise compile (`PackageKey`, `RawVersion`,
//! `Constraint`).
//!
//! **How**: Newtypes with `Display`/`FromStr` wherever the teacher does the
//! same for its own domain enums (`VersionRange`, `UpgradeStatus`).
//!
//! **Why**: see each type's doc comment.

use crate::capabilities::{ManifestUpdater, PackageReloader, SystemTestOutcome, SystemTestRunner, UnsupportedTracker};
use crate::error::UpdateError;
use crate::version::Versioning;
use depup_fs::CommandRunner;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// When the executor should run the host's configured system tests.
///
/// Mirrors `system_tests.run_mode` from spec §6: `AfterEach` runs tests
/// after every group or per-package update the executor applies;
/// `AfterAll` means the engine never invokes [`SystemTestRunner`] itself —
/// the host runs tests once after the whole run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemTestMode {
    /// Run system tests after each applied group (or package, in `PerPackage` mode).
    #[default]
    AfterEach,
    /// Never run system tests from within the executor.
    AfterAll,
}

/// Sentinel declared/installed-version string meaning "no data available."
pub const VERSION_SENTINEL: &str = "#N/A";

/// A package declared-version string, which may hold a non-numeric sentinel
/// (`#N/A`) rather than a strict semver string — see spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RawVersion(String);

impl RawVersion {
    /// Wraps a raw version string as-is.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The sentinel value used when no installed/declared version is known.
    #[must_use]
    pub fn sentinel() -> Self {
        Self(VERSION_SENTINEL.to_string())
    }

    /// Borrowed string view.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `#N/A` sentinel.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == VERSION_SENTINEL
    }

    /// Whether this is empty (no value at all, distinct from the sentinel).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RawVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RawVersion {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RawVersion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The version constraint operator declared alongside a package's version.
///
/// Grounded in the teacher's `VersionRange` enum (`version/range.rs`):
/// `FromStr`/`Display` render exactly the token spec.md's prose uses, so a
/// round-trip through config/manifest text is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Constraint {
    /// `=` — must match exactly.
    Exact,
    /// `^` — compatible-with (same leading non-zero segment).
    Caret,
    /// `~` — approximately equivalent (same major.minor).
    Tilde,
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// No operator declared.
    #[default]
    None,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Exact => "=",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::Gte => ">=",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Lt => "<",
            Self::None => "",
        };
        f.write_str(token)
    }
}

impl FromStr for Constraint {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "=" => Self::Exact,
            "^" => Self::Caret,
            "~" => Self::Tilde,
            ">=" => Self::Gte,
            ">" => Self::Gt,
            "<=" => Self::Lte,
            "<" => Self::Lt,
            _ => Self::None,
        })
    }
}

/// Whether a package's install record is normal or should be left untouched.
///
/// Kept open rather than a closed two-variant enum: upstream ecosystems
/// report richer install statuses (e.g. npm's "extraneous") that this engine
/// doesn't act on today but should still round-trip rather than discard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InstallStatus {
    /// Ordinary, updatable install.
    #[default]
    Normal,
    /// The host has marked this package as ignored; the planner must not
    /// attempt to resolve or update it.
    Ignored,
    /// Any other status string the host reports, preserved verbatim.
    Other(String),
}

/// Identity key for a package: `Rule | PackageType | Type | Name`.
///
/// Pipe-delimited, fields may be empty. This is the reload-matching
/// identity — a freshly reloaded package list is matched back to a plan by
/// this key, never by object identity or array position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey(String);

impl PackageKey {
    /// Builds a key from its four identity components.
    #[must_use]
    pub fn new(rule: &str, package_type: &str, kind: &str, name: &str) -> Self {
        Self(format!("{rule}|{package_type}|{kind}|{name}"))
    }

    /// Borrowed string view of the pipe-delimited key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single dependency as read from a manifest and lock file, before planning.
#[derive(Debug, Clone)]
pub struct Package {
    /// The configuration rule this package falls under (e.g. a monorepo package name).
    pub rule: String,
    /// The broad package manager/ecosystem (e.g. `"npm"`, `"go"`, `"composer"`).
    pub package_type: String,
    /// The dependency kind within that ecosystem (e.g. `"prod"`, `"dev"`).
    pub kind: String,
    /// The package name as declared in the manifest.
    pub name: String,
    /// The declared version string.
    pub version: RawVersion,
    /// The declared constraint operator.
    pub constraint: Constraint,
    /// Path to the manifest file this package was read from.
    pub source: PathBuf,
    /// The version actually installed, per the lock file. May be empty or
    /// [`RawVersion::sentinel`].
    pub installed_version: RawVersion,
    /// Explicit group override, if the host configured one directly on the package.
    pub group: Option<String>,
    /// Install status; the planner must short-circuit on `Ignored`.
    pub install_status: InstallStatus,
}

impl Package {
    /// Computes this package's [`PackageKey`].
    #[must_use]
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.rule, &self.package_type, &self.kind, &self.name)
    }
}

/// Effective per-package update configuration: what to run, with what
/// environment, in what group, within what timeout.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct UpdateCfg {
    /// Shell command to run after the manifest mutation (the lock command).
    pub commands: String,
    /// Environment variables merged into the subprocess invoking `commands`.
    pub env: HashMap<String, String>,
    /// Explicit group name override, if set.
    pub group: Option<String>,
    /// Timeout, in seconds, applied to both `commands` and system test runs.
    pub timeout_seconds: u64,
    /// Whether this package's rule forces the lock command to run with an
    /// "include transitive peers" flag (e.g. npm's `-W`, composer's
    /// `--with-all-dependencies`) — resolved once at plan time from
    /// `RuleConfig::with_all_dependencies` so the executor's group-lock step
    /// never needs to re-consult the global config (spec §4.7 step 4).
    pub with_all_dependencies: bool,
}

/// The enumerated terminal (or transitional) states a planned or executed
/// update can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Already at the most aggressive version permitted by scope/constraint.
    UpToDate,
    /// A target was selected; execution has not yet run (or is mid-run).
    Planned,
    /// The update was applied and verified.
    Updated,
    /// The update was attempted and failed, or was rolled back.
    Failed,
    /// Config resolution failed with a non-unsupported error.
    ConfigError,
    /// The version summarizer rejected the candidate set.
    SummarizeError,
    /// No `update` configuration exists for this package's rule — unsupported.
    NotConfigured,
    /// The declared version is a floating constraint (`*` or equivalent) — unsupported.
    Floating,
    /// No usable version information could be determined for this package.
    VersionMissing,
    /// The host marked this package's install status as ignored.
    Ignored,
}

impl Status {
    /// All variants, for exhaustive-iteration tests and status-string round-tripping.
    #[must_use]
    pub const fn all() -> [Status; 10] {
        [
            Status::UpToDate,
            Status::Planned,
            Status::Updated,
            Status::Failed,
            Status::ConfigError,
            Status::SummarizeError,
            Status::NotConfigured,
            Status::Floating,
            Status::VersionMissing,
            Status::Ignored,
        ]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UpToDate => "UpToDate",
            Self::Planned => "Planned",
            Self::Updated => "Updated",
            Self::Failed => "Failed",
            Self::ConfigError => "ConfigError",
            Self::SummarizeError => "SummarizeError",
            Self::NotConfigured => "NotConfigured",
            Self::Floating => "Floating",
            Self::VersionMissing => "VersionMissing",
            Self::Ignored => "Ignored",
        };
        f.write_str(s)
    }
}

/// Error returned when a string does not match any known [`Status`] variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UpToDate" => Self::UpToDate,
            "Planned" => Self::Planned,
            "Updated" => Self::Updated,
            "Failed" => Self::Failed,
            "ConfigError" => Self::ConfigError,
            "SummarizeError" => Self::SummarizeError,
            "NotConfigured" => Self::NotConfigured,
            "Floating" => Self::Floating,
            "VersionMissing" => Self::VersionMissing,
            "Ignored" => Self::Ignored,
            other => return Err(UnknownStatus(other.to_string())),
        })
    }
}

/// The outcome of planning (and, later, executing) a single package's update.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    /// The package this result describes.
    pub pkg: Package,
    /// The selected target version; empty means "no-op, nothing to do."
    pub target: String,
    /// Current status.
    pub status: Status,
    /// The error that produced a terminal `Failed`/`ConfigError`/`SummarizeError`
    /// status, if any.
    pub err: Option<UpdateError>,
    /// Candidate versions within the declared constraint (for display).
    pub available: Vec<RawVersion>,
    /// The group this result was batched into.
    pub group: String,
    /// Highest version in the next major line, if any.
    pub major: Option<RawVersion>,
    /// Highest version within the current major line, if any.
    pub minor: Option<RawVersion>,
    /// Highest version within the current minor line, if any.
    pub patch: Option<RawVersion>,
    /// The installed version observed at plan time, before any mutation.
    pub original_installed: RawVersion,
    /// The declared version observed at plan time, before any mutation.
    pub original_version: RawVersion,
    /// Outcome of a post-update system test run, if one was executed for this package.
    pub system_test_result: Option<SystemTestOutcome>,
}

impl UpdateResult {
    /// Builds a terminal, no-lookup-needed result carrying `status` and no target.
    #[must_use]
    pub fn terminal(pkg: Package, status: Status) -> Self {
        let original_installed = pkg.installed_version.clone();
        let original_version = pkg.version.clone();
        Self {
            pkg,
            target: String::new(),
            status,
            err: None,
            available: Vec::new(),
            group: String::new(),
            major: None,
            minor: None,
            patch: None,
            original_installed,
            original_version,
            system_test_result: None,
        }
    }
}

/// A single package's fully-resolved update plan, as produced by the planner
/// and then owned exclusively by the executor.
pub struct PlannedUpdate {
    /// Effective configuration for this package.
    pub cfg: UpdateCfg,
    /// The planning (and, after execution, final) result.
    pub res: UpdateResult,
    /// The declared version before update — the rollback target. May be
    /// adjusted by [`crate::drift::validate_pre_update_state`] if the
    /// filesystem has drifted since planning.
    pub original: RawVersion,
    /// Exact-equality key used to batch this plan with adjacent plans that
    /// share a group.
    pub group_key: String,
    /// Every candidate within the declared constraint, retained so the
    /// executor can re-summarize major/minor/patch after a successful update
    /// without a second `VersionLister` call.
    pub versions_in_constraint: Vec<RawVersion>,
    /// Ecosystem-specific comparison/parsing rules for this package.
    pub versioning: Arc<dyn Versioning>,
    /// Whether scope selection should pick the *next* step rather than the highest.
    pub incremental: bool,
}

impl fmt::Debug for PlannedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedUpdate")
            .field("cfg", &self.cfg)
            .field("res.status", &self.res.status)
            .field("res.target", &self.res.target)
            .field("original", &self.original)
            .field("group_key", &self.group_key)
            .field("incremental", &self.incremental)
            .finish_non_exhaustive()
    }
}

/// Convenience façade over `UpdateContext::dry_run` — `UpdateContext` stays
/// the source of truth; this enum only makes construction sites read better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Plan and report only; no mutation, no subprocess execution.
    DryRun,
    /// Plan and apply.
    Apply,
}

impl ExecutionMode {
    /// Whether this mode corresponds to `dry_run == true`.
    #[must_use]
    pub fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Shared, run-scope mutable state threaded through planning and execution.
///
/// Constructed once per run and discarded once results are collected.
/// Per spec §5, this is not safe for concurrent use — callers must not share
/// one context across parallel tasks.
pub struct UpdateContext {
    /// Base configuration applied to every package absent an override.
    pub cfg: UpdateCfg,
    /// Working directory subprocess invocations run in.
    pub work_dir: PathBuf,
    /// Packages that could not be planned or updated.
    pub unsupported: UnsupportedTracker,
    /// Ordered list of non-unsupported errors accrued during this run.
    pub failures: Vec<UpdateError>,
    /// Suppresses mutation, validation, subprocess execution, and system tests.
    pub dry_run: bool,
    /// In `PerPackage` mode, whether to continue after a non-unsupported error.
    pub continue_on_error: bool,
    /// Skip regenerating lock files entirely.
    pub skip_lock_run: bool,
    /// Skip running system tests after updates.
    pub skip_system_tests: bool,
    /// Whether scope selection should pick the next step rather than the highest.
    pub incremental_mode: bool,
    /// Snapshot of installed versions at run start, keyed by [`PackageKey`].
    pub baseline: HashMap<PackageKey, RawVersion>,
    /// When to run system tests, if a [`SystemTestRunner`] is configured at all.
    pub system_test_mode: SystemTestMode,
    /// Capability used to mutate manifests (and optionally lock files).
    pub updater: Arc<dyn ManifestUpdater>,
    /// Capability used to reload package state for drift checks, if supplied.
    pub reloader: Option<Arc<dyn PackageReloader>>,
    /// Capability used to run system tests after updates, if configured.
    pub system_test_runner: Option<Arc<dyn SystemTestRunner>>,
    /// Capability used to run the group-lock command (e.g. `npm install` for
    /// a whole batch) in `GroupLock` mode. `PerPackage` mode doesn't need
    /// this directly — there, [`ManifestUpdater`] runs the lock command
    /// itself when `skip_lock` is false.
    pub command_runner: Option<Arc<dyn CommandRunner>>,
}

impl UpdateContext {
    /// Builds a minimal context with no reload or system-test capability
    /// wired up (both optional per spec §6).
    #[must_use]
    pub fn new(cfg: UpdateCfg, work_dir: PathBuf, updater: Arc<dyn ManifestUpdater>, mode: ExecutionMode) -> Self {
        Self {
            cfg,
            work_dir,
            unsupported: UnsupportedTracker::new(),
            failures: Vec::new(),
            dry_run: mode.is_dry_run(),
            continue_on_error: false,
            skip_lock_run: false,
            skip_system_tests: false,
            incremental_mode: false,
            baseline: HashMap::new(),
            system_test_mode: SystemTestMode::default(),
            updater,
            reloader: None,
            system_test_runner: None,
            command_runner: None,
        }
    }
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_round_trips_through_display_and_from_str() {
        for token in ["=", "^", "~", ">=", ">", "<=", "<", ""] {
            let parsed: Constraint = token.parse().expect("infallible");
            assert_eq!(parsed.to_string(), token);
        }
    }

    #[test]
    fn status_round_trips_through_display_and_from_str() {
        for status in Status::all() {
            let rendered = status.to_string();
            let parsed: Status = rendered.parse().expect("known status string");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn package_key_is_pipe_delimited_and_allows_empty_fields() {
        let key = PackageKey::new("monorepo-a", "npm", "", "axios");
        assert_eq!(key.as_str(), "monorepo-a|npm||axios");
    }

    #[test]
    fn raw_version_sentinel_is_distinguishable_from_empty() {
        assert!(RawVersion::sentinel().is_sentinel());
        assert!(!RawVersion::new("").is_sentinel());
        assert!(RawVersion::new("").is_empty());
    }
}
