//! Planning and execution engine for multi-ecosystem dependency updates.
//!
//! # What
//!
//! This crate decides, for a set of packages read from one or more manifests,
//! which ones can be updated, to what version, and in what batches — and then
//! carries that plan out, validating and rolling back as needed. It has no
//! opinion on *how* a manifest is parsed or a lock file regenerated; those are
//! host-supplied capabilities (see [`capabilities`]).
//!
//! - [`version`]: constraint classification, candidate filtering, and target
//!   selection (C1).
//! - [`config`]: per-package effective configuration, overlaying per-package
//!   overrides onto a rule's base settings (C2).
//! - [`grouping`]: the group key and total sort order that let the executor
//!   batch adjacent packages sharing one lock file (C3).
//! - [`planner`]: classifies every package into a [`types::PlannedUpdate`]
//!   without mutating anything (C4).
//! - [`drift`]: reload-and-compare checks run before and after mutation (C6).
//! - [`executor`]: applies plans group by group, validates, runs system
//!   tests, and rolls back on failure (C7).
//! - [`result`]: status predicates and error collection shared by planning
//!   and execution (C8).
//! - [`types`]: the shared data model — `Package`, `UpdateCfg`, `UpdateResult`,
//!   `PlannedUpdate`, `Status`, `UpdateContext`.
//! - [`error`]: the single [`error::UpdateError`] enum every fallible
//!   operation in this crate returns.
//! - [`capabilities`]: the host-supplied trait seams (`VersionLister`,
//!   `ManifestUpdater`, `PackageReloader`, `SystemTestRunner`,
//!   `ProgressReporter`) plus the `UnsupportedTracker` accumulator.
//! - [`cancel`]: a cooperative cancellation token checked between packages.
//!
//! # How
//!
//! Planning and execution are two passes over the same [`types::PlannedUpdate`]
//! list: the planner only reads (via [`capabilities::VersionLister`]) and
//! never mutates; the executor is the only code in this crate that calls
//! [`capabilities::ManifestUpdater`] or runs a subprocess. This split mirrors
//! the teacher's own detect/plan-then-apply staging in its upgrade pipeline
//! (`crates/pkg/src/upgrade/manager.rs`): discovery is read-only, application
//! is the only phase with side effects, and both share one state type.
//!
//! # Why
//!
//! Keeping ecosystem-specific behavior entirely behind capability traits
//! (rather than, say, a `PackageManager` enum with match arms sprinkled
//! through planning and execution) is what lets this crate stay a pure
//! policy engine: npm, go, and composer differ only in which trait
//! implementations a host wires up, never in how planning or execution reason
//! about a package.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::panic)]

pub mod cancel;
pub mod capabilities;
pub mod config;
pub mod drift;
pub mod error;
pub mod executor;
pub mod grouping;
pub mod planner;
pub mod result;
pub mod types;
pub mod version;

pub use cancel::CancelToken;
pub use capabilities::{
    ManifestUpdater, PackageReloader, ProgressReporter, SystemTestCaseResult, SystemTestOutcome,
    SystemTestRunner, UnsupportedTracker, VersionLister,
};
pub use config::{resolve_update_cfg, GlobalConfig, RuleConfig, UpdateCfgOverride};
pub use drift::{snapshot_baseline, validate_pre_update_state, validate_updated_package, verify_rollback_drift};
pub use error::{join_optional, UpdateError, UpdateResult as EngineResult};
pub use executor::{execute_plans, execute_plans_with_progress, ExecutionSummary};
pub use grouping::{normalize_update_group, sort_resolved_plans, update_group_key};
pub use planner::{build_grouped_plans, PlannerOptions};
pub use result::{collect_update_errors, is_non_updatable_status, should_skip_update, should_track_unsupported};
pub use types::{
    Constraint, ExecutionMode, InstallStatus, Package, PackageKey, PlannedUpdate, RawVersion, Status,
    SystemTestMode, UpdateCfg, UpdateContext, UpdateResult,
};
pub use version::{
    default_versioning, filter_versions_by_constraint, is_exact_constraint, is_floating_constraint,
    is_fully_pinned_version, select_target_version, summarize_available_versions, versions_match,
    SemverVersioning, UpdateScope, Versioning, VersionSummary,
};
