//! Result model (C8): status predicates and error collection.
//!
//! **What**: Implements spec §4.8 — `CollectUpdateErrors`, `ShouldTrackUnsupported`,
//! `ShouldSkipUpdate`, and `IsNonUpdatableStatus`.
//!
//! **How**: Plain predicate functions over [`UpdateResult`]/[`Status`], kept
//! separate from [`crate::executor`] so the executor's control flow reads as
//! calls to named questions ("should I skip this?") rather than inline enum
//! matches — the same separation the teacher draws between its `upgrader::status`
//! predicates and the orchestration code that consumes them.
//!
//! **Why**: spec §9 is explicit that `ShouldTrackUnsupported` and
//! `IsNonUpdatableStatus` must remain two distinct predicates rather than
//! collapsing into one boolean — they answer different questions (is this
//! worth recording as informational output, vs. should planning/execution
//! skip this package outright) and a future status could answer them
//! differently.

use crate::error::UpdateError;
use crate::types::{Status, UpdateResult};

/// Every non-nil, non-[`UpdateError::Unsupported`] error carried by `results`.
///
/// Unsupported failures are never counted as failures (spec §7) — they're
/// tracked separately via [`crate::capabilities::UnsupportedTracker`].
#[must_use]
pub fn collect_update_errors(results: &[UpdateResult]) -> Vec<UpdateError> {
    results.iter().filter_map(|res| res.err.clone()).filter(|err| !err.is_unsupported()).collect()
}

/// Whether `status` should be recorded in the unsupported tracker as
/// best-effort informational output.
///
/// True for exactly `{NotConfigured, Floating, VersionMissing}` — see spec §8.
#[must_use]
pub fn should_track_unsupported(status: Status) -> bool {
    matches!(status, Status::NotConfigured | Status::Floating | Status::VersionMissing)
}

/// Whether the executor should skip a plan without attempting `UpdaterFunc`
/// at all: its status is already terminal-and-non-updatable, or no target
/// was selected.
#[must_use]
pub fn should_skip_update(res: &UpdateResult) -> bool {
    is_non_updatable_status(res.status) || res.target.is_empty()
}

/// Whether `status` represents a plan the planner did not (or could not)
/// resolve to an actionable target — distinct from [`should_track_unsupported`]:
/// this additionally covers `UpToDate`, `Ignored`, `ConfigError`, and
/// `SummarizeError`, none of which belong in the unsupported tracker.
#[must_use]
pub fn is_non_updatable_status(status: Status) -> bool {
    matches!(
        status,
        Status::UpToDate
            | Status::Ignored
            | Status::NotConfigured
            | Status::Floating
            | Status::VersionMissing
            | Status::ConfigError
            | Status::SummarizeError
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Constraint, InstallStatus, Package, RawVersion};
    use std::path::PathBuf;

    fn package() -> Package {
        Package {
            rule: "rule-a".to_string(),
            package_type: "npm".to_string(),
            kind: "prod".to_string(),
            name: "axios".to_string(),
            version: RawVersion::new("1.0.0"),
            constraint: Constraint::Gte,
            source: PathBuf::from("package.json"),
            installed_version: RawVersion::new("1.0.0"),
            group: None,
            install_status: InstallStatus::Normal,
        }
    }

    #[test]
    fn should_track_unsupported_matches_exactly_three_statuses() {
        for status in Status::all() {
            let expected = matches!(status, Status::NotConfigured | Status::Floating | Status::VersionMissing);
            assert_eq!(should_track_unsupported(status), expected, "status {status}");
        }
    }

    #[test]
    fn collect_update_errors_never_returns_unsupported() {
        let mut unsupported = UpdateResult::terminal(package(), Status::NotConfigured);
        unsupported.err = Some(UpdateError::Unsupported { reason: "no update block".to_string() });

        let mut failed = UpdateResult::terminal(package(), Status::Failed);
        failed.err = Some(UpdateError::ApplyFailed {
            package: "axios".to_string(),
            target: "2.0.0".to_string(),
            reason: "boom".to_string(),
        });

        let errors = collect_update_errors(&[unsupported, failed]);
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].is_unsupported());
    }

    #[test]
    fn should_skip_update_is_true_for_empty_target_even_when_planned() {
        let mut res = UpdateResult::terminal(package(), Status::Planned);
        res.target.clear();
        assert!(should_skip_update(&res));
    }

    #[test]
    fn should_skip_update_is_false_for_planned_with_a_target() {
        let mut res = UpdateResult::terminal(package(), Status::Planned);
        res.target = "2.0.0".to_string();
        assert!(!should_skip_update(&res));
    }
}
