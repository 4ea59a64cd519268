//! Drift checker (C6): verifying on-disk state against expectations by reload.
//!
//! **What**: Implements spec §4.6 — a best-effort pre-update check that
//! adjusts a plan's rollback target if the filesystem has drifted since
//! planning, and a mandatory post-update (and post-rollback) check that
//! confirms a mutation actually landed.
//!
//! **How**: Each function reloads via [`crate::capabilities::PackageReloader`]
//! and matches the result back to the plan by [`crate::types::PackageKey`] —
//! the same reload-then-match-by-identity shape the teacher's
//! `BackupManager::restore_backup` uses for confirming a restore landed
//! (`crates/pkg/src/upgrade/backup/mod.rs`).
//!
//! **Why**: the asymmetry (best-effort before, mandatory after) is
//! deliberate per spec §9: the pre-update check is an optimization (route
//! rollback correctly), the post-update check is correctness (catch
//! lock-file desync).

use crate::capabilities::PackageReloader;
use crate::error::UpdateError;
use crate::types::{PackageKey, PlannedUpdate, RawVersion};
use crate::version::versions_match;
use std::collections::HashMap;

/// Reloads package state and adjusts `plan.original` if the declared version
/// on disk differs from what was recorded at plan time.
///
/// Best-effort: a reload error, or the package simply not being found in the
/// reloaded list, is **non-fatal** — this check only ever improves rollback
/// accuracy, it never blocks the update itself.
pub async fn validate_pre_update_state(
    plan: &mut PlannedUpdate,
    reloader: &dyn PackageReloader,
) {
    let Ok(packages) = reloader.reload().await else {
        return;
    };
    let key = plan.res.pkg.key();
    let Some(found) = packages.iter().find(|p| p.key() == key) else {
        return;
    };
    if !versions_match(found.version.as_str(), plan.original.as_str()) {
        plan.original = found.version.clone();
    }
}

/// Confirms a just-applied update actually landed: the reloaded declared
/// version matches `target`, and (if an installed version is on record and
/// isn't the sentinel) the reloaded installed version matches `target` too
/// — this second check is what catches a lock file that wasn't regenerated.
///
/// Unlike the pre-update check, a reload error here is fatal: it becomes the
/// returned error, since without a fresh reload there's no way to confirm
/// the mutation landed.
///
/// # Errors
///
/// Returns [`UpdateError::ValidationError`] on a mismatch, or whatever error
/// the reload itself produced.
pub async fn validate_updated_package(
    plan: &PlannedUpdate,
    reloader: &dyn PackageReloader,
) -> Result<(), UpdateError> {
    validate_against(plan, reloader, &plan.res.target).await
}

/// Like [`validate_updated_package`], but compares against `plan.original`
/// instead of the (now abandoned) target. Used after every individual
/// rollback attempt to confirm the rollback itself landed.
///
/// # Errors
///
/// Returns [`UpdateError::RollbackError`] on a mismatch or reload failure.
pub async fn verify_rollback_drift(
    plan: &PlannedUpdate,
    reloader: &dyn PackageReloader,
) -> Result<(), UpdateError> {
    validate_against(plan, reloader, plan.original.as_str()).await.map_err(|err| match err {
        UpdateError::ValidationError { package, expected, actual } => {
            UpdateError::RollbackError { package, reason: format!("drift after rollback: expected '{expected}', found '{actual}'") }
        }
        other => other,
    })
}

async fn validate_against(
    plan: &PlannedUpdate,
    reloader: &dyn PackageReloader,
    expected: &str,
) -> Result<(), UpdateError> {
    let packages = reloader.reload().await.map_err(|err| match err {
        UpdateError::ApplyFailed { reason, .. } | UpdateError::ConfigError { reason } => {
            UpdateError::ValidationError { package: plan.res.pkg.name.clone(), expected: expected.to_string(), actual: format!("reload failed: {reason}") }
        }
        other => other,
    })?;

    let key = plan.res.pkg.key();
    let Some(found) = packages.iter().find(|p| p.key() == key) else {
        return Err(UpdateError::ValidationError {
            package: plan.res.pkg.name.clone(),
            expected: expected.to_string(),
            actual: "package not found on reload".to_string(),
        });
    };

    if !versions_match(found.version.as_str(), expected) {
        return Err(UpdateError::ValidationError {
            package: plan.res.pkg.name.clone(),
            expected: expected.to_string(),
            actual: found.version.to_string(),
        });
    }

    if !found.installed_version.is_empty() && !found.installed_version.is_sentinel() {
        if !versions_match(found.installed_version.as_str(), expected) {
            return Err(UpdateError::ValidationError {
                package: plan.res.pkg.name.clone(),
                expected: expected.to_string(),
                actual: found.installed_version.to_string(),
            });
        }
    }

    Ok(())
}

/// Snapshots installed versions for every reloaded package, keyed by
/// [`PackageKey`] — used to seed `UpdateContext::baseline` at run start.
#[must_use]
pub fn snapshot_baseline(packages: &[crate::types::Package]) -> HashMap<PackageKey, RawVersion> {
    packages.iter().map(|p| (p.key(), p.installed_version.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::PackageReloader;
    use crate::types::{Constraint, InstallStatus, Package, Status, UpdateCfg, UpdateResult};
    use crate::version::default_versioning;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FakeReloader(Mutex<Vec<Package>>);

    #[async_trait]
    impl PackageReloader for FakeReloader {
        async fn reload(&self) -> Result<Vec<Package>, UpdateError> {
            Ok(self.0.lock().expect("lock").clone())
        }
    }

    fn package(name: &str, version: &str, installed: &str) -> Package {
        Package {
            rule: "rule-a".to_string(),
            package_type: "npm".to_string(),
            kind: "prod".to_string(),
            name: name.to_string(),
            version: RawVersion::new(version),
            constraint: Constraint::Gte,
            source: PathBuf::from("package.json"),
            installed_version: RawVersion::new(installed),
            group: None,
            install_status: InstallStatus::Normal,
        }
    }

    fn plan_for(pkg: Package, original: &str, target: &str) -> PlannedUpdate {
        let mut res = UpdateResult::terminal(pkg, Status::Planned);
        res.target = target.to_string();
        PlannedUpdate {
            cfg: UpdateCfg::default(),
            res,
            original: RawVersion::new(original),
            group_key: "rule:rule-a|type:npm".to_string(),
            versions_in_constraint: Vec::new(),
            versioning: default_versioning(),
            incremental: false,
        }
    }

    #[allow(clippy::unwrap_used)]
    #[tokio::test]
    async fn pre_update_drift_adjusts_original_to_observed_version() {
        let reloader = FakeReloader(Mutex::new(vec![package("axios", "17.0.5", "17.0.5")]));
        let mut plan = plan_for(package("axios", "17.0.0", "17.0.0"), "17.0.0", "18.0.0");

        validate_pre_update_state(&mut plan, &reloader).await;

        assert_eq!(plan.original.as_str(), "17.0.5");
    }

    #[allow(clippy::unwrap_used)]
    #[tokio::test]
    async fn post_update_validation_fails_on_version_mismatch() {
        let reloader = FakeReloader(Mutex::new(vec![package("react", "17.0.0", "17.0.0")]));
        let plan = plan_for(package("react", "17.0.0", "17.0.0"), "17.0.0", "18.0.0");

        let err = validate_updated_package(&plan, &reloader).await.expect_err("mismatch");
        match err {
            UpdateError::ValidationError { expected, actual, .. } => {
                assert_eq!(expected, "18.0.0");
                assert_eq!(actual, "17.0.0");
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[allow(clippy::unwrap_used)]
    #[tokio::test]
    async fn post_update_validation_passes_when_reload_matches_target() {
        let reloader = FakeReloader(Mutex::new(vec![package("react", "18.0.0", "18.0.0")]));
        let plan = plan_for(package("react", "17.0.0", "17.0.0"), "17.0.0", "18.0.0");

        assert!(validate_updated_package(&plan, &reloader).await.is_ok());
    }
}
