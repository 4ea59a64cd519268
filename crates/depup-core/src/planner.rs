//! Planner (C4): classifies packages and builds the plan list.
//!
//! **What**: Implements spec §4.4's `BuildGroupedPlans` — walks resolved
//! packages and, for each, takes exactly one of five mutually exclusive
//! branches (ignored, config error/unsupported, floating constraint,
//! exact-pinned no-lookup-needed, or resolvable-via-`VersionLister`),
//! producing a [`PlannedUpdate`] per package.
//!
//! **How**: One `async fn` per branch's non-trivial logic, composed by
//! `plan_one`, mirroring the teacher's `check_dependency_upgrade` /
//! `determine_upgrade_status` split (`upgrader/upgrader.rs`): one function
//! decides *which* upgrade path applies, a second computes the actual
//! version-policy result once a path is chosen.
//!
//! **Why**: the planner is the one place this crate calls a host capability
//! (`VersionLister`) from a hot loop, so every branch that *doesn't* need
//! it short-circuits before paying for I/O — see spec §4.4's ordering.

use crate::cancel::CancelToken;
use crate::capabilities::VersionLister;
use crate::config::{resolve_update_cfg, GlobalConfig};
use crate::error::UpdateError;
use crate::grouping::update_group_key;
use crate::types::{InstallStatus, Package, PlannedUpdate, RawVersion, Status, UpdateCfg, UpdateContext, UpdateResult};
use crate::version::{
    default_versioning, filter_versions_by_constraint, is_exact_constraint, is_floating_constraint,
    is_fully_pinned_version, select_target_version, summarize_available_versions, UpdateScope, Versioning,
};
use std::sync::Arc;

/// Scope and versioning policy applied to every package in one planning pass.
#[derive(Clone)]
pub struct PlannerOptions {
    /// Most aggressive bump permitted (`Major` also permits `Minor`/`Patch`).
    pub scope: UpdateScope,
    /// Ecosystem versioning rules used to parse and compare candidates.
    pub versioning: Arc<dyn Versioning>,
}

impl PlannerOptions {
    /// Convenience constructor using the default `semver`-backed [`Versioning`].
    #[must_use]
    pub fn new(scope: UpdateScope) -> Self {
        Self { scope, versioning: default_versioning() }
    }
}

/// Builds the full (unsorted) plan list for `packages`.
///
/// Checks `cancel` before each package per spec §4.4/§5 and stops cleanly,
/// returning whatever plans were built so far, the moment it's set —
/// cancellation never happens mid-package.
pub async fn build_grouped_plans(
    ctx: &mut UpdateContext,
    global: &GlobalConfig,
    packages: Vec<Package>,
    options: &PlannerOptions,
    version_lister: &dyn VersionLister,
    cancel: &CancelToken,
) -> Vec<PlannedUpdate> {
    let mut plans = Vec::with_capacity(packages.len());

    for pkg in packages {
        if cancel.is_cancelled() {
            break;
        }
        plans.push(plan_one(ctx, global, pkg, options, version_lister, cancel).await);
    }

    plans
}

async fn plan_one(
    ctx: &mut UpdateContext,
    global: &GlobalConfig,
    pkg: Package,
    options: &PlannerOptions,
    version_lister: &dyn VersionLister,
    cancel: &CancelToken,
) -> PlannedUpdate {
    // Branch 1: ignored installs are never touched.
    if matches!(pkg.install_status, InstallStatus::Ignored) {
        return ignored_plan(pkg);
    }

    // Branch 2: config resolution.
    let cfg = match resolve_update_cfg(&pkg, global) {
        Ok(cfg) => cfg,
        Err(err) if err.is_unsupported() => {
            ctx.unsupported.add(pkg.key(), err.reason_text());
            return terminal_plan(pkg, UpdateCfg::default(), Status::NotConfigured, Some(err));
        }
        Err(err) => {
            ctx.failures.push(err.clone());
            return terminal_plan(pkg, UpdateCfg::default(), Status::ConfigError, Some(err));
        }
    };

    // No declared version at all: nothing to resolve or compare against.
    if pkg.version.is_empty() {
        let reason = format!("no declared version on record for '{}'", pkg.name);
        ctx.unsupported.add(pkg.key(), reason.clone());
        return terminal_plan(pkg, cfg, Status::VersionMissing, Some(UpdateError::Unsupported { reason }));
    }

    // Branch 3: floating constraint (e.g. `*`) has no resolvable target.
    if is_floating_constraint(&pkg.version) {
        let reason = format!("floating constraint: '{}' has no resolvable target", pkg.version);
        ctx.unsupported.add(pkg.key(), reason.clone());
        return terminal_plan(pkg, cfg, Status::Floating, Some(UpdateError::Unsupported { reason }));
    }

    // Branch 4: exact constraint on a fully pinned version needs no lookup.
    if is_exact_constraint(pkg.constraint) && is_fully_pinned_version(&pkg.version) {
        return up_to_date_plan(pkg, cfg, options);
    }

    // Branch 5: resolvable — ask the host for candidate versions.
    let versions = match version_lister.list(cancel, &pkg, &cfg, &ctx.work_dir).await {
        Ok(versions) => versions,
        Err(err) if err.is_unsupported() => {
            ctx.unsupported.add(pkg.key(), err.reason_text());
            return terminal_plan(pkg, cfg, Status::NotConfigured, Some(err));
        }
        Err(err) => {
            ctx.failures.push(err.clone());
            return terminal_plan(pkg, cfg, Status::Failed, Some(err));
        }
    };

    build_resolvable_plan(ctx, pkg, cfg, versions, options)
}

fn build_resolvable_plan(
    ctx: &mut UpdateContext,
    pkg: Package,
    cfg: UpdateCfg,
    versions: Vec<RawVersion>,
    options: &PlannerOptions,
) -> PlannedUpdate {
    let versioning = options.versioning.as_ref();
    let incremental = ctx.incremental_mode;

    let versions_in_constraint =
        filter_versions_by_constraint(&pkg.version, pkg.constraint, &versions, None, versioning);

    // Unfiltered-by-scope summary drives the display (head-room) fields and
    // is the one call path whose errors are surfaced, per spec §9.
    let headroom =
        match summarize_available_versions(&pkg.version, &pkg.name, &versions_in_constraint, versioning, incremental)
        {
            Ok(summary) => summary,
            Err(err) => {
                ctx.failures.push(err.clone());
                return terminal_plan(pkg, cfg, Status::SummarizeError, Some(err));
            }
        };

    // Scope-filtered subset drives target selection; errors here are
    // swallowed (spec §9: "ignores errors to avoid blocking display").
    let scoped_candidates =
        filter_versions_by_constraint(&pkg.version, pkg.constraint, &versions, Some(options.scope), versioning);
    let scoped_summary =
        summarize_available_versions(&pkg.version, &pkg.name, &scoped_candidates, versioning, incremental)
            .unwrap_or_default();

    let target = select_target_version(&scoped_summary, options.scope);
    let group_key = update_group_key(&cfg, &pkg);

    let mut res = UpdateResult::terminal(pkg.clone(), Status::Planned);
    res.available = versions_in_constraint.clone();
    res.group = group_key.clone();
    res.major = headroom.major;
    res.minor = headroom.minor;
    res.patch = headroom.patch;

    if target.as_str().is_empty() {
        res.status = Status::UpToDate;
    } else {
        res.target = target.to_string();
    }

    PlannedUpdate {
        cfg,
        res,
        original: pkg.version.clone(),
        group_key,
        versions_in_constraint,
        versioning: options.versioning.clone(),
        incremental,
    }
}

fn up_to_date_plan(pkg: Package, cfg: UpdateCfg, options: &PlannerOptions) -> PlannedUpdate {
    let group_key = update_group_key(&cfg, &pkg);
    let mut res = UpdateResult::terminal(pkg.clone(), Status::UpToDate);
    res.target = res.pkg.version.to_string();
    res.group = group_key.clone();
    PlannedUpdate {
        cfg,
        res,
        original: pkg.version.clone(),
        group_key,
        versions_in_constraint: Vec::new(),
        versioning: options.versioning.clone(),
        incremental: false,
    }
}

fn terminal_plan(pkg: Package, cfg: UpdateCfg, status: Status, err: Option<UpdateError>) -> PlannedUpdate {
    let group_key = update_group_key(&cfg, &pkg);
    let mut res = UpdateResult::terminal(pkg.clone(), status);
    res.err = err;
    res.group = group_key.clone();
    PlannedUpdate {
        cfg,
        res,
        original: pkg.version.clone(),
        group_key,
        versions_in_constraint: Vec::new(),
        versioning: default_versioning(),
        incremental: false,
    }
}

fn ignored_plan(pkg: Package) -> PlannedUpdate {
    let cfg = UpdateCfg::default();
    let group_key = update_group_key(&cfg, &pkg);
    let mut res = UpdateResult::terminal(pkg, Status::Ignored);
    res.major = Some(RawVersion::sentinel());
    res.minor = Some(RawVersion::sentinel());
    res.patch = Some(RawVersion::sentinel());
    res.original_installed = RawVersion::sentinel();
    res.original_version = RawVersion::sentinel();
    res.group = group_key.clone();
    PlannedUpdate {
        cfg,
        res,
        original: RawVersion::sentinel(),
        group_key,
        versions_in_constraint: Vec::new(),
        versioning: default_versioning(),
        incremental: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ManifestUpdater;
    use crate::config::RuleConfig;
    use crate::types::{Constraint, ExecutionMode};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};

    struct FakeUpdater;

    #[async_trait]
    impl ManifestUpdater for FakeUpdater {
        async fn update(
            &self,
            _pkg: &Package,
            _target: &str,
            _cfg: &UpdateCfg,
            _work_dir: &Path,
            _dry_run: bool,
            _skip_lock: bool,
        ) -> Result<(), UpdateError> {
            Ok(())
        }
    }

    struct FakeLister(Vec<&'static str>);

    #[async_trait]
    impl VersionLister for FakeLister {
        async fn list(
            &self,
            _cancel: &CancelToken,
            _pkg: &Package,
            _cfg: &UpdateCfg,
            _work_dir: &Path,
        ) -> Result<Vec<RawVersion>, UpdateError> {
            Ok(self.0.iter().map(|v| RawVersion::new(*v)).collect())
        }
    }

    fn package(name: &str, version: &str, constraint: Constraint) -> Package {
        Package {
            rule: "rule-a".to_string(),
            package_type: "npm".to_string(),
            kind: "prod".to_string(),
            name: name.to_string(),
            version: RawVersion::new(version),
            constraint,
            source: PathBuf::from("package.json"),
            installed_version: RawVersion::new(version),
            group: None,
            install_status: InstallStatus::Normal,
        }
    }

    fn ctx_with_rule() -> (UpdateContext, GlobalConfig) {
        let ctx = UpdateContext::new(
            UpdateCfg::default(),
            PathBuf::from("."),
            Arc::new(FakeUpdater),
            ExecutionMode::Apply,
        );
        let mut global = GlobalConfig::default();
        global.rules.insert(
            "rule-a".to_string(),
            RuleConfig { update: Some(UpdateCfg::default()), ..Default::default() },
        );
        (ctx, global)
    }

    #[allow(clippy::unwrap_used)]
    #[tokio::test]
    async fn ignored_package_short_circuits_with_sentinel_fields() {
        let (mut ctx, global) = ctx_with_rule();
        let mut pkg = package("axios", "1.2.3", Constraint::Gte);
        pkg.install_status = InstallStatus::Ignored;
        let options = PlannerOptions::new(UpdateScope::Major);
        let lister = FakeLister(vec![]);
        let cancel = CancelToken::new();

        let plans = build_grouped_plans(&mut ctx, &global, vec![pkg], &options, &lister, &cancel).await;

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].res.status, Status::Ignored);
        assert!(plans[0].res.major.as_ref().unwrap().is_sentinel());
    }

    #[allow(clippy::unwrap_used)]
    #[tokio::test]
    async fn floating_constraint_is_tracked_unsupported_with_no_lister_call() {
        let (mut ctx, global) = ctx_with_rule();
        let pkg = package("left-pad", "*", Constraint::None);
        let options = PlannerOptions::new(UpdateScope::Major);
        let lister = FakeLister(vec!["1.0.0"]);
        let cancel = CancelToken::new();

        let plans = build_grouped_plans(&mut ctx, &global, vec![pkg], &options, &lister, &cancel).await;

        assert_eq!(plans[0].res.status, Status::Floating);
        assert_eq!(ctx.unsupported.len(), 1);
        let (_, reason) = ctx.unsupported.iter().next().unwrap();
        assert!(reason.contains("floating"));
    }

    #[tokio::test]
    async fn exact_pinned_version_skips_the_lister_entirely() {
        let (mut ctx, global) = ctx_with_rule();
        let pkg = package("axios", "1.2.3", Constraint::Exact);
        let options = PlannerOptions::new(UpdateScope::Major);
        let lister = FakeLister(vec!["9.9.9"]);
        let cancel = CancelToken::new();

        let plans = build_grouped_plans(&mut ctx, &global, vec![pkg], &options, &lister, &cancel).await;

        assert_eq!(plans[0].res.status, Status::UpToDate);
        assert_eq!(plans[0].res.target, "1.2.3");
    }

    #[tokio::test]
    async fn resolvable_package_selects_highest_in_scope_target() {
        let (mut ctx, global) = ctx_with_rule();
        let pkg = package("axios", "1.2.3", Constraint::Gte);
        let options = PlannerOptions::new(UpdateScope::Major);
        let lister = FakeLister(vec!["1.2.4", "1.3.0", "2.0.0"]);
        let cancel = CancelToken::new();

        let plans = build_grouped_plans(&mut ctx, &global, vec![pkg], &options, &lister, &cancel).await;

        assert_eq!(plans[0].res.status, Status::Planned);
        assert_eq!(plans[0].res.target, "2.0.0");
        assert_eq!(plans[0].res.minor, Some(RawVersion::new("1.3.0")));
    }

    #[tokio::test]
    async fn resolvable_package_with_no_candidates_above_current_is_up_to_date() {
        let (mut ctx, global) = ctx_with_rule();
        let pkg = package("axios", "1.2.3", Constraint::Gte);
        let options = PlannerOptions::new(UpdateScope::Major);
        let lister = FakeLister(vec!["1.0.0", "1.2.3"]);
        let cancel = CancelToken::new();

        let plans = build_grouped_plans(&mut ctx, &global, vec![pkg], &options, &lister, &cancel).await;

        assert_eq!(plans[0].res.status, Status::UpToDate);
        assert!(plans[0].res.target.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_package() {
        let (mut ctx, global) = ctx_with_rule();
        let cancel = CancelToken::new();
        cancel.cancel();
        let packages =
            vec![package("axios", "1.2.3", Constraint::Gte), package("react", "17.0.0", Constraint::Gte)];
        let options = PlannerOptions::new(UpdateScope::Major);
        let lister = FakeLister(vec!["2.0.0"]);

        let plans = build_grouped_plans(&mut ctx, &global, packages, &options, &lister, &cancel).await;

        assert!(plans.is_empty());
    }

    #[tokio::test]
    async fn missing_rule_config_is_a_config_error_not_unsupported() {
        let mut ctx = UpdateContext::new(
            UpdateCfg::default(),
            PathBuf::from("."),
            Arc::new(FakeUpdater),
            ExecutionMode::Apply,
        );
        let global = GlobalConfig::default();
        let pkg = package("axios", "1.2.3", Constraint::Gte);
        let options = PlannerOptions::new(UpdateScope::Major);
        let lister = FakeLister(vec![]);
        let cancel = CancelToken::new();

        let plans = build_grouped_plans(&mut ctx, &global, vec![pkg], &options, &lister, &cancel).await;

        assert_eq!(plans[0].res.status, Status::ConfigError);
        assert_eq!(ctx.failures.len(), 1);
        assert!(ctx.unsupported.is_empty());
    }
}
