//! Executor (C7): drives planned updates group by group.
//!
//! **What**: Implements spec §4.7 — walks sorted plans as adjacent runs of
//! equal `group_key`, picks `GroupLock` or `PerPackage` strategy per group,
//! applies manifest mutations through [`crate::capabilities::ManifestUpdater`],
//! validates by reload, runs system tests, and rolls back every mutation a
//! failed group caused.
//!
//! **How**: One function per spec step rather than one sprawling loop body —
//! `run_group_lock`/`run_per_package` each read top-to-bottom as the
//! numbered algorithm in §4.7, the same way the teacher's `UpgradeManager`
//! (`upgrade/manager.rs`) composes detection → application → backup →
//! changeset as discrete, sequentially-awaited steps rather than one
//! monolithic method.
//!
//! **Why**: spec §9's "grouping by adjacency" design note extends naturally
//! here — the executor never builds a `HashMap<GroupKey, Vec<Plan>>`, it
//! walks the already-sorted slice once.

use crate::capabilities::{ManifestUpdater, PackageReloader, ProgressReporter, SystemTestOutcome, SystemTestRunner};
use crate::drift::{validate_pre_update_state, validate_updated_package, verify_rollback_drift};
use crate::error::{join_optional, UpdateError};
use crate::grouping::sort_resolved_plans;
use crate::result::{collect_update_errors, should_skip_update};
use crate::types::{Package, PackageKey, PlannedUpdate, Status, SystemTestMode, UpdateCfg, UpdateContext, UpdateResult};
use crate::version::summarize_available_versions;
use depup_fs::CommandRunner;
use std::collections::HashMap;
use std::time::Duration;
use tracing::Instrument;

/// Aggregated report over a finished run's [`UpdateResult`]s: a per-status
/// tally plus the same non-unsupported error list [`collect_update_errors`]
/// returns, bundled together for a host that just wants one value to print or
/// serialize. Pure reporting sugar over data the engine already produces —
/// it carries no state of its own and answers no question [`UpdateResult`]
/// couldn't already answer one at a time.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Count of results at each terminal [`Status`], keyed by its `Display` string.
    pub counts: HashMap<String, usize>,
    /// Total number of plans this run produced a result for.
    pub total: usize,
    /// Every non-unsupported error carried by the run's results, in result order.
    pub errors: Vec<UpdateError>,
    /// When this summary was built, mirroring the teacher's `ApplySummary::applied_at`.
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl Default for ExecutionSummary {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
            total: 0,
            errors: Vec::new(),
            completed_at: chrono::Utc::now(),
        }
    }
}

impl ExecutionSummary {
    /// Builds a summary from a finished run's results.
    #[must_use]
    pub fn from_results(results: &[UpdateResult]) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for res in results {
            *counts.entry(res.status.to_string()).or_insert(0) += 1;
        }
        Self {
            counts,
            total: results.len(),
            errors: collect_update_errors(results),
            completed_at: chrono::Utc::now(),
        }
    }

    /// Count of results with a given [`Status`].
    #[must_use]
    pub fn count_for(&self, status: Status) -> usize {
        self.counts.get(&status.to_string()).copied().unwrap_or(0)
    }

    /// Whether any non-unsupported error was recorded this run.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Runs every plan to completion, in sorted-group order, with no progress reporting.
pub async fn execute_plans(ctx: &mut UpdateContext, plans: Vec<PlannedUpdate>) -> Vec<UpdateResult> {
    execute_plans_with_progress(ctx, plans, None).await
}

/// Like [`execute_plans`], but calls `progress.increment()` exactly once per
/// plan as it reaches a terminal state — spec §4.7's "progress variant."
pub async fn execute_plans_with_progress(
    ctx: &mut UpdateContext,
    mut plans: Vec<PlannedUpdate>,
    progress: Option<&dyn ProgressReporter>,
) -> Vec<UpdateResult> {
    sort_resolved_plans(&mut plans);
    let groups = split_into_groups(plans);
    tracing::info!(group_count = groups.len(), "starting execution");

    let mut results = Vec::new();
    for group in groups {
        let use_group_lock = group.len() > 1 && !ctx.dry_run && !ctx.skip_lock_run;
        let span = tracing::info_span!(
            "group",
            key = group[0].group_key.as_str(),
            size = group.len(),
            strategy = if use_group_lock { "group_lock" } else { "per_package" }
        );
        let group_results = if use_group_lock {
            run_group_lock(ctx, group, progress).instrument(span).await
        } else {
            run_per_package(ctx, group, progress).instrument(span).await
        };
        results.extend(group_results);
    }
    results
}

/// Splits a sorted plan list into runs of adjacent, equal `group_key` —
/// spec §9's "grouping by adjacency" rather than a second `HashMap` pass.
fn split_into_groups(plans: Vec<PlannedUpdate>) -> Vec<Vec<PlannedUpdate>> {
    let mut groups: Vec<Vec<PlannedUpdate>> = Vec::new();
    for plan in plans {
        if let Some(last) = groups.last_mut() {
            if last[0].group_key == plan.group_key {
                last.push(plan);
                continue;
            }
        }
        groups.push(vec![plan]);
    }
    groups
}

fn tick_once(ticked: &mut [bool], idx: usize, progress: Option<&dyn ProgressReporter>) {
    if !ticked[idx] {
        ticked[idx] = true;
        if let Some(p) = progress {
            p.increment();
        }
    }
}

/// Records the outcome of a failed `ManifestUpdater` call onto `plan`, per
/// spec §4.7's `HandleUpdateError`: `Unsupported` becomes `NotConfigured`
/// and is tracked but never counted as a failure; anything else becomes
/// `Failed`, is wrapped with the package's identity, and accrues into
/// `ctx.failures`. Returns whether this error should contribute to the
/// enclosing group/package error.
fn record_update_error(ctx: &mut UpdateContext, plan: &mut PlannedUpdate, err: UpdateError) -> bool {
    if err.is_unsupported() {
        tracing::debug!(package = plan.res.pkg.name.as_str(), reason = %err, "package unsupported");
        ctx.unsupported.add(plan.res.pkg.key(), err.reason_text());
        plan.res.status = Status::NotConfigured;
        plan.res.err = Some(err);
        false
    } else {
        tracing::warn!(package = plan.res.pkg.name.as_str(), error = %err, "manifest update failed");
        let wrapped = err.with_package_identity(&plan.res.pkg.name, &plan.res.pkg.package_type, &plan.res.pkg.rule);
        ctx.failures.push(wrapped.clone());
        plan.res.status = Status::Failed;
        plan.res.err = Some(wrapped);
        true
    }
}

/// Recomputes `plan.res.{major,minor,patch}` relative to the just-applied
/// target, reusing the candidates retained at plan time (spec §4.7 step 5:
/// `RefreshAvailableVersions`) rather than calling `VersionLister` again.
fn refresh_available_versions(plan: &mut PlannedUpdate) {
    let current = crate::types::RawVersion::new(plan.res.target.clone());
    if let Ok(summary) = summarize_available_versions(
        &current,
        &plan.res.pkg.name,
        &plan.versions_in_constraint,
        plan.versioning.as_ref(),
        plan.incremental,
    ) {
        plan.res.major = summary.major;
        plan.res.minor = summary.minor;
        plan.res.patch = summary.patch;
    }
}

fn should_run_system_tests_after_each(ctx: &UpdateContext) -> bool {
    !ctx.skip_system_tests
        && ctx.system_test_runner.is_some()
        && ctx.system_test_mode == SystemTestMode::AfterEach
}

fn shell_invocation(command_line: &str) -> (String, Vec<String>) {
    ("sh".to_string(), vec!["-c".to_string(), command_line.to_string()])
}

/// Runs the group's single lock command (spec §4.7 step 4), using the first
/// applied plan's effective config for the command string, environment, and
/// timeout — members of one group share a rule/package-type pair and so,
/// absent a conflicting override, share one lock invocation by construction.
async fn run_group_lock_command(
    ctx: &UpdateContext,
    plans: &[PlannedUpdate],
    applied_idx: &[usize],
    with_all_deps: bool,
) -> Result<(), UpdateError> {
    let Some(&first) = applied_idx.first() else {
        return Ok(());
    };
    let cfg = &plans[first].cfg;
    if cfg.commands.trim().is_empty() {
        return Ok(());
    }
    let Some(runner) = ctx.command_runner.as_ref() else {
        return Ok(());
    };

    let command_line =
        if with_all_deps { format!("{} --with-all-dependencies", cfg.commands.trim()) } else { cfg.commands.trim().to_string() };
    let (program, args) = shell_invocation(&command_line);
    let timeout = Duration::from_secs(cfg.timeout_seconds.max(1));

    tracing::info!(group = plans[first].group_key.as_str(), command = command_line.as_str(), "running group lock command");
    runner.run(&program, &args, &ctx.work_dir, &cfg.env, timeout).await.map_err(|err| {
        tracing::warn!(group = plans[first].group_key.as_str(), error = %err, "group lock command failed");
        UpdateError::LockError { group: plans[first].group_key.clone(), reason: err.to_string() }
    })
}

/// Calls `ctx.updater.update`, bounded by `cfg.timeout_seconds` (spec §5: "
/// `UpdaterFunc`/`SystemTestRunner` calls go through `tokio::time::timeout`
/// keyed by `UpdateCfg.timeout_seconds`"). A caller that hangs past its own
/// configured budget is reported the same way a rejected update would be,
/// rather than stalling the whole run.
async fn call_updater(
    ctx: &UpdateContext,
    pkg: &Package,
    target: &str,
    cfg: &UpdateCfg,
    skip_lock: bool,
) -> Result<(), UpdateError> {
    let duration = Duration::from_secs(cfg.timeout_seconds.max(1));
    match tokio::time::timeout(duration, ctx.updater.update(pkg, target, cfg, &ctx.work_dir, ctx.dry_run, skip_lock)).await
    {
        Ok(result) => result,
        Err(_elapsed) => Err(UpdateError::ApplyFailed {
            package: pkg.name.clone(),
            target: target.to_string(),
            reason: format!("updater timed out after {}s", duration.as_secs()),
        }),
    }
}

/// Calls `runner.run_after_update`, bounded by `cfg.timeout_seconds`, same
/// rationale as [`call_updater`]. A timeout is reported as a critical
/// failure rather than silently swallowed — a hung test suite must stop the
/// run, not be treated as a pass.
async fn call_system_test_runner(
    cfg: &UpdateCfg,
    runner: &dyn SystemTestRunner,
    applied: &[PackageKey],
) -> SystemTestOutcome {
    let duration = Duration::from_secs(cfg.timeout_seconds.max(1));
    match tokio::time::timeout(duration, runner.run_after_update(applied)).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => SystemTestOutcome {
            passed: false,
            has_critical_failure: true,
            stop_on_fail: true,
            summary: format!("system tests timed out after {}s", duration.as_secs()),
            results: Vec::new(),
        },
    }
}

/// Rolls every `applied_idx` member of `plans` back to its `original`
/// version (spec §4.7 "`RollbackPlans`"). Always leaves each rolled-back
/// plan's status as `Failed` — whether the rollback itself succeeded is
/// reported separately via the returned error, which names the offending
/// package per spec §7's propagation policy. Every rollback/drift failure
/// is additionally pushed onto `ctx.failures` as it's discovered, per spec
/// line 234's testable property that a rollback error naming the offending
/// package is present there after a failed-then-rolled-back group.
async fn rollback_plans(
    ctx: &mut UpdateContext,
    plans: &mut [PlannedUpdate],
    applied_idx: &[usize],
) -> Option<UpdateError> {
    let mut rollback_err: Option<UpdateError> = None;

    for &i in applied_idx {
        let original = plans[i].original.to_string();
        tracing::info!(package = plans[i].res.pkg.name.as_str(), target = original.as_str(), "rolling back");
        let outcome = {
            let plan = &plans[i];
            call_updater(&*ctx, &plan.res.pkg, &original, &plan.cfg, true).await
        };

        if let Err(err) = outcome {
            let wrapped =
                UpdateError::RollbackError { package: plans[i].res.pkg.name.clone(), reason: err.to_string() };
            ctx.failures.push(wrapped.clone());
            rollback_err = Some(join_optional(rollback_err, wrapped.clone()));
            if plans[i].res.err.is_none() {
                plans[i].res.err = Some(wrapped);
            }
            plans[i].res.status = Status::Failed;
            continue;
        }

        if !ctx.dry_run {
            if let Some(reloader) = ctx.reloader.clone() {
                if let Err(err) = verify_rollback_drift(&plans[i], reloader.as_ref()).await {
                    ctx.failures.push(err.clone());
                    rollback_err = Some(join_optional(rollback_err, err.clone()));
                    if plans[i].res.err.is_none() {
                        plans[i].res.err = Some(err);
                    }
                }
            }
        }

        plans[i].res.status = Status::Failed;
    }

    rollback_err
}

/// Marks every plan in the original group `Failed` unless its status is
/// already one of the non-updatable, non-applied kinds that should be left
/// alone (spec §4.7 "`SummarizeGroupFailure`"). Preserves any error already
/// recorded on a plan; assigns `group_err` to the rest.
fn summarize_group_failure(plans: &mut [PlannedUpdate], group_err: &UpdateError) {
    for plan in plans.iter_mut() {
        if matches!(plan.res.status, Status::NotConfigured | Status::ConfigError | Status::SummarizeError) {
            continue;
        }
        plan.res.status = Status::Failed;
        if plan.res.err.is_none() {
            plan.res.err = Some(group_err.clone());
        }
    }
}

/// Runs one group in `GroupLock` mode: every member's manifest is mutated
/// with `skip_lock = true`, then a single lock command runs for the whole
/// group — spec §4.7's eight-step algorithm.
async fn run_group_lock(
    ctx: &mut UpdateContext,
    mut plans: Vec<PlannedUpdate>,
    progress: Option<&dyn ProgressReporter>,
) -> Vec<UpdateResult> {
    let mut ticked = vec![false; plans.len()];
    let mut applied_idx: Vec<usize> = Vec::new();
    let mut group_err: Option<UpdateError> = None;

    // Steps 1-3: per-plan manifest mutation.
    for idx in 0..plans.len() {
        if should_skip_update(&plans[idx].res) {
            tick_once(&mut ticked, idx, progress);
            continue;
        }

        if let Some(reloader) = ctx.reloader.clone() {
            validate_pre_update_state(&mut plans[idx], reloader.as_ref()).await;
        }

        let target = plans[idx].res.target.clone();
        let outcome = {
            let plan = &plans[idx];
            call_updater(ctx, &plan.res.pkg, &target, &plan.cfg, true).await
        };

        match outcome {
            Ok(()) => applied_idx.push(idx),
            Err(err) => {
                let contributes = record_update_error(ctx, &mut plans[idx], err);
                if contributes {
                    let e = plans[idx].res.err.clone().unwrap_or_else(|| UpdateError::ConfigError {
                        reason: "update failed with no recorded error".to_string(),
                    });
                    group_err = Some(join_optional(group_err, e));
                }
                tick_once(&mut ticked, idx, progress);
            }
        }
    }

    // Step 4: one lock command for the whole group.
    if !applied_idx.is_empty() && group_err.is_none() && !ctx.dry_run {
        let with_all_deps = applied_idx.iter().any(|&i| plans[i].cfg.with_all_dependencies);
        if let Err(err) = run_group_lock_command(ctx, &plans, &applied_idx, with_all_deps).await {
            ctx.failures.push(err.clone());
            for &i in &applied_idx {
                plans[i].res.status = Status::Failed;
                plans[i].res.err = Some(err.clone());
            }
            group_err = Some(err);
        }
    }

    // Step 5: validate every applied plan by reload.
    if group_err.is_none() {
        for &i in &applied_idx {
            if ctx.dry_run {
                continue;
            }
            let validated = if let Some(reloader) = ctx.reloader.clone() {
                validate_updated_package(&plans[i], reloader.as_ref()).await
            } else {
                Ok(())
            };
            match validated {
                Ok(()) => {
                    plans[i].res.status = Status::Updated;
                    refresh_available_versions(&mut plans[i]);
                }
                Err(err) => {
                    plans[i].res.status = Status::Failed;
                    plans[i].res.err = Some(err.clone());
                    ctx.failures.push(err.clone());
                    group_err = Some(join_optional(group_err, err));
                }
            }
        }
    }

    // Step 6: group-level system tests.
    if group_err.is_none() && !applied_idx.is_empty() && !ctx.dry_run && should_run_system_tests_after_each(ctx) {
        if let Some(runner) = ctx.system_test_runner.clone() {
            let keys: Vec<PackageKey> = applied_idx.iter().map(|&i| plans[i].res.pkg.key()).collect();
            let cfg = plans[applied_idx[0]].cfg.clone();
            let outcome = call_system_test_runner(&cfg, runner.as_ref(), &keys).await;
            for &i in &applied_idx {
                plans[i].res.system_test_result = Some(outcome.clone());
            }
            if outcome.is_critical() {
                let err = UpdateError::SystemTestError { critical: true, summary: outcome.summary.clone() };
                ctx.failures.push(err.clone());
                for &i in &applied_idx {
                    plans[i].res.status = Status::Failed;
                    plans[i].res.err = Some(err.clone());
                }
                group_err = Some(err);
            }
        }
    }

    // Step 8: on failure, roll back every applied plan and fail the whole group.
    if let Some(err) = group_err.clone() {
        if !ctx.dry_run {
            if let Some(rollback_err) = rollback_plans(ctx, &mut plans, &applied_idx).await {
                group_err = Some(join_optional(Some(err), rollback_err));
            }
        }
        summarize_group_failure(&mut plans, group_err.as_ref().unwrap_or(&err));
    }

    for idx in 0..plans.len() {
        tick_once(&mut ticked, idx, progress);
    }

    plans.into_iter().map(|p| p.res).collect()
}

/// Runs one group in `PerPackage` mode: each plan mutates its own manifest
/// *and* runs its own lock command (`skip_lock = ctx.skip_lock_run`).
/// A critical system-test failure rolls back only the offending package;
/// a non-unsupported error stops the loop early unless `ctx.continue_on_error`.
async fn run_per_package(
    ctx: &mut UpdateContext,
    mut plans: Vec<PlannedUpdate>,
    progress: Option<&dyn ProgressReporter>,
) -> Vec<UpdateResult> {
    let mut ticked = vec![false; plans.len()];

    for idx in 0..plans.len() {
        if should_skip_update(&plans[idx].res) {
            tick_once(&mut ticked, idx, progress);
            continue;
        }

        if let Some(reloader) = ctx.reloader.clone() {
            validate_pre_update_state(&mut plans[idx], reloader.as_ref()).await;
        }

        let target = plans[idx].res.target.clone();
        let skip_lock = ctx.skip_lock_run;
        let outcome = {
            let plan = &plans[idx];
            call_updater(ctx, &plan.res.pkg, &target, &plan.cfg, skip_lock).await
        };

        if let Err(err) = outcome {
            let contributes = record_update_error(ctx, &mut plans[idx], err);
            tick_once(&mut ticked, idx, progress);
            if contributes && !ctx.continue_on_error {
                break;
            }
            continue;
        }

        if ctx.dry_run {
            tick_once(&mut ticked, idx, progress);
            continue;
        }

        if let Some(reloader) = ctx.reloader.clone() {
            if let Err(err) = validate_updated_package(&plans[idx], reloader.as_ref()).await {
                ctx.failures.push(err.clone());
                plans[idx].res.status = Status::Failed;
                plans[idx].res.err = Some(err);
                tick_once(&mut ticked, idx, progress);
                if !ctx.continue_on_error {
                    break;
                }
                continue;
            }
        }
        plans[idx].res.status = Status::Updated;
        refresh_available_versions(&mut plans[idx]);

        if should_run_system_tests_after_each(ctx) {
            if let Some(runner) = ctx.system_test_runner.clone() {
                let key = plans[idx].res.pkg.key();
                let cfg = plans[idx].cfg.clone();
                let outcome = call_system_test_runner(&cfg, runner.as_ref(), std::slice::from_ref(&key)).await;
                plans[idx].res.system_test_result = Some(outcome.clone());

                if outcome.is_critical() {
                    let err = UpdateError::SystemTestError { critical: true, summary: outcome.summary.clone() };
                    ctx.failures.push(err.clone());
                    let mut final_err = err.clone();
                    plans[idx].res.err = Some(err);
                    if let Some(rollback_err) = rollback_plans(ctx, &mut plans, &[idx]).await {
                        final_err = join_optional(Some(final_err), rollback_err);
                    }
                    plans[idx].res.err = Some(final_err);
                    tick_once(&mut ticked, idx, progress);
                    if !ctx.continue_on_error {
                        break;
                    }
                    continue;
                }
            }
        }

        tick_once(&mut ticked, idx, progress);
    }

    for idx in 0..plans.len() {
        tick_once(&mut ticked, idx, progress);
    }

    plans.into_iter().map(|p| p.res).collect()
}
