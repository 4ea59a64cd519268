//! Config resolver (C2): per-package effective update configuration.
//!
//! **What**: Given a package and the global rule configuration, produces the
//! effective [`UpdateCfg`] — base settings overlaid with any per-package
//! override, using pointer-presence semantics (an override field only takes
//! effect when explicitly set).
//!
//! **How**: `RuleConfig`/`UpdateCfgOverride` implement `depup_fs::Configurable`,
//! the same `validate`/`merge_with` shape as the teacher's
//! `config::upgrade::{RegistryConfig, BackupConfig}`.
//!
//! **Why**: keeping override semantics behind one trait means a future
//! config surface (e.g. `system_tests`) can reuse the identical merge
//! discipline instead of hand-rolling another "if Some, override" block.

use crate::error::UpdateError;
use crate::types::{Package, UpdateCfg};
use depup_fs::{ConfigError, ConfigResult, Configurable};
use std::collections::{HashMap, HashSet};

/// Per-package override of [`UpdateCfg`] fields. `None` means "inherit the rule's base value."
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct UpdateCfgOverride {
    /// Overrides `UpdateCfg::commands` when set.
    pub commands: Option<String>,
    /// Overrides `UpdateCfg::env` when set (replaces, not merges, the map).
    pub env: Option<HashMap<String, String>>,
    /// Overrides `UpdateCfg::group` when set.
    pub group: Option<String>,
    /// Overrides `UpdateCfg::timeout_seconds` when set.
    pub timeout_seconds: Option<u64>,
}

impl Configurable for UpdateCfg {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn merge_with(&mut self, other: Self) -> ConfigResult<()> {
        if !other.commands.trim().is_empty() {
            self.commands = other.commands.trim().to_string();
        }
        if !other.env.is_empty() {
            self.env = other.env;
        }
        if other.group.is_some() {
            self.group = other.group;
        }
        if other.timeout_seconds > 0 {
            self.timeout_seconds = other.timeout_seconds;
        }
        Ok(())
    }
}

/// The update-related configuration for a single rule (e.g. a monorepo package
/// or a named scope of packages).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RuleConfig {
    /// Base update configuration, applied unless overridden per-package.
    pub update: Option<UpdateCfg>,
    /// Per-package-name overrides.
    pub package_overrides: HashMap<String, UpdateCfgOverride>,
    /// Package names (exact match) this rule's group-lock command should run
    /// with an "include transitive peers" flag — spec §6's
    /// `should_update_with_all_dependencies(pkgName)` predicate, resolved
    /// here as a set rather than a function handle since it's pure
    /// configuration data, not host behavior.
    pub with_all_dependencies: HashSet<String>,
}

impl RuleConfig {
    /// Whether `pkg_name` should force the "include transitive peers" lock flag.
    #[must_use]
    pub fn should_update_with_all_dependencies(&self, pkg_name: &str) -> bool {
        self.with_all_dependencies.contains(pkg_name)
    }
}

/// Global configuration: every rule's [`RuleConfig`], keyed by rule name.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    /// Per-rule configuration.
    pub rules: HashMap<String, RuleConfig>,
}

fn apply_override(base: &mut UpdateCfg, over: &UpdateCfgOverride) {
    if let Some(commands) = &over.commands {
        base.commands = commands.trim().to_string();
    }
    if let Some(env) = &over.env {
        base.env = env.clone();
    }
    if over.group.is_some() {
        base.group = over.group.clone();
    }
    if let Some(timeout) = over.timeout_seconds {
        base.timeout_seconds = timeout;
    }
}

/// Resolves the effective [`UpdateCfg`] for `pkg`, per spec §4.2:
///
/// 1. No rule configuration for `pkg.rule` → plain [`UpdateError::ConfigError`].
/// 2. Rule exists but has no `update` block → [`UpdateError::Unsupported`],
///    since the package itself isn't broken, the ecosystem/rule simply
///    doesn't support updating.
/// 3. Otherwise: base config, overlaid with any per-package override using
///    pointer-presence semantics.
///
/// # Errors
///
/// See above; both kinds are [`UpdateError`] so callers branch on
/// `is_unsupported()` rather than a string.
pub fn resolve_update_cfg(pkg: &Package, global: &GlobalConfig) -> Result<UpdateCfg, UpdateError> {
    let rule = global.rules.get(&pkg.rule).ok_or_else(|| UpdateError::ConfigError {
        reason: format!("rule configuration missing for rule '{}'", pkg.rule),
    })?;

    let base = rule.update.clone().ok_or_else(|| UpdateError::Unsupported {
        reason: format!("update configuration missing for rule '{}'", pkg.rule),
    })?;

    let mut effective = base;
    if let Some(over) = rule.package_overrides.get(&pkg.name) {
        apply_override(&mut effective, over);
    }
    effective.with_all_dependencies = rule.should_update_with_all_dependencies(&pkg.name);

    if !is_known_constraint_consistent(pkg) {
        return Err(UpdateError::ConfigError {
            reason: format!(
                "declared version '{}' does not satisfy its own constraint '{}' for package '{}'",
                pkg.version, pkg.constraint, pkg.name
            ),
        });
    }

    Ok(effective)
}

/// Resolution of the open question in spec §9: a declared constraint/version
/// pair (e.g. `^2.0.0`) whose *installed* version (e.g. `1.9.0`, from the
/// lock file) does not actually satisfy that constraint is a config error,
/// not a silent coercion or a pass-through. See DESIGN.md's "Open question
/// decisions".
///
/// Only checked when an installed version is actually on record — an empty
/// or sentinel installed version means there's nothing to cross-check, and
/// an unparseable one is a different failure mode handled by the planner
/// (`VersionMissing`), not here.
fn is_known_constraint_consistent(pkg: &Package) -> bool {
    use crate::version::{filter_versions_by_constraint, SemverVersioning, Versioning};

    if crate::version::is_floating_constraint(&pkg.version) {
        return true;
    }
    if pkg.installed_version.is_empty() || pkg.installed_version.is_sentinel() {
        return true;
    }

    let versioning = SemverVersioning;
    if versioning.parse_segments(pkg.installed_version.as_str()).is_none() {
        return true;
    }

    let candidates = std::slice::from_ref(&pkg.installed_version);
    !filter_versions_by_constraint(&pkg.version, pkg.constraint, candidates, None, &versioning).is_empty()
}
