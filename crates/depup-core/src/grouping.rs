//! Grouping (C3): group keys and the deterministic plan sort order.
//!
//! **What**: Computes the exact-equality `GroupKey` the executor batches
//! plans by, a human-readable group name for display, and the total sort
//! order that makes "adjacent equal `GroupKey`" a valid way to discover a batch.
//!
//! **How**: Grounded in the design note (spec §9): "grouping by adjacency in
//! a sorted list" — walk the sorted slice and take runs of equal `GroupKey`
//! instead of building a `HashMap<GroupKey, Vec<Plan>>`. This both preserves
//! ordering and avoids a second allocation, matching the teacher's general
//! preference (seen in `detector.rs`) for single-pass, allocation-light
//! aggregation over intermediate maps.
//!
//! **Why**: see spec §4.3 and §9.

use crate::types::{Package, PlannedUpdate, UpdateCfg};

/// Computes the exact-equality key the executor uses to batch packages that
/// must be updated together (typically: share a lock file).
///
/// Precedence: an explicit `cfg.group` override wins; otherwise packages
/// sharing the same `(rule, package_type)` pair are batched, since that pair
/// is what usually maps to one manifest/lock pair.
#[must_use]
pub fn update_group_key(cfg: &UpdateCfg, pkg: &Package) -> String {
    if let Some(group) = &cfg.group {
        if !group.trim().is_empty() {
            return format!("cfg:{}", group.trim());
        }
    }
    if let Some(group) = &pkg.group {
        if !group.trim().is_empty() {
            return format!("pkg:{}", group.trim());
        }
    }
    format!("rule:{}|type:{}", pkg.rule, pkg.package_type)
}

/// Human-readable group name for display — strips the internal `cfg:`/`pkg:`/
/// `rule:`/`type:` tagging `update_group_key` uses to disambiguate sources.
#[must_use]
pub fn normalize_update_group(group_key: &str) -> String {
    if let Some(rest) = group_key.strip_prefix("cfg:").or_else(|| group_key.strip_prefix("pkg:")) {
        return rest.to_string();
    }
    if let Some(rest) = group_key.strip_prefix("rule:") {
        return rest.replace("|type:", "/");
    }
    group_key.to_string()
}

/// Sorts `plans` into the executor's required total order: `rule`, then
/// `package_type`, then group (named groups before the empty/default group),
/// then `kind` (dev/prod/…), then `name`.
///
/// This ordering is what makes "adjacent plans with equal `group_key`" a
/// correct way to discover a batch — see the module doc comment.
pub fn sort_resolved_plans(plans: &mut [PlannedUpdate]) {
    plans.sort_by(|a, b| {
        let pkg_a = &a.res.pkg;
        let pkg_b = &b.res.pkg;

        pkg_a
            .rule
            .cmp(&pkg_b.rule)
            .then_with(|| pkg_a.package_type.cmp(&pkg_b.package_type))
            .then_with(|| group_sort_key(&a.group_key).cmp(&group_sort_key(&b.group_key)))
            .then_with(|| pkg_a.kind.cmp(&pkg_b.kind))
            .then_with(|| pkg_a.name.cmp(&pkg_b.name))
    });
}

/// Named groups sort before the default `rule:.../type:...` group, so a
/// stable tuple is `(is_default_group, group_key)`.
fn group_sort_key(group_key: &str) -> (bool, &str) {
    (group_key.starts_with("rule:"), group_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Constraint, InstallStatus, RawVersion, Status, UpdateResult};
    use crate::version::default_versioning;
    use std::path::PathBuf;

    fn plan(rule: &str, package_type: &str, kind: &str, name: &str, group_key: &str) -> PlannedUpdate {
        let pkg = Package {
            rule: rule.to_string(),
            package_type: package_type.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            version: RawVersion::new("1.0.0"),
            constraint: Constraint::Gte,
            source: PathBuf::from("package.json"),
            installed_version: RawVersion::new("1.0.0"),
            group: None,
            install_status: InstallStatus::Normal,
        };
        PlannedUpdate {
            cfg: UpdateCfg::default(),
            res: UpdateResult::terminal(pkg, Status::Planned),
            original: RawVersion::new("1.0.0"),
            group_key: group_key.to_string(),
            versions_in_constraint: Vec::new(),
            versioning: default_versioning(),
            incremental: false,
        }
    }

    #[test]
    fn group_key_prefers_explicit_cfg_override() {
        let cfg = UpdateCfg { group: Some("shared-lock".to_string()), ..Default::default() };
        let pkg = Package {
            rule: "monorepo-a".to_string(),
            package_type: "npm".to_string(),
            kind: "prod".to_string(),
            name: "axios".to_string(),
            version: RawVersion::new("1.0.0"),
            constraint: Constraint::Gte,
            source: PathBuf::from("package.json"),
            installed_version: RawVersion::new("1.0.0"),
            group: None,
            install_status: InstallStatus::Normal,
        };
        assert_eq!(update_group_key(&cfg, &pkg), "cfg:shared-lock");
    }

    #[test]
    fn sort_orders_by_rule_then_type_then_group_then_kind_then_name() {
        let mut plans = vec![
            plan("rule-b", "npm", "prod", "axios", "rule:rule-b|type:npm"),
            plan("rule-a", "npm", "prod", "zlib", "rule:rule-a|type:npm"),
            plan("rule-a", "npm", "dev", "eslint", "rule:rule-a|type:npm"),
            plan("rule-a", "npm", "prod", "axios", "cfg:shared"),
        ];

        sort_resolved_plans(&mut plans);

        let names: Vec<&str> = plans.iter().map(|p| p.res.pkg.name.as_str()).collect();
        assert_eq!(names, vec!["axios", "eslint", "zlib", "axios"]);
        assert_eq!(plans[3].res.pkg.rule, "rule-b");
    }

    #[test]
    fn normalize_strips_internal_tagging() {
        assert_eq!(normalize_update_group("cfg:shared-lock"), "shared-lock");
        assert_eq!(normalize_update_group("rule:monorepo-a|type:npm"), "monorepo-a/npm");
    }
}
