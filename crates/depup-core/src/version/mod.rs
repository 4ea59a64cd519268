//! Version policy: comparison, constraint classification, and target selection.
//!
//! **What**: Implements C1 from spec §4.1 — deciding whether a declared
//! version is floating or fully pinned, filtering candidate versions by
//! constraint and scope, summarizing candidates into major/minor/patch
//! tiers, and selecting the most aggressive in-scope target.
//!
//! **How**: Ecosystem-aware comparison is abstracted behind [`Versioning`],
//! mirroring the teacher's pattern of keeping version comparison pluggable
//! per-ecosystem (`crates/pkg/src/version/range.rs` makes the same move for
//! constraint parsing). [`SemverVersioning`] is the default, `semver`-backed
//! implementation, with a leading-`v` strip and a best-effort numeric-segment
//! fallback for ecosystems whose version strings aren't strict semver.
//!
//! **Why**: not every ecosystem this engine eventually targets uses strict
//! semver (Go's pseudo-versions, PHP's 2-segment releases); hard-coding the
//! `semver` crate's parser into the policy functions would make this module
//! npm-shaped forever.

use crate::error::UpdateError;
use crate::types::{Constraint, RawVersion};
use std::cmp::Ordering;
use std::sync::Arc;

/// The most aggressive version bump permitted for a given package.
///
/// Ordered `Major > Minor > Patch`: each level also permits everything below
/// it ([`UpdateScope::Major`] permits minor and patch bumps too).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpdateScope {
    /// Patch bumps only (same major.minor).
    Patch,
    /// Minor or patch bumps (same major).
    Minor,
    /// Any bump, including a new major line.
    Major,
}

/// Ecosystem-specific version comparison and parsing rules.
///
/// A `Versioning` implementation is what lets the rest of this crate stay
/// ignorant of whether it's looking at npm semver, a Go pseudo-version, or a
/// bare two-segment release number.
pub trait Versioning: Send + Sync {
    /// Orders two raw version strings.
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Parses a raw version string into `(major, minor, patch)`, if possible.
    ///
    /// Implementations should tolerate a leading `v` and missing trailing
    /// segments (treated as `0`). Returns `None` for strings this ecosystem's
    /// versioning rules cannot interpret at all.
    fn parse_segments(&self, v: &str) -> Option<(u64, u64, u64)>;
}

/// Default [`Versioning`] backed by the `semver` crate, tolerant of a
/// leading `v` and of versions with fewer than three numeric segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemverVersioning;

impl SemverVersioning {
    fn normalize(v: &str) -> String {
        let trimmed = v.trim();
        trimmed.strip_prefix('v').unwrap_or(trimmed).to_string()
    }

    fn fallback_segments(v: &str) -> Option<(u64, u64, u64)> {
        let normalized = Self::normalize(v);
        let mut parts = normalized.split('.').map(|segment| {
            let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u64>().ok()
        });
        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some((major, minor, patch))
    }
}

impl Versioning for SemverVersioning {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let normalized_a = Self::normalize(a);
        let normalized_b = Self::normalize(b);
        match (semver::Version::parse(&normalized_a), semver::Version::parse(&normalized_b)) {
            (Ok(va), Ok(vb)) => va.cmp(&vb),
            _ => {
                let segments_a = Self::fallback_segments(a);
                let segments_b = Self::fallback_segments(b);
                match (segments_a, segments_b) {
                    (Some(sa), Some(sb)) => sa.cmp(&sb),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => normalized_a.cmp(&normalized_b),
                }
            }
        }
    }

    fn parse_segments(&self, v: &str) -> Option<(u64, u64, u64)> {
        let normalized = Self::normalize(v);
        if let Ok(parsed) = semver::Version::parse(&normalized) {
            return Some((parsed.major, parsed.minor, parsed.patch));
        }
        Self::fallback_segments(v)
    }
}

/// Returns a shared default [`Versioning`] implementation.
#[must_use]
pub fn default_versioning() -> Arc<dyn Versioning> {
    Arc::new(SemverVersioning)
}

/// Whether `version` is a wildcard or otherwise non-resolvable floating constraint.
#[must_use]
pub fn is_floating_constraint(version: &RawVersion) -> bool {
    let trimmed = version.as_str().trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed == "*" {
        return true;
    }
    trimmed
        .split('.')
        .all(|segment| matches!(segment, "*" | "x" | "X"))
}

/// Whether `constraint` requires an exact match (`=` or no operator at all).
#[must_use]
pub fn is_exact_constraint(constraint: Constraint) -> bool {
    matches!(constraint, Constraint::Exact | Constraint::None)
}

/// Whether `version` is a fully pinned, three-or-more-segment numeric version
/// with no embedded range operator.
#[must_use]
pub fn is_fully_pinned_version(version: &RawVersion) -> bool {
    let trimmed = version.as_str().trim();
    if trimmed.is_empty() || trimmed.is_sentinel_like() {
        return false;
    }
    let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if stripped.contains(['^', '~', '>', '<', '*', 'x', 'X']) {
        return false;
    }
    let segments: Vec<&str> = stripped.split('.').collect();
    segments.len() >= 3 && segments.iter().all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
}

trait SentinelLike {
    fn is_sentinel_like(&self) -> bool;
}

impl SentinelLike for str {
    fn is_sentinel_like(&self) -> bool {
        self == crate::types::VERSION_SENTINEL
    }
}

/// Filters `all` down to candidates that satisfy `pkg`'s declared constraint,
/// optionally further restricted to `scope`.
///
/// `scope: None` returns every constraint-satisfying candidate (used for the
/// "head-room" display summary); `scope: Some(_)` additionally drops
/// candidates outside the permitted bump level (used to drive target
/// selection).
#[must_use]
pub fn filter_versions_by_constraint(
    current: &RawVersion,
    constraint: Constraint,
    all: &[RawVersion],
    scope: Option<UpdateScope>,
    versioning: &dyn Versioning,
) -> Vec<RawVersion> {
    let Some(current_segments) = versioning.parse_segments(current.as_str()) else {
        return Vec::new();
    };

    all.iter()
        .filter(|candidate| {
            let Some(candidate_segments) = versioning.parse_segments(candidate.as_str()) else {
                return false;
            };
            let scope_ok = match scope {
                Some(s) => within_scope(current_segments, candidate_segments, s),
                None => true,
            };
            satisfies_constraint(current_segments, candidate_segments, constraint, versioning, current, candidate)
                && scope_ok
        })
        .cloned()
        .collect()
}

fn satisfies_constraint(
    current: (u64, u64, u64),
    candidate: (u64, u64, u64),
    constraint: Constraint,
    versioning: &dyn Versioning,
    current_raw: &RawVersion,
    candidate_raw: &RawVersion,
) -> bool {
    match constraint {
        Constraint::Exact | Constraint::None => versions_match(current_raw.as_str(), candidate_raw.as_str()),
        Constraint::Caret => caret_compatible(current, candidate),
        Constraint::Tilde => candidate.0 == current.0 && candidate.1 == current.1 && candidate >= current,
        Constraint::Gte => versioning.compare(candidate_raw.as_str(), current_raw.as_str()) != Ordering::Less,
        Constraint::Gt => versioning.compare(candidate_raw.as_str(), current_raw.as_str()) == Ordering::Greater,
        Constraint::Lte => versioning.compare(candidate_raw.as_str(), current_raw.as_str()) != Ordering::Greater,
        Constraint::Lt => versioning.compare(candidate_raw.as_str(), current_raw.as_str()) == Ordering::Less,
    }
}

/// npm-style caret compatibility: the leftmost non-zero component is held fixed.
fn caret_compatible(current: (u64, u64, u64), candidate: (u64, u64, u64)) -> bool {
    if candidate < current {
        return false;
    }
    if current.0 > 0 {
        candidate.0 == current.0
    } else if current.1 > 0 {
        candidate.0 == 0 && candidate.1 == current.1
    } else {
        candidate.0 == 0 && candidate.1 == 0 && candidate.2 == current.2
    }
}

fn within_scope(current: (u64, u64, u64), candidate: (u64, u64, u64), scope: UpdateScope) -> bool {
    match scope {
        UpdateScope::Major => true,
        UpdateScope::Minor => candidate.0 == current.0,
        UpdateScope::Patch => candidate.0 == current.0 && candidate.1 == current.1,
    }
}

/// The three single-version tiers produced by [`summarize_available_versions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSummary {
    /// Best candidate in the next major line, if any.
    pub major: Option<RawVersion>,
    /// Best candidate within the current major line, if any.
    pub minor: Option<RawVersion>,
    /// Best candidate within the current major.minor, if any.
    pub patch: Option<RawVersion>,
}

/// Summarizes `candidates` (already filtered by constraint, per spec §4.1)
/// into major/minor/patch tiers relative to `current`.
///
/// Non-incremental: each tier holds the *highest* candidate in that tier.
/// `incremental`: each tier holds the *nearest* candidate above `current` in
/// that dimension — "the next step" rather than the latest.
///
/// # Errors
///
/// Returns [`UpdateError::SummarizeError`] only if `current` itself cannot be
/// parsed by `versioning` — an unparsable individual candidate is simply
/// skipped, not treated as a summarization failure.
pub fn summarize_available_versions(
    current: &RawVersion,
    package_name: &str,
    candidates: &[RawVersion],
    versioning: &dyn Versioning,
    incremental: bool,
) -> Result<VersionSummary, UpdateError> {
    let Some(current_segments) = versioning.parse_segments(current.as_str()) else {
        return Err(UpdateError::SummarizeError {
            package: package_name.to_string(),
            reason: format!("current version '{current}' could not be parsed"),
        });
    };

    let mut major_tier: Vec<((u64, u64, u64), &RawVersion)> = Vec::new();
    let mut minor_tier: Vec<((u64, u64, u64), &RawVersion)> = Vec::new();
    let mut patch_tier: Vec<((u64, u64, u64), &RawVersion)> = Vec::new();

    for candidate in candidates {
        let Some(segments) = versioning.parse_segments(candidate.as_str()) else {
            continue;
        };
        if segments.0 > current_segments.0 {
            major_tier.push((segments, candidate));
        } else if segments.0 == current_segments.0 && segments.1 > current_segments.1 {
            minor_tier.push((segments, candidate));
        } else if segments.0 == current_segments.0
            && segments.1 == current_segments.1
            && segments.2 > current_segments.2
        {
            patch_tier.push((segments, candidate));
        }
    }

    // The next major line is the lowest major greater than current; within
    // it we pick either the highest release (latest) or the lowest
    // (incremental "next step").
    let next_major_line = major_tier.iter().map(|(s, _)| s.0).min();
    if let Some(line) = next_major_line {
        major_tier.retain(|(s, _)| s.0 == line);
    }

    Ok(VersionSummary {
        major: pick_tier(&major_tier, incremental, versioning),
        minor: pick_tier(&minor_tier, incremental, versioning),
        patch: pick_tier(&patch_tier, incremental, versioning),
    })
}

/// Picks the best candidate within a tier.
///
/// Tie-breaks via `versioning.compare()` on the original strings rather than
/// the `(major, minor, patch)` tuple the tier was bucketed by: two candidates
/// can share the same numeric triple (`2.0.0` and `2.0.0-beta.1`) while still
/// differing once pre-release segments are taken into account, and spec §4.1
/// requires an unknown pre-release label to sort below any release sharing
/// its numeric triple.
fn pick_tier(
    tier: &[((u64, u64, u64), &RawVersion)],
    incremental: bool,
    versioning: &dyn Versioning,
) -> Option<RawVersion> {
    let compare = |a: &((u64, u64, u64), &RawVersion), b: &((u64, u64, u64), &RawVersion)| {
        versioning.compare(a.1.as_str(), b.1.as_str())
    };
    if incremental {
        tier.iter().min_by(|a, b| compare(a, b)).map(|(_, v)| (*v).clone())
    } else {
        tier.iter().max_by(|a, b| compare(a, b)).map(|(_, v)| (*v).clone())
    }
}

/// Picks the most aggressive in-scope target from a [`VersionSummary`].
///
/// Tries `Major`, then `Minor`, then `Patch`, returning the first tier both
/// present and permitted by `scope`. Returns an empty [`RawVersion`] if none apply.
#[must_use]
pub fn select_target_version(summary: &VersionSummary, scope: UpdateScope) -> RawVersion {
    if scope == UpdateScope::Major {
        if let Some(v) = &summary.major {
            return v.clone();
        }
    }
    if scope >= UpdateScope::Minor {
        if let Some(v) = &summary.minor {
            return v.clone();
        }
    }
    if let Some(v) = &summary.patch {
        return v.clone();
    }
    RawVersion::new("")
}

/// Whether `a` and `b` denote the same version after trimming whitespace and
/// a single leading `v`.
#[must_use]
pub fn versions_match(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.trim().strip_prefix('v').unwrap_or(s.trim()).to_string();
    normalize(a) == normalize(b)
}

#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> RawVersion {
        RawVersion::new(s)
    }

    #[test]
    fn floating_constraint_matches_wildcards_only() {
        assert!(is_floating_constraint(&v("*")));
        assert!(is_floating_constraint(&v("x.x.x")));
        assert!(!is_floating_constraint(&v("1.2.3")));
        assert!(!is_floating_constraint(&v("")));
    }

    #[test]
    fn exact_constraint_includes_no_operator() {
        assert!(is_exact_constraint(Constraint::Exact));
        assert!(is_exact_constraint(Constraint::None));
        assert!(!is_exact_constraint(Constraint::Caret));
    }

    #[test]
    fn fully_pinned_requires_three_numeric_segments() {
        assert!(is_fully_pinned_version(&v("1.2.3")));
        assert!(!is_fully_pinned_version(&v("1.2")));
        assert!(!is_fully_pinned_version(&v("^1.2.3")));
        assert!(!is_fully_pinned_version(&v("*")));
    }

    #[test]
    fn versions_match_ignores_leading_v_and_whitespace() {
        assert!(versions_match(" v1.2.3", "1.2.3 "));
        assert!(!versions_match("1.2.3", "1.2.4"));
    }

    #[test]
    fn caret_constraint_accepts_compatible_minor_and_patch_bumps() {
        let versioning = SemverVersioning;
        let candidates = vec![v("1.2.4"), v("1.9.0"), v("2.0.0")];
        let filtered = filter_versions_by_constraint(&v("1.2.3"), Constraint::Caret, &candidates, None, &versioning);
        assert_eq!(filtered, vec![v("1.2.4"), v("1.9.0")]);
    }

    #[test]
    fn tilde_constraint_accepts_patch_bumps_only() {
        let versioning = SemverVersioning;
        let candidates = vec![v("1.2.4"), v("1.3.0"), v("2.0.0")];
        let filtered = filter_versions_by_constraint(&v("1.2.3"), Constraint::Tilde, &candidates, None, &versioning);
        assert_eq!(filtered, vec![v("1.2.4")]);
    }

    #[test]
    fn summarize_picks_highest_per_tier_by_default() {
        let versioning = SemverVersioning;
        let candidates = vec![v("1.2.4"), v("1.2.5"), v("1.3.0"), v("1.4.0"), v("2.0.0"), v("3.0.0")];
        let summary =
            summarize_available_versions(&v("1.2.3"), "axios", &candidates, &versioning, false).expect("summarize");
        assert_eq!(summary.major, Some(v("2.0.0")));
        assert_eq!(summary.minor, Some(v("1.4.0")));
        assert_eq!(summary.patch, Some(v("1.2.5")));
    }

    #[test]
    fn summarize_incremental_picks_nearest_step() {
        let versioning = SemverVersioning;
        let candidates = vec![v("1.2.4"), v("1.2.5"), v("1.3.0"), v("1.4.0"), v("2.0.0"), v("3.0.0")];
        let summary =
            summarize_available_versions(&v("1.2.3"), "axios", &candidates, &versioning, true).expect("summarize");
        assert_eq!(summary.major, Some(v("2.0.0")));
        assert_eq!(summary.minor, Some(v("1.3.0")));
        assert_eq!(summary.patch, Some(v("1.2.4")));
    }

    #[test]
    fn summarize_prefers_a_release_over_a_prerelease_sharing_the_same_triple() {
        let versioning = SemverVersioning;
        let candidates = vec![v("2.0.0-beta.1"), v("2.0.0")];
        let summary =
            summarize_available_versions(&v("1.2.3"), "axios", &candidates, &versioning, false).expect("summarize");
        assert_eq!(summary.major, Some(v("2.0.0")));
    }

    #[test]
    fn summarize_incremental_also_prefers_a_release_over_a_prerelease_sharing_the_same_triple() {
        let versioning = SemverVersioning;
        let candidates = vec![v("2.0.0-beta.1"), v("2.0.0")];
        let summary =
            summarize_available_versions(&v("1.2.3"), "axios", &candidates, &versioning, true).expect("summarize");
        assert_eq!(summary.major, Some(v("2.0.0")));
    }

    #[test]
    fn pick_tier_is_deterministic_regardless_of_candidate_order() {
        let versioning = SemverVersioning;
        let forward = vec![v("2.0.0-alpha.1"), v("2.0.0-beta.1"), v("2.0.0")];
        let mut reversed = forward.clone();
        reversed.reverse();

        let summarize = |candidates: &[RawVersion]| {
            summarize_available_versions(&v("1.2.3"), "axios", candidates, &versioning, false).expect("summarize")
        };
        assert_eq!(summarize(&forward).major, Some(v("2.0.0")));
        assert_eq!(summarize(&reversed).major, Some(v("2.0.0")));
    }

    #[test]
    fn select_target_prefers_major_over_minor_over_patch_within_scope() {
        let summary = VersionSummary { major: Some(v("2.0.0")), minor: Some(v("1.4.0")), patch: Some(v("1.2.5")) };
        assert_eq!(select_target_version(&summary, UpdateScope::Major), v("2.0.0"));
        assert_eq!(select_target_version(&summary, UpdateScope::Minor), v("1.4.0"));
        assert_eq!(select_target_version(&summary, UpdateScope::Patch), v("1.2.5"));
    }

    #[test]
    fn select_target_returns_empty_when_no_tier_has_a_candidate() {
        let summary = VersionSummary::default();
        assert_eq!(select_target_version(&summary, UpdateScope::Major), v(""));
    }

    // Property-based tests, grounded in the teacher's
    // `crates/pkg/src/types/tests.rs` `prop_version_parse_roundtrip`/
    // `prop_bump_*` family: generate arbitrary major/minor/patch triples
    // rather than hand-picking edge cases.
    proptest! {
        #[test]
        fn prop_parse_segments_roundtrips_through_display(
            major in 0u64..1000,
            minor in 0u64..1000,
            patch in 0u64..1000,
        ) {
            let versioning = SemverVersioning;
            let rendered = format!("{major}.{minor}.{patch}");
            let parsed = versioning.parse_segments(&rendered);
            prop_assert_eq!(parsed, Some((major, minor, patch)));
        }

        #[test]
        fn prop_versions_match_is_reflexive_modulo_leading_v(
            major in 0u64..1000,
            minor in 0u64..1000,
            patch in 0u64..1000,
        ) {
            let bare = format!("{major}.{minor}.{patch}");
            let prefixed = format!("v{bare}");
            prop_assert!(versions_match(&bare, &bare));
            prop_assert!(versions_match(&bare, &prefixed));
        }

        #[test]
        fn prop_caret_filter_never_admits_a_lower_major(
            current_major in 1u64..50,
            current_minor in 0u64..50,
            current_patch in 0u64..50,
            candidate_major in 0u64..50,
            candidate_minor in 0u64..50,
            candidate_patch in 0u64..50,
        ) {
            let versioning = SemverVersioning;
            let current = v(&format!("{current_major}.{current_minor}.{current_patch}"));
            let candidate = v(&format!("{candidate_major}.{candidate_minor}.{candidate_patch}"));
            let filtered = filter_versions_by_constraint(
                &current,
                Constraint::Caret,
                std::slice::from_ref(&candidate),
                None,
                &versioning,
            );
            if candidate_major != current_major {
                prop_assert!(filtered.is_empty());
            }
        }

        #[test]
        fn prop_select_target_version_always_returns_one_of_the_offered_tiers(
            major in 0u64..1000,
            minor in 0u64..1000,
            patch in 0u64..1000,
        ) {
            let major_v = v(&format!("{}.0.0", major + 1));
            let minor_v = v(&format!("0.{}.0", minor + 1));
            let patch_v = v(&format!("0.0.{}", patch + 1));
            let summary = VersionSummary {
                major: Some(major_v.clone()),
                minor: Some(minor_v.clone()),
                patch: Some(patch_v.clone()),
            };
            for scope in [UpdateScope::Major, UpdateScope::Minor, UpdateScope::Patch] {
                let target = select_target_version(&summary, scope);
                prop_assert!(target == major_v || target == minor_v || target == patch_v);
            }
        }
    }
}
