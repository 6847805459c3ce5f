//! Merge every rename into one ordered rule list.
//!
//! Longer `old` patterns are applied before shorter ones so a namespace rule can
//! never rewrite a prefix of a fully-qualified name that a more specific rule
//! owns. Ties break lexicographically on `old`, making the plan a pure function
//! of its inputs.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{Error, Result, RuleConflict};
use crate::mapping::PackageMismatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// A whole namespace. Never matches a prefix of a longer dotted path.
    Package,
    /// A fully-qualified symbol. May be followed by member access (`Foo.bar()`).
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RenameRule {
    pub old: String,
    pub new: String,
    pub kind: RuleKind,
}

impl RenameRule {
    /// Build a rule, or `None` when `old` is empty or identical to `new`.
    pub fn new(old: &str, new: &str, kind: RuleKind) -> Option<Self> {
        if old.is_empty() || old == new {
            return None;
        }
        Some(RenameRule {
            old: old.to_string(),
            new: new.to_string(),
            kind,
        })
    }
}

/// Rules ordered longest-`old`-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<RenameRule>,
}

impl RuleSet {
    /// Order arbitrary rules. Callers are expected to have removed duplicate `old`s.
    pub fn from_rules(mut rules: Vec<RenameRule>) -> Self {
        rules.sort_by(|a, b| {
            b.old
                .len()
                .cmp(&a.old.len())
                .then_with(|| a.old.cmp(&b.old))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        RuleSet { rules }
    }

    pub fn rules(&self) -> &[RenameRule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenameRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Resolve conflicting targets by picking the smallest `new` instead of failing.
    pub allow_ambiguous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanWarning {
    pub kind: String,
    pub old: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub rule_set: RuleSet,
    pub warnings: Vec<PlanWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Source {
    Explicit,
    Derived,
    Namespace,
}

#[derive(Debug, Clone)]
struct Candidate {
    new: String,
    kind: RuleKind,
    source: Source,
}

/// Merge explicit symbol renames, derived symbol renames and one namespace rule
/// per unique `(old, new)` namespace pair into an ordered `RuleSet`.
///
/// Explicit renames override anything else declared for the same `old`. Any
/// other `old` with more than one distinct target is a conflict: an error by
/// default, or resolved to the smallest target with a warning when
/// `allow_ambiguous` is set.
pub fn build_plan(
    explicit: &[RenameRule],
    derived: &[RenameRule],
    mismatches: &[PackageMismatch],
    options: PlanOptions,
) -> Result<Plan> {
    let mut by_old: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();

    let namespace_rules = mismatches
        .iter()
        .map(|m| (m.old_namespace.as_str(), m.new_namespace.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|(old, new)| RenameRule::new(old, new, RuleKind::Package));

    let tagged = explicit
        .iter()
        .cloned()
        .map(|r| (r, Source::Explicit))
        .chain(derived.iter().cloned().map(|r| (r, Source::Derived)))
        .chain(namespace_rules.map(|r| (r, Source::Namespace)));

    for (rule, source) in tagged {
        by_old.entry(rule.old).or_default().push(Candidate {
            new: rule.new,
            kind: rule.kind,
            source,
        });
    }

    let mut rules = Vec::with_capacity(by_old.len());
    let mut warnings = Vec::new();
    let mut conflicts = Vec::new();

    for (old, mut candidates) in by_old {
        let names_namespace = candidates.iter().any(|c| c.kind == RuleKind::Package);
        let names_symbol = candidates.iter().any(|c| c.kind == RuleKind::Symbol);

        if candidates.iter().any(|c| c.source == Source::Explicit) {
            let overridden: BTreeSet<&str> = candidates
                .iter()
                .filter(|c| c.source != Source::Explicit)
                .map(|c| c.new.as_str())
                .collect();
            let explicit_new = candidates
                .iter()
                .rev()
                .find(|c| c.source == Source::Explicit)
                .map(|c| c.new.clone())
                .unwrap_or_default();
            for other in overridden.iter().filter(|n| **n != explicit_new) {
                warnings.push(PlanWarning {
                    kind: "explicit_override".to_string(),
                    old: old.clone(),
                    message: format!(
                        "Explicit rename '{}' -> '{}' overrides derived target '{}'",
                        old, explicit_new, other
                    ),
                });
            }
            candidates.retain(|c| c.source == Source::Explicit);
        }

        let targets: BTreeSet<&str> = candidates.iter().map(|c| c.new.as_str()).collect();

        if targets.len() > 1 {
            let all: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
            if !options.allow_ambiguous {
                conflicts.push(RuleConflict {
                    old: old.clone(),
                    candidates: all,
                });
                continue;
            }
            warnings.push(PlanWarning {
                kind: "ambiguous_rename".to_string(),
                old: old.clone(),
                message: format!(
                    "'{}' has {} targets ({}); using '{}'",
                    old,
                    all.len(),
                    all.join(", "),
                    all[0]
                ),
            });
        }

        let Some(chosen) = targets.iter().next().map(|t| t.to_string()) else {
            continue;
        };

        // Text that names a namespace keeps namespace boundaries.
        let kind = if names_namespace {
            RuleKind::Package
        } else {
            RuleKind::Symbol
        };
        if names_namespace && names_symbol {
            warnings.push(PlanWarning {
                kind: "namespace_symbol_collision".to_string(),
                old: old.clone(),
                message: format!(
                    "'{}' is both a namespace and a symbol; treating it as a namespace",
                    old
                ),
            });
        }

        rules.push(RenameRule {
            old,
            new: chosen,
            kind,
        });
    }

    if !conflicts.is_empty() {
        return Err(Error::mapping_ambiguous(conflicts));
    }

    let rule_set = RuleSet::from_rules(rules);

    // A target that is itself renamed breaks idempotence across runs.
    let olds: BTreeSet<&str> = rule_set.iter().map(|r| r.old.as_str()).collect();
    for rule in rule_set.iter().filter(|r| olds.contains(r.new.as_str())) {
        warnings.push(PlanWarning {
            kind: "chained_rename".to_string(),
            old: rule.old.clone(),
            message: format!(
                "'{}' is renamed to '{}', which is itself renamed; rerunning will rename it again",
                rule.old, rule.new
            ),
        });
    }

    crate::log_status!(
        "plan",
        "{} rule(s) planned, {} warning(s)",
        rule_set.len(),
        warnings.len()
    );

    Ok(Plan { rule_set, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(old: &str, new: &str) -> RenameRule {
        RenameRule::new(old, new, RuleKind::Symbol).unwrap()
    }

    fn mismatch(file: &str, old: &str, new: &str) -> PackageMismatch {
        PackageMismatch {
            file_path: file.to_string(),
            old_namespace: old.to_string(),
            new_namespace: new.to_string(),
        }
    }

    #[test]
    fn rename_rule_rejects_empty_and_noop() {
        assert!(RenameRule::new("", "a", RuleKind::Symbol).is_none());
        assert!(RenameRule::new("a.B", "a.B", RuleKind::Symbol).is_none());
        assert!(RenameRule::new("a.B", "a.C", RuleKind::Symbol).is_some());
    }

    #[test]
    fn rules_sorted_longest_first_with_lexicographic_ties() {
        let plan = build_plan(
            &[symbol("com.foo.Bb", "x.Bb"), symbol("com.foo.Aa", "x.Aa")],
            &[symbol("com.foo.Widget", "com.bar.Gadget")],
            &[mismatch("Foo.kt", "com.foo", "com.bar")],
            PlanOptions::default(),
        )
        .unwrap();

        let olds: Vec<&str> = plan.rule_set.iter().map(|r| r.old.as_str()).collect();
        assert_eq!(
            olds,
            vec!["com.foo.Widget", "com.foo.Aa", "com.foo.Bb", "com.foo"]
        );
        assert_eq!(plan.rule_set.rules()[3].kind, RuleKind::Package);
    }

    #[test]
    fn namespace_rule_emitted_once_per_pair() {
        let plan = build_plan(
            &[],
            &[],
            &[
                mismatch("A.kt", "old.pkg", "new.pkg"),
                mismatch("B.kt", "old.pkg", "new.pkg"),
            ],
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(plan.rule_set.len(), 1);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn identical_derived_rules_are_deduplicated() {
        let plan = build_plan(
            &[],
            &[symbol("old.pkg.Foo", "new.pkg.Foo"), symbol("old.pkg.Foo", "new.pkg.Foo")],
            &[],
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(plan.rule_set.len(), 1);
    }

    #[test]
    fn conflicting_namespace_targets_are_rejected() {
        let err = build_plan(
            &[],
            &[],
            &[
                mismatch("A.kt", "old.pkg", "new.a"),
                mismatch("B.kt", "old.pkg", "new.b"),
            ],
            PlanOptions::default(),
        )
        .unwrap_err();

        assert_eq!(err.code.as_str(), "mapping.ambiguous");
        assert_eq!(err.details["conflicts"][0]["old"], "old.pkg");
    }

    #[test]
    fn allow_ambiguous_picks_smallest_target_and_warns() {
        let plan = build_plan(
            &[],
            &[symbol("old.pkg.Foo", "new.b.Foo"), symbol("old.pkg.Foo", "new.a.Foo")],
            &[],
            PlanOptions {
                allow_ambiguous: true,
            },
        )
        .unwrap();

        assert_eq!(plan.rule_set.rules()[0].new, "new.a.Foo");
        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].kind, "ambiguous_rename");
    }

    #[test]
    fn explicit_rename_overrides_derived() {
        let plan = build_plan(
            &[symbol("old.pkg.Foo", "new.pkg.Renamed")],
            &[symbol("old.pkg.Foo", "new.pkg.Foo")],
            &[],
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(plan.rule_set.len(), 1);
        assert_eq!(plan.rule_set.rules()[0].new, "new.pkg.Renamed");
        assert_eq!(plan.warnings[0].kind, "explicit_override");
    }

    #[test]
    fn namespace_text_shared_with_a_symbol_stays_a_namespace() {
        let plan = build_plan(
            &[],
            &[symbol("old.pkg", "new.pkg")],
            &[mismatch("A.kt", "old.pkg", "new.pkg")],
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(plan.rule_set.len(), 1);
        assert_eq!(plan.rule_set.rules()[0].kind, RuleKind::Package);
        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].kind, "namespace_symbol_collision");
    }

    #[test]
    fn same_name_in_two_namespaces_keeps_both_rules() {
        let plan = build_plan(
            &[],
            &[symbol("old.b.Util", "new.b.Util"), symbol("old.a.Util", "new.a.Util")],
            &[
                mismatch("b/Util.kt", "old.b", "new.b"),
                mismatch("a/Util.kt", "old.a", "new.a"),
            ],
            PlanOptions::default(),
        )
        .unwrap();

        let pairs: Vec<(&str, &str)> = plan
            .rule_set
            .iter()
            .map(|r| (r.old.as_str(), r.new.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("old.a.Util", "new.a.Util"),
                ("old.b.Util", "new.b.Util"),
                ("old.a", "new.a"),
                ("old.b", "new.b"),
            ]
        );
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn chained_targets_are_flagged() {
        let plan = build_plan(
            &[],
            &[],
            &[mismatch("A.kt", "a.b", "c.d"), mismatch("B.kt", "c.d", "e.f")],
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].kind, "chained_rename");
        assert_eq!(plan.warnings[0].old, "a.b");
    }

    #[test]
    fn plan_is_deterministic_regardless_of_input_order() {
        let a = build_plan(
            &[symbol("a.b.C", "a.b.D"), symbol("x.y.Z", "x.y.W")],
            &[],
            &[mismatch("A.kt", "a.b", "c.d"), mismatch("B.kt", "x.y", "u.v")],
            PlanOptions::default(),
        )
        .unwrap();
        let b = build_plan(
            &[symbol("x.y.Z", "x.y.W"), symbol("a.b.C", "a.b.D")],
            &[],
            &[mismatch("B.kt", "x.y", "u.v"), mismatch("A.kt", "a.b", "c.d")],
            PlanOptions::default(),
        )
        .unwrap();

        assert_eq!(a.rule_set, b.rule_set);
    }
}
