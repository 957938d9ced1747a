//! Hierarchy operators between two compiled sides.
//!
//! Ten operators in five inverse pairs. Each one is phrased from the left
//! side: `(L, child_of, R)` reads "L is a child of R".
//!
//! | strength | operators | clause shape |
//! |---|---|---|
//! | strict | `child_of` / `parent_of` | one `:block/parent` triple |
//! | deep | `descendant_of` / `ancestor_of` | `ancestor` rule (transitive closure over `:block/parent`) |
//! | flexible | `flex_child_of` / `flex_parent_of` | `or-join` of the strict clause and its inverse |
//! | flexible | `flex_descendant_of` / `flex_ancestor_of` | `or-join` of the deep clause and its inverse |
//! | bidirectional | `linked_child_of` / `linked_parent_of` | `linked` rule: union of both edge directions, no transitivity |
//!
//! Compiling `(L, op, R)` and `(R, op.inverse(), L)` gives the same relation
//! between the two entity variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::datalog::{attr, Clause, RuleDef, Var};
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strict,
    Deep,
    Flexible,
    Bidirectional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyOperator {
    ChildOf,
    ParentOf,
    DescendantOf,
    AncestorOf,
    FlexChildOf,
    FlexParentOf,
    FlexDescendantOf,
    FlexAncestorOf,
    LinkedChildOf,
    LinkedParentOf,
}

pub const ANCESTOR_RULE: &str = "ancestor";
pub const LINKED_RULE: &str = "linked";

impl HierarchyOperator {
    pub const ALL: [HierarchyOperator; 10] = [
        HierarchyOperator::ChildOf,
        HierarchyOperator::ParentOf,
        HierarchyOperator::DescendantOf,
        HierarchyOperator::AncestorOf,
        HierarchyOperator::FlexChildOf,
        HierarchyOperator::FlexParentOf,
        HierarchyOperator::FlexDescendantOf,
        HierarchyOperator::FlexAncestorOf,
        HierarchyOperator::LinkedChildOf,
        HierarchyOperator::LinkedParentOf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HierarchyOperator::ChildOf => "child_of",
            HierarchyOperator::ParentOf => "parent_of",
            HierarchyOperator::DescendantOf => "descendant_of",
            HierarchyOperator::AncestorOf => "ancestor_of",
            HierarchyOperator::FlexChildOf => "flex_child_of",
            HierarchyOperator::FlexParentOf => "flex_parent_of",
            HierarchyOperator::FlexDescendantOf => "flex_descendant_of",
            HierarchyOperator::FlexAncestorOf => "flex_ancestor_of",
            HierarchyOperator::LinkedChildOf => "linked_child_of",
            HierarchyOperator::LinkedParentOf => "linked_parent_of",
        }
    }

    pub fn strength(self) -> Strength {
        use HierarchyOperator::*;
        match self {
            ChildOf | ParentOf => Strength::Strict,
            DescendantOf | AncestorOf => Strength::Deep,
            FlexChildOf | FlexParentOf | FlexDescendantOf | FlexAncestorOf => Strength::Flexible,
            LinkedChildOf | LinkedParentOf => Strength::Bidirectional,
        }
    }

    pub fn inverse(self) -> Self {
        use HierarchyOperator::*;
        match self {
            ChildOf => ParentOf,
            ParentOf => ChildOf,
            DescendantOf => AncestorOf,
            AncestorOf => DescendantOf,
            FlexChildOf => FlexParentOf,
            FlexParentOf => FlexChildOf,
            FlexDescendantOf => FlexAncestorOf,
            FlexAncestorOf => FlexDescendantOf,
            LinkedChildOf => LinkedParentOf,
            LinkedParentOf => LinkedChildOf,
        }
    }

    /// The clause relating `left` and `right` entity variables, plus the rule
    /// definition the clause calls, if any.
    pub fn relation(self, left: &Var, right: &Var) -> (Clause, Option<RuleDef>) {
        use HierarchyOperator::*;
        match self {
            ChildOf => (child_edge(left, right), None),
            ParentOf => (child_edge(right, left), None),
            DescendantOf => (
                Clause::rule(ANCESTOR_RULE, &[right, left]),
                Some(ancestor_rule()),
            ),
            AncestorOf => (
                Clause::rule(ANCESTOR_RULE, &[left, right]),
                Some(ancestor_rule()),
            ),
            FlexChildOf | FlexParentOf | FlexDescendantOf | FlexAncestorOf => {
                let base = match self {
                    FlexChildOf => ChildOf,
                    FlexParentOf => ParentOf,
                    FlexDescendantOf => DescendantOf,
                    _ => AncestorOf,
                };
                let (preferred, rule) = base.relation(left, right);
                let (fallback, _) = base.inverse().relation(left, right);
                (
                    Clause::OrJoin {
                        vars: vec![left.clone(), right.clone()],
                        branches: vec![preferred, fallback],
                    },
                    rule,
                )
            }
            LinkedChildOf => (
                Clause::rule(LINKED_RULE, &[right, left]),
                Some(linked_rule()),
            ),
            LinkedParentOf => (
                Clause::rule(LINKED_RULE, &[left, right]),
                Some(linked_rule()),
            ),
        }
    }
}

fn expected_operators() -> String {
    HierarchyOperator::ALL
        .iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for HierarchyOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchyOperator {
    type Err = CompileError;

    /// Accepts `child_of`, `child-of`, `strict_child_of`, `deep_ancestor_of`,
    /// `flexible_child_of`, `bidirectional_parent_of` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let norm = norm
            .strip_prefix("strict_")
            .or_else(|| norm.strip_prefix("deep_"))
            .map(str::to_string)
            .unwrap_or_else(|| {
                norm.replacen("flexible_", "flex_", 1)
                    .replacen("bidirectional_", "linked_", 1)
            });
        HierarchyOperator::ALL
            .into_iter()
            .find(|op| op.as_str() == norm)
            .ok_or_else(|| CompileError::UnknownOperator {
                operator: s.to_string(),
                expected: expected_operators(),
            })
    }
}

/// `child`'s parent is `parent`.
fn child_edge(child: &Var, parent: &Var) -> Clause {
    Clause::data(child, attr::PARENT, parent)
}

/// `(ancestor ?a ?d)`: `?a` is a proper ancestor of `?d`.
pub fn ancestor_rule() -> RuleDef {
    let a = Var::new("a");
    let d = Var::new("d");
    let x = Var::new("x");
    RuleDef {
        name: ANCESTOR_RULE.to_string(),
        params: vec![a.clone(), d.clone()],
        bodies: vec![
            vec![child_edge(&d, &a)],
            vec![
                child_edge(&d, &x),
                Clause::rule(ANCESTOR_RULE, &[&a, &x]),
            ],
        ],
    }
}

/// `(linked ?a ?b)`: a direct parent edge in either direction.
pub fn linked_rule() -> RuleDef {
    let a = Var::new("a");
    let b = Var::new("b");
    RuleDef {
        name: LINKED_RULE.to_string(),
        params: vec![a.clone(), b.clone()],
        bodies: vec![vec![child_edge(&b, &a)], vec![child_edge(&a, &b)]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    /// Clause equality up to or-join branch order.
    fn canonical(c: &Clause) -> (String, BTreeSet<String>) {
        match c {
            Clause::OrJoin { vars, branches } => (
                format!("or-join {:?}", vars.iter().collect::<BTreeSet<_>>()),
                branches.iter().map(Clause::render).collect(),
            ),
            other => (other.render(), BTreeSet::new()),
        }
    }

    #[test]
    fn every_operator_has_a_distinct_inverse_pair() {
        for op in HierarchyOperator::ALL {
            assert_ne!(op, op.inverse());
            assert_eq!(op.inverse().inverse(), op);
            assert_eq!(op.strength(), op.inverse().strength());
        }
    }

    #[test]
    fn inverse_with_swapped_sides_is_the_same_relation() {
        let l = Var::new("l");
        let r = Var::new("r");
        for op in HierarchyOperator::ALL {
            let (a, rule_a) = op.relation(&l, &r);
            let (b, rule_b) = op.inverse().relation(&r, &l);
            assert_eq!(canonical(&a), canonical(&b), "operator {op}");
            assert_eq!(rule_a, rule_b);
        }
    }

    #[test]
    fn strict_child_of_is_a_parent_triple() {
        let (c, rule) = HierarchyOperator::ChildOf.relation(&Var::new("l"), &Var::new("r"));
        assert_eq!(c.render(), "[?l :block/parent ?r]");
        assert!(rule.is_none());
    }

    #[test]
    fn deep_uses_transitive_rule() {
        let (c, rule) = HierarchyOperator::DescendantOf.relation(&Var::new("l"), &Var::new("r"));
        assert_eq!(c.render(), "(ancestor ?r ?l)");
        let rule = rule.unwrap();
        assert_eq!(rule.bodies.len(), 2);
        assert!(rule.bodies[1]
            .iter()
            .any(|c| matches!(c, Clause::RuleCall { name, .. } if name == ANCESTOR_RULE)));
    }

    #[test]
    fn flexible_is_a_disjunction_of_both_directions() {
        let (c, _) = HierarchyOperator::FlexChildOf.relation(&Var::new("l"), &Var::new("r"));
        assert_eq!(
            c.render(),
            "(or-join [?l ?r] [?l :block/parent ?r] [?r :block/parent ?l])"
        );
    }

    #[test]
    fn bidirectional_rule_is_not_transitive() {
        let rule = linked_rule();
        assert!(rule
            .bodies
            .iter()
            .flatten()
            .all(|c| !matches!(c, Clause::RuleCall { .. })));
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("child-of".parse::<HierarchyOperator>().unwrap(), HierarchyOperator::ChildOf);
        assert_eq!(
            "strict_parent_of".parse::<HierarchyOperator>().unwrap(),
            HierarchyOperator::ParentOf
        );
        assert_eq!(
            "deep-ancestor-of".parse::<HierarchyOperator>().unwrap(),
            HierarchyOperator::AncestorOf
        );
        assert_eq!(
            "flexible_descendant_of".parse::<HierarchyOperator>().unwrap(),
            HierarchyOperator::FlexDescendantOf
        );
        assert_eq!(
            "Bidirectional Child Of".parse::<HierarchyOperator>().unwrap(),
            HierarchyOperator::LinkedChildOf
        );
    }

    #[test]
    fn rejects_operators_outside_the_set() {
        let err = "sibling_of".parse::<HierarchyOperator>().unwrap_err();
        assert_eq!(err.code(), "UnknownOperator");
        assert!(err.is_capability_gap());
    }
}
