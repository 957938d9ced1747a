//! Condition / group data model.
//!
//! These are the compiler's internal types: fully determined, closed enums,
//! no optional-field inference. Loosely typed caller payloads are validated
//! and defaulted into these types by [`crate::request`] before they reach the
//! flattener.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hierarchy::HierarchyOperator;

/// What a condition matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Literal text inside the matched field.
    Text,
    /// A page reference in any of its surface syntaxes (`[[p]]`, `#p`, `p::`).
    PageReference,
    /// A block embed/reference (`((uuid))`).
    BlockReference,
    /// A raw, caller-supplied pattern.
    Pattern,
}

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Text => "text",
            ConditionKind::PageReference => "page_reference",
            ConditionKind::BlockReference => "block_reference",
            ConditionKind::Pattern => "pattern",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The whole field must equal the value.
    Exact,
    /// The value may occur anywhere in the field.
    Contains,
    /// The value is already a pattern; it is neither escaped nor wrapped.
    Pattern,
}

/// How members of a group (or groups of a set) combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => f.write_str("AND"),
            Combinator::Or => f.write_str("OR"),
        }
    }
}

/// Which entities a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    Block,
    Page,
}

/// An atomic predicate.
///
/// `weight` is carried for callers (ranking layers, UIs) and is never read by
/// the compiler. `semantic_expansion` is an opaque strategy tag consumed by the
/// expansion service before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub value: String,
    pub match_mode: MatchMode,
    #[serde(default)]
    pub negate: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_expansion: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

impl Condition {
    /// A positive `contains` text condition.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ConditionKind::Text, value, MatchMode::Contains)
    }

    pub fn page_ref(value: impl Into<String>) -> Self {
        Self::new(ConditionKind::PageReference, value, MatchMode::Contains)
    }

    pub fn block_ref(value: impl Into<String>) -> Self {
        Self::new(ConditionKind::BlockReference, value, MatchMode::Contains)
    }

    /// A raw pattern condition; the value is passed through verbatim.
    pub fn pattern(value: impl Into<String>) -> Self {
        Self::new(ConditionKind::Pattern, value, MatchMode::Pattern)
    }

    pub fn new(kind: ConditionKind, value: impl Into<String>, match_mode: MatchMode) -> Self {
        Self {
            kind,
            value: value.into(),
            match_mode,
            negate: false,
            weight: default_weight(),
            semantic_expansion: None,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn exact(mut self) -> Self {
        self.match_mode = MatchMode::Exact;
        self
    }

    pub fn with_expansion(mut self, strategy: impl Into<String>) -> Self {
        self.semantic_expansion = Some(strategy.into());
        self
    }

    /// True when the value is used as a pattern verbatim.
    pub fn is_raw_pattern(&self) -> bool {
        self.kind == ConditionKind::Pattern || self.match_mode == MatchMode::Pattern
    }
}

/// Conditions combined by one uniform combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
}

impl ConditionGroup {
    pub fn new(conditions: Vec<Condition>, combinator: Combinator) -> Self {
        Self {
            conditions,
            combinator,
        }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Self::new(conditions, Combinator::And)
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::new(conditions, Combinator::Or)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// An AND over two or more conditions: the shape that cannot sit under an
    /// OR without a multi-step decomposition.
    pub fn is_conjunction(&self) -> bool {
        self.combinator == Combinator::And && self.conditions.len() >= 2
    }

    pub fn has_negation(&self) -> bool {
        self.conditions.iter().any(|c| c.negate)
    }
}

/// Groups combined by an outer combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSet {
    pub groups: Vec<ConditionGroup>,
    pub group_combinator: Combinator,
}

impl GroupSet {
    pub fn new(groups: Vec<ConditionGroup>, group_combinator: Combinator) -> Self {
        Self {
            groups,
            group_combinator,
        }
    }

    /// A set holding exactly one group.
    pub fn single(group: ConditionGroup) -> Self {
        Self::new(vec![group], Combinator::And)
    }

    pub fn condition_count(&self) -> usize {
        self.groups.iter().map(ConditionGroup::len).sum()
    }

    pub fn conditions_mut(&mut self) -> impl Iterator<Item = &mut Condition> {
        self.groups.iter_mut().flat_map(|g| g.conditions.iter_mut())
    }
}

/// Two group sets related by a hierarchy operator: `(left, operator, right)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyRelation {
    pub left: GroupSet,
    pub operator: HierarchyOperator,
    pub right: GroupSet,
}

impl HierarchyRelation {
    /// The same relation phrased from the other side.
    pub fn inverted(&self) -> Self {
        Self {
            left: self.right.clone(),
            operator: self.operator.inverse(),
            right: self.left.clone(),
        }
    }
}

/// Restricts evaluation to known entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConstraint {
    /// Allowed block identifiers (uuids as strings).
    #[serde(default)]
    pub block_ids: Vec<String>,
    /// Allowed page (container) identifiers.
    #[serde(default)]
    pub page_ids: Vec<String>,
    /// Drop date-stamped journal pages (and blocks on them).
    #[serde(default)]
    pub exclude_journals: bool,
}

impl ScopeConstraint {
    pub fn is_empty(&self) -> bool {
        self.block_ids.is_empty() && self.page_ids.is_empty() && !self.exclude_journals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjunction_needs_two_members() {
        let one = ConditionGroup::all(vec![Condition::text("a")]);
        let two = ConditionGroup::all(vec![Condition::text("a"), Condition::text("b")]);
        let or = ConditionGroup::any(vec![Condition::text("a"), Condition::text("b")]);
        assert!(!one.is_conjunction());
        assert!(two.is_conjunction());
        assert!(!or.is_conjunction());
    }

    #[test]
    fn raw_pattern_covers_kind_and_mode() {
        assert!(Condition::pattern("a+").is_raw_pattern());
        let mut c = Condition::text("a+");
        assert!(!c.is_raw_pattern());
        c.match_mode = MatchMode::Pattern;
        assert!(c.is_raw_pattern());
    }

    #[test]
    fn condition_serde_defaults_weight_and_negate() {
        let c: Condition =
            serde_json::from_str(r#"{"kind":"text","value":"AI","match_mode":"contains"}"#)
                .expect("deserialize condition");
        assert!(!c.negate);
        assert_eq!(c.weight, 1.0);
        assert!(c.semantic_expansion.is_none());
    }
}
