//! Versioned JSON request boundary.
//!
//! Callers (tool layers, LLMs, scripts) send loosely typed JSON; this module is
//! the only place that tolerates it. Aliases, case-insensitive combinators and
//! unknown kinds are resolved here, every recoverable problem becomes a
//! [`Diagnostic`](crate::diagnostics::Diagnostic), and what comes out is a
//! fully determined [`QueryRequest`].
//!
//! ```json
//! {
//!   "version": 1,
//!   "entity": "block",
//!   "groups": [
//!     { "conditions": [{ "type": "text", "value": "AI" },
//!                      { "type": "text", "value": "ML" }], "combinator": "or" },
//!     { "conditions": [{ "type": "page_reference", "value": "draft", "negate": true }] }
//!   ],
//!   "group_combinator": "AND",
//!   "scope": { "page_ids": ["6571c5a2-…"] }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::config::CompilerConfig;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::CompileError;
use crate::hierarchy::HierarchyOperator;
use crate::model::{
    Combinator, Condition, ConditionGroup, ConditionKind, EntityKind, GroupSet,
    HierarchyRelation, MatchMode, ScopeConstraint,
};
use crate::pattern;

pub const QUERY_REQUEST_V1_VERSION: u32 = 1;

fn default_version() -> u32 {
    QUERY_REQUEST_V1_VERSION
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionIrV1 {
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default, alias = "match", skip_serializing_if = "Option::is_none")]
    pub match_mode: Option<String>,
    #[serde(default, alias = "negated", alias = "not")]
    pub negate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(
        default,
        alias = "expansion",
        skip_serializing_if = "Option::is_none"
    )]
    pub semantic_expansion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupIrV1 {
    #[serde(default)]
    pub conditions: Vec<ConditionIrV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combinator: Option<String>,
}

/// Either a flat condition list or a list of groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSetIrV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<ConditionIrV1>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combinator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupIrV1>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_combinator: Option<String>,
}

impl GroupSetIrV1 {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_none() && self.groups.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyIrV1 {
    pub left: GroupSetIrV1,
    #[serde(alias = "relation")]
    pub operator: String,
    pub right: GroupSetIrV1,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequestV1 {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(flatten)]
    pub body: GroupSetIrV1,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<HierarchyIrV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeConstraint>,
}

/// What a validated request asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryShape {
    Groups(GroupSet),
    Hierarchy(HierarchyRelation),
}

/// A fully determined request, ready to compile.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub entity: EntityKind,
    pub shape: QueryShape,
    pub scope: ScopeConstraint,
}

impl QueryRequest {
    pub fn groups(set: GroupSet) -> Self {
        Self {
            entity: EntityKind::Block,
            shape: QueryShape::Groups(set),
            scope: ScopeConstraint::default(),
        }
    }

    pub fn hierarchy(relation: HierarchyRelation) -> Self {
        Self {
            entity: EntityKind::Block,
            shape: QueryShape::Hierarchy(relation),
            scope: ScopeConstraint::default(),
        }
    }

    pub fn with_entity(mut self, entity: EntityKind) -> Self {
        self.entity = entity;
        self
    }

    pub fn with_scope(mut self, scope: ScopeConstraint) -> Self {
        self.scope = scope;
        self
    }

    pub fn condition_count(&self) -> usize {
        match &self.shape {
            QueryShape::Groups(set) => set.condition_count(),
            QueryShape::Hierarchy(rel) => rel.left.condition_count() + rel.right.condition_count(),
        }
    }

    /// Every condition, both hierarchy sides included.
    pub fn conditions_mut(&mut self) -> Box<dyn Iterator<Item = &mut Condition> + '_> {
        match &mut self.shape {
            QueryShape::Groups(set) => Box::new(set.conditions_mut()),
            QueryShape::Hierarchy(rel) => {
                Box::new(rel.left.conditions_mut().chain(rel.right.conditions_mut()))
            }
        }
    }
}

impl QueryRequestV1 {
    pub fn from_json_str(text: &str) -> Result<Self, CompileError> {
        serde_json::from_str(text).map_err(|e| CompileError::InvalidRequest(e.to_string()))
    }

    /// Validate and default into a [`QueryRequest`].
    pub fn validate(
        &self,
        config: &CompilerConfig,
    ) -> Result<(QueryRequest, Diagnostics), CompileError> {
        if self.version != QUERY_REQUEST_V1_VERSION {
            return Err(CompileError::UnsupportedVersion {
                found: self.version,
                expected: QUERY_REQUEST_V1_VERSION,
            });
        }

        let mut diagnostics = Diagnostics::new();
        let entity = match self.entity.as_deref() {
            None => EntityKind::Block,
            Some(raw) => parse_entity(raw)?,
        };

        let shape = match (&self.hierarchy, self.body.is_empty()) {
            (Some(_), false) => {
                return Err(CompileError::InvalidRequest(
                    "cannot combine top-level conditions/groups with `hierarchy`".to_string(),
                ))
            }
            (None, true) => {
                return Err(CompileError::InvalidRequest(
                    "missing query body (provide `conditions`, `groups` or `hierarchy`)"
                        .to_string(),
                ))
            }
            (None, false) => {
                QueryShape::Groups(lower_group_set(&self.body, "", &mut diagnostics)?)
            }
            (Some(h), true) => {
                if entity == EntityKind::Page {
                    return Err(CompileError::InvalidRequest(
                        "hierarchy operators relate blocks; use entity `block`".to_string(),
                    ));
                }
                let operator: HierarchyOperator = h.operator.parse()?;
                QueryShape::Hierarchy(HierarchyRelation {
                    left: lower_group_set(&h.left, "hierarchy.left", &mut diagnostics)?,
                    operator,
                    right: lower_group_set(&h.right, "hierarchy.right", &mut diagnostics)?,
                })
            }
        };

        let request = QueryRequest {
            entity,
            shape,
            scope: self.scope.clone().unwrap_or_default(),
        };

        let count = request.condition_count();
        if count > config.max_conditions {
            return Err(CompileError::TooManyConditions {
                count,
                max: config.max_conditions,
            });
        }

        Ok((request, diagnostics))
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

fn parse_entity(raw: &str) -> Result<EntityKind, CompileError> {
    match normalize(raw).as_str() {
        "block" | "blocks" => Ok(EntityKind::Block),
        "page" | "pages" => Ok(EntityKind::Page),
        _ => Err(CompileError::InvalidRequest(format!(
            "unknown entity '{raw}' (expected `block` or `page`)"
        ))),
    }
}

fn parse_combinator(raw: Option<&str>, at: &str) -> Result<Combinator, CompileError> {
    let Some(raw) = raw else {
        return Ok(Combinator::And);
    };
    match normalize(raw).as_str() {
        "and" | "&&" | "all" => Ok(Combinator::And),
        "or" | "||" | "any" => Ok(Combinator::Or),
        _ => Err(CompileError::InvalidRequest(format!(
            "{at}: unknown combinator '{raw}' (expected AND or OR)"
        ))),
    }
}

/// Loose kind names; `None` for anything unrecognized.
fn parse_kind(raw: &str) -> Option<ConditionKind> {
    match normalize(raw).as_str() {
        "text" | "literal" | "keyword" => Some(ConditionKind::Text),
        "page_reference" | "page_ref" | "page" | "tag" | "reference" => {
            Some(ConditionKind::PageReference)
        }
        "block_reference" | "block_ref" | "block" => Some(ConditionKind::BlockReference),
        "pattern" | "regex" | "regexp" => Some(ConditionKind::Pattern),
        _ => None,
    }
}

fn parse_match_mode(raw: &str) -> Option<MatchMode> {
    match normalize(raw).as_str() {
        "exact" | "equals" => Some(MatchMode::Exact),
        "contains" | "substring" => Some(MatchMode::Contains),
        "pattern" | "regex" => Some(MatchMode::Pattern),
        _ => None,
    }
}

fn join_path(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{prefix}.{rest}")
    }
}

/// `None` when the condition is dropped.
fn lower_condition(
    ir: &ConditionIrV1,
    at: &str,
    diagnostics: &mut Diagnostics,
) -> Option<Condition> {
    if ir.value.trim().is_empty() {
        diagnostics.warn(
            DiagnosticCode::EmptyValue,
            format!("{at}: empty value; condition skipped"),
        );
        return None;
    }

    let kind = match ir.kind.as_deref() {
        None => ConditionKind::Text,
        Some(raw) => parse_kind(raw).unwrap_or_else(|| {
            diagnostics.warn(
                DiagnosticCode::UnknownKind,
                format!("{at}: unknown kind '{raw}'; treated as text"),
            );
            ConditionKind::Text
        }),
    };

    let default_mode = if kind == ConditionKind::Pattern {
        MatchMode::Pattern
    } else {
        MatchMode::Contains
    };
    let match_mode = match ir.match_mode.as_deref() {
        None => default_mode,
        Some(raw) => parse_match_mode(raw).unwrap_or_else(|| {
            diagnostics.warn(
                DiagnosticCode::UnknownKind,
                format!("{at}: unknown match mode '{raw}'; using {default_mode:?}"),
            );
            default_mode
        }),
    };

    let condition = Condition {
        kind,
        value: ir.value.clone(),
        match_mode,
        negate: ir.negate,
        weight: ir.weight.filter(|w| w.is_finite()).unwrap_or(1.0),
        semantic_expansion: ir
            .semantic_expansion
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    if condition.is_raw_pattern() {
        if let Err(e) = pattern::check_pattern(&condition.value) {
            diagnostics.warn(
                DiagnosticCode::SuspectPattern,
                format!("{at}: pattern does not compile locally ({e}); the engine may reject it"),
            );
        }
    }
    Some(condition)
}

fn lower_group(
    conditions: &[ConditionIrV1],
    combinator: Option<&str>,
    at: &str,
    diagnostics: &mut Diagnostics,
) -> Result<Option<ConditionGroup>, CompileError> {
    let combinator = parse_combinator(combinator, at)?;
    let kept = conditions
        .iter()
        .enumerate()
        .filter_map(|(i, c)| lower_condition(c, &format!("{at}.conditions[{i}]"), diagnostics))
        .collect::<Vec<_>>();
    if kept.is_empty() {
        diagnostics.warn(
            DiagnosticCode::EmptyGroup,
            format!("{at}: no usable conditions; group skipped"),
        );
        return Ok(None);
    }
    Ok(Some(ConditionGroup::new(kept, combinator)))
}

fn lower_group_set(
    ir: &GroupSetIrV1,
    at: &str,
    diagnostics: &mut Diagnostics,
) -> Result<GroupSet, CompileError> {
    let set = match (&ir.conditions, &ir.groups) {
        (Some(_), Some(_)) => {
            return Err(CompileError::InvalidRequest(format!(
                "{}: cannot set both `conditions` and `groups`",
                if at.is_empty() { "request" } else { at }
            )))
        }
        (None, None) => {
            return Err(CompileError::InvalidRequest(format!(
                "{}: missing `conditions` or `groups`",
                if at.is_empty() { "request" } else { at }
            )))
        }
        (Some(conditions), None) => {
            let group = lower_group(
                conditions,
                ir.combinator.as_deref(),
                &join_path(at, "conditions"),
                diagnostics,
            )?;
            GroupSet::new(group.into_iter().collect(), Combinator::And)
        }
        (None, Some(groups)) => {
            let group_combinator =
                parse_combinator(ir.group_combinator.as_deref(), &join_path(at, "group_combinator"))?;
            let mut kept = Vec::with_capacity(groups.len());
            for (i, g) in groups.iter().enumerate() {
                let path = join_path(at, &format!("groups[{i}]"));
                if let Some(group) =
                    lower_group(&g.conditions, g.combinator.as_deref(), &path, diagnostics)?
                {
                    kept.push(group);
                }
            }
            GroupSet::new(kept, group_combinator)
        }
    };

    if set.groups.is_empty() {
        return Err(CompileError::empty(at));
    }
    Ok(set)
}
