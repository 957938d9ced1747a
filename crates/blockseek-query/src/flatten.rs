//! Group flattening and feasibility tiers.
//!
//! A [`GroupSet`] is flattened into one ordered condition list plus one
//! combinator, which is all the clause builder understands. Whether that is
//! possible without changing the query's meaning depends on the shape:
//!
//! - **Tier 1 (flat)**: one group, or an OR over groups that are all plain
//!   disjunctions (or single positive conditions). Concatenation is lossless.
//! - **Tier 2 (AND-dominant)**: an AND over two or more groups. OR sub-groups
//!   collapse into one pattern clause each (see [`crate::rewrite`]), so the
//!   whole set becomes one conjunction: `(A|B) AND NOT C` → `[re(A|B), NOT C]`.
//! - **Tier 3 (OR-dominant)**: an OR over groups where some group is
//!   conjunctive: an AND of two or more conditions, or any group with a
//!   negated member (negated OR members read as conjoined exclusions, and a
//!   lone negation cannot be ORed with its siblings). There is no
//!   single-clause form for an OR of conjunctions, so this is reported as
//!   unsupported rather than approximated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CompileError;
use crate::model::{Combinator, Condition, ConditionGroup, GroupSet};
use crate::rewrite::{self, Collapsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Flat,
    AndDominant,
    OrDominant,
}

impl Tier {
    pub fn number(self) -> u8 {
        match self {
            Tier::Flat => 1,
            Tier::AndDominant => 2,
            Tier::OrDominant => 3,
        }
    }

    pub fn is_supported(self) -> bool {
        self != Tier::OrDominant
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Flat => "flat",
            Tier::AndDominant => "AND-dominant",
            Tier::OrDominant => "OR-dominant",
        };
        write!(f, "tier {} ({label})", self.number())
    }
}

/// Classify a group set. Total and deterministic.
pub fn classify(set: &GroupSet) -> Tier {
    if set.groups.len() <= 1 {
        return Tier::Flat;
    }
    match set.group_combinator {
        Combinator::And => Tier::AndDominant,
        Combinator::Or => {
            if set.groups.iter().any(is_conjunctive) {
                Tier::OrDominant
            } else {
                Tier::Flat
            }
        }
    }
}

/// A group that cannot be concatenated into a sibling disjunction.
fn is_conjunctive(group: &ConditionGroup) -> bool {
    group.is_conjunction() || group.has_negation()
}

/// Normalized form handed to the clause builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    pub tier: Tier,
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
    /// Number of OR groups collapsed into a pattern clause.
    pub rewrites: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenOptions {
    /// Also rewrite plain OR groups (no negation) into one pattern.
    pub rewrite_plain_or: bool,
}

/// Flatten `set` or report why it cannot be flattened.
pub fn flatten(set: &GroupSet, options: FlattenOptions) -> Result<Flattened, CompileError> {
    let tier = classify(set);
    tracing::debug!(
        %tier,
        groups = set.groups.len(),
        group_combinator = %set.group_combinator,
        "classified group set"
    );

    let acc = match tier {
        Tier::Flat => {
            let (conditions, combinator) = match set.groups.as_slice() {
                [] => (Vec::new(), Combinator::And),
                [only] => (only.conditions.clone(), only.combinator),
                many => (
                    many.iter()
                        .flat_map(|g| g.conditions.iter().cloned())
                        .collect(),
                    Combinator::Or,
                ),
            };
            let group = ConditionGroup::new(conditions, combinator);
            let decision = rewrite::decide(&group, options.rewrite_plain_or);
            Accumulator::default().absorb(rewrite::apply(decision, group.conditions))
        }
        Tier::AndDominant => set.groups.iter().fold(Accumulator::default(), |acc, group| {
            let collapsed = if group.combinator == Combinator::Or {
                rewrite::collapse_disjunction(group.conditions.clone())
            } else {
                Collapsed {
                    conditions: group.conditions.clone(),
                    combinator: Combinator::And,
                    rewritten: false,
                }
            };
            acc.absorb(collapsed)
        }),
        Tier::OrDominant => {
            let offending = set.groups.iter().position(is_conjunctive).unwrap_or_default();
            let group = &set.groups[offending];
            let reason = if group.is_conjunction() {
                format!(
                    "OR over groups where group {offending} is an AND of {} conditions; \
                     an OR of conjunctions has no single-clause form",
                    group.len()
                )
            } else {
                format!(
                    "OR over groups where group {offending} has a negated member; \
                     its exclusions cannot be ORed with the other groups in a single clause"
                )
            };
            return Err(CompileError::UnsupportedShape { tier, reason });
        }
    };

    Ok(acc.finish(tier))
}

/// Explicit state threaded through flattening.
#[derive(Debug, Default)]
struct Accumulator {
    conditions: Vec<Condition>,
    combinator: Option<Combinator>,
    rewrites: usize,
}

impl Accumulator {
    fn absorb(mut self, collapsed: Collapsed) -> Self {
        self.conditions.extend(collapsed.conditions);
        // Conjunction wins as soon as any step produced one with siblings.
        self.combinator = Some(match (self.combinator, collapsed.combinator) {
            (None, c) => c,
            (Some(Combinator::Or), Combinator::Or) => Combinator::Or,
            _ => Combinator::And,
        });
        if collapsed.rewritten {
            self.rewrites += 1;
        }
        self
    }

    fn finish(self, tier: Tier) -> Flattened {
        let combinator = match (tier, self.combinator) {
            (Tier::AndDominant, _) => Combinator::And,
            (_, Some(c)) => c,
            (_, None) => Combinator::And,
        };
        Flattened {
            tier,
            conditions: self.conditions,
            combinator,
            rewrites: self.rewrites,
        }
    }
}
