//! Disjunction rewrite (OR-to-regex).
//!
//! The engine's native `or` needs every branch to agree on its free variables
//! and evaluates each branch separately; three or more branches get slow and
//! the variable bookkeeping is easy to get wrong. For matching purposes an OR
//! of positive conditions over the same field is equivalent to one pattern
//! that alternates their fragments, which the engine evaluates as one scan.
//!
//! Policy (see [`decide`]):
//! - AND groups are never rewritten; each conjunct stays independently
//!   evaluable.
//! - A plain OR (no negated member) is kept as an explicit disjunction unless
//!   the caller opts into `rewrite_plain_or`.
//! - An OR with negated members reads as "any of the positives, none of the
//!   negatives": two or more positives collapse into one pattern, negatives
//!   stay individually negated, and the result is a conjunction.

use crate::model::{Combinator, Condition, ConditionGroup, ConditionKind, MatchMode};
use crate::pattern::{self, CASE_INSENSITIVE_FLAG};

/// Collapse OR-combined positive conditions into one pattern condition.
///
/// Returns `None` for fewer than two conditions: there is nothing to merge.
/// Expansion must already be folded into each input's value; the synthetic
/// condition carries no expansion tag.
pub fn rewrite(conditions: &[Condition]) -> Option<Condition> {
    if conditions.len() < 2 {
        return None;
    }
    debug_assert!(
        conditions.iter().all(|c| !c.negate),
        "only positive conditions can be merged into one alternation"
    );
    let body = pattern::alternation(conditions.iter().map(pattern::generate));
    Some(Condition {
        kind: ConditionKind::Pattern,
        value: format!("{CASE_INSENSITIVE_FLAG}{body}"),
        match_mode: MatchMode::Pattern,
        negate: false,
        weight: 1.0,
        semantic_expansion: None,
    })
}

/// What to do with one group's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteDecision {
    /// AND group: keep every conjunct.
    KeepConjunction,
    /// OR group without negation: keep as an explicit disjunction.
    KeepDisjunction,
    /// Merge the positive members into one pattern; negatives become
    /// conjoined exclusions.
    RewritePositives,
    /// Only one positive member: nothing to merge, negatives become
    /// conjoined exclusions.
    SplitExclusions,
}

/// Decide how a standalone group is compiled.
pub fn decide(group: &ConditionGroup, rewrite_plain_or: bool) -> RewriteDecision {
    if group.combinator == Combinator::And {
        return RewriteDecision::KeepConjunction;
    }
    let positives = group.conditions.iter().filter(|c| !c.negate).count();
    if !group.has_negation() {
        if rewrite_plain_or && positives >= 2 {
            return RewriteDecision::RewritePositives;
        }
        return RewriteDecision::KeepDisjunction;
    }
    if positives >= 2 {
        RewriteDecision::RewritePositives
    } else {
        RewriteDecision::SplitExclusions
    }
}

/// Result of applying the policy to one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Collapsed {
    pub conditions: Vec<Condition>,
    pub combinator: Combinator,
    pub rewritten: bool,
}

/// Apply a decision to `conditions` (the members of an OR or AND group).
pub fn apply(decision: RewriteDecision, conditions: Vec<Condition>) -> Collapsed {
    match decision {
        RewriteDecision::KeepConjunction => Collapsed {
            conditions,
            combinator: Combinator::And,
            rewritten: false,
        },
        RewriteDecision::KeepDisjunction => Collapsed {
            conditions,
            combinator: Combinator::Or,
            rewritten: false,
        },
        RewriteDecision::RewritePositives | RewriteDecision::SplitExclusions => {
            split_exclusions(conditions)
        }
    }
}

/// Force an OR group into conjunctive form, as needed when it sits under an
/// AND. A single-member group comes back untouched.
pub fn collapse_disjunction(conditions: Vec<Condition>) -> Collapsed {
    if conditions.len() < 2 {
        return Collapsed {
            conditions,
            combinator: Combinator::And,
            rewritten: false,
        };
    }
    split_exclusions(conditions)
}

fn split_exclusions(conditions: Vec<Condition>) -> Collapsed {
    let (positives, negatives): (Vec<_>, Vec<_>) =
        conditions.into_iter().partition(|c| !c.negate);

    let mut out = Vec::with_capacity(negatives.len() + 1);
    let rewritten = match rewrite(&positives) {
        Some(synthetic) => {
            tracing::debug!(
                merged = positives.len(),
                exclusions = negatives.len(),
                "collapsed OR members into one pattern clause"
            );
            out.push(synthetic);
            true
        }
        None => {
            out.extend(positives);
            false
        }
    };
    out.extend(negatives);

    Collapsed {
        conditions: out,
        combinator: Combinator::And,
        rewritten,
    }
}
