//! Clause builder: flattened conditions → typed clause sequence.
//!
//! Every condition becomes a pattern binding plus a match predicate on the
//! entity's text field:
//!
//! ```text
//! [(re-pattern "(?i).*AI.*") ?re0]
//! [(re-find ?re0 ?content)]
//! ```
//!
//! AND concatenates. OR hoists all bindings and puts only the match
//! predicates inside one `or-join`, so every branch shares the same bound
//! variables. Negation wraps the match predicate in `not`.
//!
//! Hierarchy queries compile each side with its own variable prefix (`?l-`,
//! `?r-`) and join the two entity variables with the operator's clause.

use crate::config::CompilerConfig;
use crate::datalog::{attr, Call, Clause, DatalogQuery, Term, Var};
use crate::diagnostics::Diagnostics;
use crate::flatten::Flattened;
use crate::hierarchy::HierarchyOperator;
use crate::model::{Combinator, Condition, EntityKind, ScopeConstraint};
use crate::pattern;
use crate::scope::{self, ScopeTarget};

/// Variable naming for one side of a query.
///
/// The root scope yields `?b`, `?re0`, …; a side scope with prefix `l` yields
/// `?l-b`, `?l-re0`, …
#[derive(Debug, Clone)]
pub struct VarScope {
    prefix: String,
    next_pattern: usize,
}

impl VarScope {
    pub fn root() -> Self {
        Self {
            prefix: String::new(),
            next_pattern: 0,
        }
    }

    pub fn side(prefix: &str) -> Self {
        Self {
            prefix: format!("{prefix}-"),
            next_pattern: 0,
        }
    }

    pub fn var(&self, name: &str) -> Var {
        Var::new(format!("{}{name}", self.prefix))
    }

    /// A fresh pattern variable, numbered in emission order.
    pub fn next_pattern_var(&mut self) -> Var {
        let v = self.var(&format!("re{}", self.next_pattern));
        self.next_pattern += 1;
        v
    }

    /// Column label for a result variable, `left_` / `right_` for sides.
    fn column(&self, name: &str) -> String {
        match self.prefix.as_str() {
            "" => name.to_string(),
            "l-" => format!("left_{name}"),
            "r-" => format!("right_{name}"),
            other => format!("{}_{name}", other.trim_end_matches('-')),
        }
    }
}

/// Variables and base clauses for one entity.
#[derive(Debug, Clone)]
struct Shape {
    entity: Var,
    page: Var,
    field: Var,
    find: Vec<Var>,
    columns: Vec<String>,
    base: Vec<Clause>,
}

fn shape(kind: EntityKind, vars: &VarScope) -> Shape {
    match kind {
        EntityKind::Block => {
            let b = vars.var("b");
            let p = vars.var("p");
            let content = vars.var("content");
            let uuid = scope::uuid_var(&b);
            let page_name = vars.var("page-name");
            Shape {
                base: vec![
                    Clause::data(&b, attr::CONTENT, &content),
                    Clause::data(&b, attr::UUID, &uuid),
                    Clause::data(&b, attr::PAGE, &p),
                    Clause::data(&p, attr::ORIGINAL_NAME, &page_name),
                ],
                find: vec![uuid, content.clone(), page_name],
                columns: vec![
                    vars.column("block_uuid"),
                    vars.column("content"),
                    vars.column("page_name"),
                ],
                entity: b,
                page: p,
                field: content,
            }
        }
        EntityKind::Page => {
            let p = vars.var("p");
            let title = vars.var("title");
            let uuid = scope::uuid_var(&p);
            Shape {
                base: vec![
                    Clause::data(&p, attr::ORIGINAL_NAME, &title),
                    Clause::data(&p, attr::UUID, &uuid),
                ],
                find: vec![uuid, title.clone()],
                columns: vec![vars.column("page_uuid"), vars.column("title")],
                entity: p.clone(),
                page: p,
                field: title,
            }
        }
    }
}

/// Binding and match predicate for one condition.
fn condition_clauses(
    condition: &Condition,
    field: &Var,
    re: &Var,
    case_insensitive: bool,
) -> (Clause, Clause) {
    let source = pattern::pattern_source(condition, case_insensitive);
    let binding = Clause::binding(Call::new("re-pattern", vec![Term::Str(source)]), re);
    let test = Clause::Predicate(Call::new("re-find", vec![re.into(), field.into()]));
    let test = if condition.negate {
        Clause::Not(vec![test])
    } else {
        test
    };
    (binding, test)
}

/// Pattern clauses for a flattened condition list on `field`.
fn match_clauses(
    flattened: &Flattened,
    field: &Var,
    vars: &mut VarScope,
    config: &CompilerConfig,
) -> Vec<Clause> {
    let pairs = flattened
        .conditions
        .iter()
        .map(|c| {
            let re = vars.next_pattern_var();
            let (binding, test) = condition_clauses(c, field, &re, config.case_insensitive);
            (re, binding, test)
        })
        .collect::<Vec<_>>();

    if flattened.combinator == Combinator::And || pairs.len() < 2 {
        return pairs
            .into_iter()
            .flat_map(|(_, binding, test)| [binding, test])
            .collect();
    }

    let mut join_vars = vec![field.clone()];
    let mut out = Vec::with_capacity(pairs.len() + 1);
    let mut branches = Vec::with_capacity(pairs.len());
    for (re, binding, test) in pairs {
        join_vars.push(re);
        out.push(binding);
        branches.push(test);
    }
    out.push(Clause::OrJoin {
        vars: join_vars,
        branches,
    });
    out
}

/// A query ready for rendering, with its result column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub query: DatalogQuery,
    /// One label per `:find` variable, in order.
    pub columns: Vec<String>,
    pub diagnostics: Diagnostics,
}

fn effective_scope(scope: &ScopeConstraint, config: &CompilerConfig) -> ScopeConstraint {
    ScopeConstraint {
        exclude_journals: scope.exclude_journals || config.exclude_journals,
        ..scope.clone()
    }
}

/// Build a single-sided query.
pub fn build(
    entity: EntityKind,
    flattened: &Flattened,
    scope: &ScopeConstraint,
    config: &CompilerConfig,
) -> BuiltQuery {
    let mut vars = VarScope::root();
    let shape = shape(entity, &vars);

    let mut query = DatalogQuery::new(shape.find.clone());
    query.extend(shape.base.iter().cloned());
    query.extend(match_clauses(flattened, &shape.field, &mut vars, config));

    let target = match entity {
        EntityKind::Block => ScopeTarget::blocks(shape.entity.clone(), shape.page.clone()),
        EntityKind::Page => ScopeTarget::pages(shape.page.clone()),
    };
    let diagnostics = scope::inject_scope(&mut query, &target, &effective_scope(scope, config));

    tracing::debug!(
        ?entity,
        conditions = flattened.conditions.len(),
        combinator = %flattened.combinator,
        clauses = query.where_clauses.len(),
        "built query"
    );

    BuiltQuery {
        query,
        columns: shape.columns,
        diagnostics,
    }
}

/// Build a block query relating two independently matched sides.
///
/// Scope applies to the left side, whose blocks are the primary result.
pub fn build_hierarchy(
    left: &Flattened,
    operator: HierarchyOperator,
    right: &Flattened,
    scope: &ScopeConstraint,
    config: &CompilerConfig,
) -> BuiltQuery {
    let mut left_vars = VarScope::side("l");
    let mut right_vars = VarScope::side("r");
    let l = shape(EntityKind::Block, &left_vars);
    let r = shape(EntityKind::Block, &right_vars);

    let mut find = l.find.clone();
    find.extend(r.find.iter().cloned());
    let mut columns = l.columns.clone();
    columns.extend(r.columns.iter().cloned());

    let mut query = DatalogQuery::new(find);
    query.extend(l.base.iter().cloned());
    query.extend(match_clauses(left, &l.field, &mut left_vars, config));
    query.extend(r.base.iter().cloned());
    query.extend(match_clauses(right, &r.field, &mut right_vars, config));

    let (relation, rule) = operator.relation(&l.entity, &r.entity);
    query.push(relation);
    if let Some(rule) = rule {
        query.add_rule(rule);
    }

    let target = ScopeTarget::blocks(l.entity.clone(), l.page.clone());
    let diagnostics = scope::inject_scope(&mut query, &target, &effective_scope(scope, config));

    tracing::debug!(
        %operator,
        strength = ?operator.strength(),
        left_conditions = left.conditions.len(),
        right_conditions = right.conditions.len(),
        "built hierarchy query"
    );

    BuiltQuery {
        query,
        columns,
        diagnostics,
    }
}
