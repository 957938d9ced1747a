//! Scope injection: restrict a query to known block/page identifiers.
//!
//! Two entry points:
//! - [`inject_scope`] appends clauses to a [`DatalogQuery`] under
//!   construction. This is what the compiler uses; it cannot miss its target.
//! - [`inject_text`] patches externally authored query text. It is
//!   best-effort: if the `:where` block or the target variable cannot be
//!   found, the text comes back unchanged together with a diagnostic.
//!
//! One identifier becomes an equality test, several become a set-membership
//! test against the bound identifier variable:
//!
//! ```text
//! [(= ?b-id "6571…")]
//! [(contains? #{"6571…" "6572…"} ?b-id)]
//! ```

use std::collections::BTreeSet;

use crate::datalog::{attr, Call, Clause, DatalogQuery, Term, Var};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::model::ScopeConstraint;

/// Default entity variables of compiled queries, also assumed by
/// [`inject_text`].
pub const BLOCK_VAR: &str = "?b";
pub const PAGE_VAR: &str = "?p";

/// Which variables in the query the scope applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTarget {
    /// Block entity; `None` for page queries.
    pub block: Option<Var>,
    /// Page (container) entity.
    pub page: Var,
}

impl ScopeTarget {
    pub fn blocks(block: Var, page: Var) -> Self {
        Self {
            block: Some(block),
            page,
        }
    }

    pub fn pages(page: Var) -> Self {
        Self { block: None, page }
    }
}

impl Default for ScopeTarget {
    fn default() -> Self {
        Self::blocks(Var::new(BLOCK_VAR), Var::new(PAGE_VAR))
    }
}

/// `?x` → `?x-uuid`, the variable bound to the entity's uuid.
pub fn uuid_var(entity: &Var) -> Var {
    Var::new(format!("{}-uuid", entity.as_str()))
}

/// `?x` → `?x-id`, the uuid rendered as a string for comparisons.
pub fn id_var(entity: &Var) -> Var {
    Var::new(format!("{}-id", entity.as_str()))
}

/// Equality for one identifier, membership for several. `None` when `ids` is
/// empty.
pub fn membership_clause(id: &Var, ids: &[String]) -> Option<Clause> {
    let unique: BTreeSet<String> = ids
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    match unique.len() {
        0 => None,
        1 => {
            let only = unique.into_iter().next()?;
            Some(Clause::Predicate(Call::new(
                "=",
                vec![id.into(), Term::Str(only)],
            )))
        }
        _ => Some(Clause::Predicate(Call::new(
            "contains?",
            vec![Term::StrSet(unique), id.into()],
        ))),
    }
}

/// Clauses binding `?x-id` from `?x`.
fn id_binding(entity: &Var) -> [Clause; 2] {
    let uuid = uuid_var(entity);
    [
        Clause::data(entity, attr::UUID, &uuid),
        Clause::binding(Call::new("str", vec![(&uuid).into()]), &id_var(entity)),
    ]
}

fn restrict(query: &mut DatalogQuery, entity: &Var, ids: &[String]) {
    let id = id_var(entity);
    let Some(test) = membership_clause(&id, ids) else {
        return;
    };
    if !query.mentions(&id) {
        let [uuid_clause, str_clause] = id_binding(entity);
        if !query.mentions(&uuid_var(entity)) {
            query.push(uuid_clause);
        }
        query.push(str_clause);
    }
    query.push(test);
}

/// Journal pages carry `:block/journal? true`.
pub fn journal_exclusion(page: &Var) -> Clause {
    Clause::Not(vec![Clause::data(page, attr::JOURNAL, Term::Bool(true))])
}

/// Append scope constraints to `query`. Empty identifier sets are a no-op.
pub fn inject_scope(
    query: &mut DatalogQuery,
    target: &ScopeTarget,
    scope: &ScopeConstraint,
) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    if scope.is_empty() {
        return diagnostics;
    }

    match &target.block {
        Some(block) => restrict(query, block, &scope.block_ids),
        None if !scope.block_ids.is_empty() => diagnostics.note(
            DiagnosticCode::InjectionTargetNotFound,
            format!(
                "page query has no block variable; ignoring {} block id(s)",
                scope.block_ids.len()
            ),
        ),
        None => {}
    }
    restrict(query, &target.page, &scope.page_ids);

    if scope.exclude_journals {
        query.push(journal_exclusion(&target.page));
    }
    diagnostics
}

/// Patch query text in place of a structural injection.
///
/// Assumes the conventional `?b` (block) and `?p` (page) entity variables.
pub fn inject_text(
    text: &str,
    block_ids: &[String],
    page_ids: &[String],
) -> (String, Option<Diagnostic>) {
    if block_ids.is_empty() && page_ids.is_empty() {
        return (text.to_string(), None);
    }

    let Some(close) = where_block_end(text) else {
        return (
            text.to_string(),
            Some(Diagnostic::warning(
                DiagnosticCode::InjectionTargetNotFound,
                "no `:where` clause block found; query left unchanged",
            )),
        );
    };

    let mut added: Vec<Clause> = Vec::new();
    for (var, ids) in [(BLOCK_VAR, block_ids), (PAGE_VAR, page_ids)] {
        let entity = Var::new(var);
        let id = id_var(&entity);
        let Some(test) = membership_clause(&id, ids) else {
            continue;
        };
        if !contains_var(text, &entity) {
            return (
                text.to_string(),
                Some(Diagnostic::warning(
                    DiagnosticCode::InjectionTargetNotFound,
                    format!("variable {entity} is not bound by the query; query left unchanged"),
                )),
            );
        }
        if !contains_var(text, &id) {
            let [uuid_clause, str_clause] = id_binding(&entity);
            if !contains_var(text, &uuid_var(&entity)) {
                added.push(uuid_clause);
            }
            added.push(str_clause);
        }
        added.push(test);
    }

    let mut out = String::with_capacity(text.len() + added.len() * 48);
    out.push_str(&text[..close]);
    for c in &added {
        out.push_str("\n ");
        out.push_str(&c.render());
    }
    out.push_str(&text[close..]);
    (out, None)
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || "-_?!*+./<>=".contains(c)
}

/// Occurrence of `var` as a whole symbol, outside string literals.
fn contains_var(text: &str, var: &Var) -> bool {
    let needle = var.as_str();
    let mut in_string = false;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if text[i..].starts_with(needle) && !prev.is_some_and(is_symbol_char) {
            let next = text[i + needle.len()..].chars().next();
            if !next.is_some_and(is_symbol_char) {
                return true;
            }
        }
        prev = Some(c);
    }
    false
}

/// Byte offset of the `]` closing the vector that holds `:where`.
fn where_block_end(text: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    let mut after_where = false;
    let mut depth: usize = 0;

    for (i, c) in text.char_indices() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ':' if !after_where && text[i..].starts_with(":where") => {
                let next = text[i + ":where".len()..].chars().next();
                if !next.is_some_and(is_symbol_char) {
                    after_where = true;
                    depth = 0;
                }
            }
            '[' | '(' | '{' if after_where => depth += 1,
            ']' | ')' | '}' if after_where => {
                if depth == 0 {
                    return (c == ']').then_some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}
