//! Typed Datalog clause IR and its text rendering.
//!
//! Queries are assembled as an ordered list of [`Clause`] nodes and rendered
//! once at the end. Nothing upstream concatenates query text, so appending a
//! constraint (scope injection, journal exclusion) is a `push`, not a search
//! through rendered text.
//!
//! Rendering targets the Datascript dialect:
//!
//! ```text
//! [:find ?b-uuid ?content
//!  :where
//!  [?b :block/content ?content]
//!  [(re-pattern "(?i).*AI.*") ?re0]
//!  [(re-find ?re0 ?content)]]
//! ```
//!
//! When rules are required the query is wrapped in the map form
//! `{:query [...] :rules [...]}` so the text stays self-contained.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Outliner graph attributes the compiler emits.
pub mod attr {
    pub const CONTENT: &str = ":block/content";
    pub const UUID: &str = ":block/uuid";
    pub const PAGE: &str = ":block/page";
    pub const PARENT: &str = ":block/parent";
    pub const ORIGINAL_NAME: &str = ":block/original-name";
    pub const JOURNAL: &str = ":block/journal?";
}

/// A logic variable. Always rendered with its leading `?`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Var(String);

impl Var {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.starts_with('?') {
            Var(name.to_string())
        } else {
            Var(format!("?{name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(Var),
    Str(String),
    Bool(bool),
    /// A literal set of strings, `#{"a" "b"}`.
    StrSet(BTreeSet<String>),
}

impl Term {
    fn render(&self) -> String {
        match self {
            Term::Var(v) => v.to_string(),
            Term::Str(s) => string_lit(s),
            Term::Bool(b) => b.to_string(),
            Term::StrSet(items) => {
                let parts = items.iter().map(|s| string_lit(s)).collect::<Vec<_>>();
                format!("#{{{}}}", parts.join(" "))
            }
        }
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Var(v)
    }
}

impl From<&Var> for Term {
    fn from(v: &Var) -> Self {
        Term::Var(v.clone())
    }
}

/// Function call used in bindings and predicates: `(f a b)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub func: String,
    pub args: Vec<Term>,
}

impl Call {
    pub fn new(func: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            func: func.into(),
            args,
        }
    }

    fn render(&self) -> String {
        let mut out = format!("({}", self.func);
        for a in &self.args {
            out.push(' ');
            out.push_str(&a.render());
        }
        out.push(')');
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `[?e :attr value]`
    Data {
        entity: Var,
        attr: String,
        value: Term,
    },
    /// `[(f args) ?out]`
    Binding { call: Call, out: Var },
    /// `[(f args)]`
    Predicate(Call),
    /// `(or-join [?v ...] b1 b2 ...)`
    OrJoin { vars: Vec<Var>, branches: Vec<Clause> },
    /// `(not c1 c2 ...)`
    Not(Vec<Clause>),
    /// `(rule ?a ?b)`
    RuleCall { name: String, args: Vec<Var> },
}

impl Clause {
    pub fn data(entity: &Var, attr: &str, value: impl Into<Term>) -> Self {
        Clause::Data {
            entity: entity.clone(),
            attr: attr.to_string(),
            value: value.into(),
        }
    }

    pub fn binding(call: Call, out: &Var) -> Self {
        Clause::Binding {
            call,
            out: out.clone(),
        }
    }

    pub fn rule(name: &str, args: &[&Var]) -> Self {
        Clause::RuleCall {
            name: name.to_string(),
            args: args.iter().map(|v| (*v).clone()).collect(),
        }
    }

    /// Every variable mentioned by the clause, nested clauses included.
    pub fn vars(&self) -> BTreeSet<Var> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<Var>) {
        fn term(t: &Term, out: &mut BTreeSet<Var>) {
            if let Term::Var(v) = t {
                out.insert(v.clone());
            }
        }
        match self {
            Clause::Data { entity, value, .. } => {
                out.insert(entity.clone());
                term(value, out);
            }
            Clause::Binding { call, out: o } => {
                call.args.iter().for_each(|a| term(a, out));
                out.insert(o.clone());
            }
            Clause::Predicate(call) => call.args.iter().for_each(|a| term(a, out)),
            Clause::Not(cs) => cs.iter().for_each(|c| c.collect_vars(out)),
            Clause::OrJoin { vars, branches } => {
                out.extend(vars.iter().cloned());
                branches.iter().for_each(|c| c.collect_vars(out));
            }
            Clause::RuleCall { args, .. } => out.extend(args.iter().cloned()),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Clause::Data {
                entity,
                attr,
                value,
            } => format!("[{entity} {attr} {}]", value.render()),
            Clause::Binding { call, out } => format!("[{} {out}]", call.render()),
            Clause::Predicate(call) => format!("[{}]", call.render()),
            Clause::OrJoin { vars, branches } => {
                let vars = vars.iter().map(Var::to_string).collect::<Vec<_>>();
                format!("(or-join [{}] {})", vars.join(" "), render_seq(branches))
            }
            Clause::Not(cs) => format!("(not {})", render_seq(cs)),
            Clause::RuleCall { name, args } => {
                let args = args.iter().map(Var::to_string).collect::<Vec<_>>();
                format!("({name} {})", args.join(" "))
            }
        }
    }
}

fn render_seq(cs: &[Clause]) -> String {
    cs.iter().map(Clause::render).collect::<Vec<_>>().join(" ")
}

/// A rule definition; several bodies under one head form a union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDef {
    pub name: String,
    pub params: Vec<Var>,
    pub bodies: Vec<Vec<Clause>>,
}

impl RuleDef {
    fn render_bodies(&self) -> Vec<String> {
        let params = self
            .params
            .iter()
            .map(Var::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.bodies
            .iter()
            .map(|body| format!("[({} {params}) {}]", self.name, render_seq(body)))
            .collect()
    }
}

/// A complete query: result variables, clause block, optional rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatalogQuery {
    pub find: Vec<Var>,
    pub where_clauses: Vec<Clause>,
    pub rules: Vec<RuleDef>,
}

impl DatalogQuery {
    pub fn new(find: Vec<Var>) -> Self {
        Self {
            find,
            where_clauses: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn push(&mut self, clause: Clause) {
        self.where_clauses.push(clause);
    }

    pub fn extend(&mut self, clauses: impl IntoIterator<Item = Clause>) {
        self.where_clauses.extend(clauses);
    }

    /// Register a rule once; repeated registrations by name are ignored.
    pub fn add_rule(&mut self, rule: RuleDef) {
        if !self.rules.iter().any(|r| r.name == rule.name) {
            self.rules.push(rule);
        }
    }

    /// True when some top-level clause mentions `var`.
    pub fn mentions(&self, var: &Var) -> bool {
        self.where_clauses.iter().any(|c| c.vars().contains(var))
    }

    pub fn render(&self) -> String {
        let find = self
            .find
            .iter()
            .map(Var::to_string)
            .collect::<Vec<_>>()
            .join(" ");

        let mut body = format!("[:find {find}");
        if !self.rules.is_empty() {
            body.push_str("\n :in $ %");
        }
        body.push_str("\n :where");
        for c in &self.where_clauses {
            body.push_str("\n ");
            body.push_str(&c.render());
        }
        body.push(']');

        if self.rules.is_empty() {
            return body;
        }

        let rules = self
            .rules
            .iter()
            .flat_map(RuleDef::render_bodies)
            .collect::<Vec<_>>()
            .join("\n         ");
        format!("{{:query {body}\n :rules [{rules}]}}")
    }
}

impl fmt::Display for DatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// EDN string literal.
pub fn string_lit(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
