//! Request → query text.
//!
//! The pipeline is synchronous and pure: flatten each group set, build the
//! clause sequence (with the hierarchy join when asked), inject scope, render
//! once. Diagnostics from every stage are carried on the result.

use serde::Serialize;

use crate::clause::{self, BuiltQuery};
use crate::config::CompilerConfig;
use crate::datalog::DatalogQuery;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::CompileError;
use crate::flatten::{self, FlattenOptions, Flattened, Tier};
use crate::model::GroupSet;
use crate::request::{QueryRequest, QueryRequestV1, QueryShape};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// Self-contained query text for the engine.
    pub text: String,
    /// Labels of the `:find` variables, in order.
    pub columns: Vec<String>,
    /// Worst tier among the compiled group sets.
    pub tier: Tier,
    /// OR groups collapsed into pattern clauses.
    pub rewrites: usize,
    pub diagnostics: Diagnostics,
    #[serde(skip)]
    pub query: DatalogQuery,
}

fn flatten_checked(
    set: &GroupSet,
    config: &CompilerConfig,
    side: &str,
) -> Result<Flattened, CompileError> {
    let flattened = flatten::flatten(
        set,
        FlattenOptions {
            rewrite_plain_or: config.rewrite_plain_or,
        },
    )?;
    if flattened.conditions.is_empty() {
        return Err(CompileError::empty(side));
    }
    Ok(flattened)
}

/// Compile a validated request.
pub fn compile(request: &QueryRequest, config: &CompilerConfig) -> Result<CompiledQuery, CompileError> {
    let count = request.condition_count();
    if count > config.max_conditions {
        return Err(CompileError::TooManyConditions {
            count,
            max: config.max_conditions,
        });
    }

    let (built, tier, rewrites) = match &request.shape {
        QueryShape::Groups(set) => {
            let flattened = flatten_checked(set, config, "")?;
            let built = clause::build(request.entity, &flattened, &request.scope, config);
            (built, flattened.tier, flattened.rewrites)
        }
        QueryShape::Hierarchy(relation) => {
            let left = flatten_checked(&relation.left, config, "hierarchy.left")?;
            let right = flatten_checked(&relation.right, config, "hierarchy.right")?;
            let built = clause::build_hierarchy(
                &left,
                relation.operator,
                &right,
                &request.scope,
                config,
            );
            let tier = worst(left.tier, right.tier);
            (built, tier, left.rewrites + right.rewrites)
        }
    };

    let BuiltQuery {
        query,
        columns,
        mut diagnostics,
    } = built;
    if rewrites > 0 {
        diagnostics.note(
            DiagnosticCode::DisjunctionRewritten,
            format!("collapsed {rewrites} OR group(s) into pattern clauses"),
        );
    }

    let text = query.render();
    tracing::debug!(%tier, rewrites, columns = columns.len(), "compiled query");

    Ok(CompiledQuery {
        text,
        columns,
        tier,
        rewrites,
        diagnostics,
        query,
    })
}

fn worst(a: Tier, b: Tier) -> Tier {
    if a.number() >= b.number() {
        a
    } else {
        b
    }
}

/// Validate then compile; boundary diagnostics come first in the result.
pub fn compile_request_v1(
    request: &QueryRequestV1,
    config: &CompilerConfig,
) -> Result<CompiledQuery, CompileError> {
    let (request, mut diagnostics) = request.validate(config)?;
    let mut compiled = compile(&request, config)?;
    diagnostics.extend(std::mem::take(&mut compiled.diagnostics));
    compiled.diagnostics = diagnostics;
    Ok(compiled)
}

pub fn compile_json(text: &str, config: &CompilerConfig) -> Result<CompiledQuery, CompileError> {
    compile_request_v1(&QueryRequestV1::from_json_str(text)?, config)
}

/// Tier of every group set a request carries, without compiling it.
pub fn classify_request(request: &QueryRequest) -> Vec<(String, Tier)> {
    match &request.shape {
        QueryShape::Groups(set) => vec![("query".to_string(), flatten::classify(set))],
        QueryShape::Hierarchy(rel) => vec![
            ("left".to_string(), flatten::classify(&rel.left)),
            ("right".to_string(), flatten::classify(&rel.right)),
        ],
    }
}
