//! Query execution and the end-to-end search pipeline.
//!
//! The engine itself lives elsewhere (an outliner's Datascript instance, an
//! HTTP API, a test double). [`Searcher`] wires validation, optional
//! expansion, compilation and execution together.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::compile::{compile, CompiledQuery};
use crate::config::CompilerConfig;
use crate::diagnostics::Diagnostics;
use crate::error::CompileError;
use crate::expansion::{expand_request, ExpansionOptions, TermExpander};
use crate::request::{QueryRequest, QueryRequestV1};

/// One positional result tuple, matching [`CompiledQuery::columns`].
pub type Row = Vec<serde_json::Value>;

pub const LITERAL_FALLBACK_ADVICE: &str =
    "retry with `text` conditions (literal matching) instead of raw patterns";

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine's matcher refused a pattern the compiler emitted.
    #[error("engine rejected a pattern: {message}; {}", LITERAL_FALLBACK_ADVICE)]
    PatternRejected { message: String },
    #[error("query timed out: {0}")]
    Timeout(String),
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine error: {0}")]
    Other(String),
}

impl EngineError {
    /// What the caller can do instead, when there is something.
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            EngineError::PatternRejected { .. } => Some(LITERAL_FALLBACK_ADVICE),
            _ => None,
        }
    }
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, EngineError>;
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: CompiledQuery,
    pub rows: Vec<Row>,
    /// Boundary, expansion and compiler diagnostics, in that order.
    pub diagnostics: Diagnostics,
}

pub struct Searcher {
    engine: Arc<dyn QueryEngine>,
    expander: Option<Arc<dyn TermExpander>>,
    config: CompilerConfig,
}

impl Searcher {
    pub fn new(engine: Arc<dyn QueryEngine>, config: CompilerConfig) -> Self {
        Self {
            engine,
            expander: None,
            config,
        }
    }

    pub fn with_expander(mut self, expander: Arc<dyn TermExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub async fn search(&self, request: &QueryRequestV1) -> Result<SearchOutcome, SearchError> {
        let (request, diagnostics) = request.validate(&self.config)?;
        self.search_validated(request, diagnostics).await
    }

    /// Search with an already validated request; `diagnostics` are prepended
    /// to the outcome's.
    pub async fn search_validated(
        &self,
        mut request: QueryRequest,
        mut diagnostics: Diagnostics,
    ) -> Result<SearchOutcome, SearchError> {
        if let Some(expander) = &self.expander {
            let expanded = expand_request(
                expander.as_ref(),
                &mut request,
                ExpansionOptions::from(&self.config),
            )
            .await;
            diagnostics.extend(expanded);
        }

        let mut query = compile(&request, &self.config)?;
        diagnostics.extend(std::mem::take(&mut query.diagnostics));
        query.diagnostics = diagnostics.clone();

        let rows = match self.engine.execute(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, tier = %query.tier, "query execution failed");
                return Err(e.into());
            }
        };
        tracing::debug!(rows = rows.len(), "query executed");

        Ok(SearchOutcome {
            query,
            rows,
            diagnostics,
        })
    }
}
