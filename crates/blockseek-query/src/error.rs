//! Errors that stop a compilation.
//!
//! Only shapes the compiler cannot translate without changing their meaning
//! are errors; everything recoverable is a [`crate::diagnostics::Diagnostic`].

use thiserror::Error;

use crate::flatten::Tier;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The group set cannot be compiled into a single clause block.
    #[error("unsupported query shape ({tier}): {reason}")]
    UnsupportedShape { tier: Tier, reason: String },

    /// Hierarchy operator outside the closed operator set.
    #[error("unknown hierarchy operator '{operator}' (expected one of: {expected})")]
    UnknownOperator { operator: String, expected: String },

    /// Every condition was dropped during validation.
    #[error("query has no usable conditions{context}")]
    EmptyQuery { context: String },

    #[error("query has {count} conditions (limit {max})")]
    TooManyConditions { count: usize, max: usize },

    #[error("unsupported request version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl CompileError {
    /// Machine-readable code, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnsupportedShape { .. } => "UnsupportedShape",
            CompileError::UnknownOperator { .. } => "UnknownOperator",
            CompileError::EmptyQuery { .. } => "EmptyQuery",
            CompileError::TooManyConditions { .. } => "TooManyConditions",
            CompileError::UnsupportedVersion { .. } => "UnsupportedVersion",
            CompileError::InvalidRequest(_) => "InvalidRequest",
        }
    }

    /// True for capability gaps (as opposed to malformed input).
    pub fn is_capability_gap(&self) -> bool {
        matches!(
            self,
            CompileError::UnsupportedShape { .. } | CompileError::UnknownOperator { .. }
        )
    }

    pub fn empty(context: impl Into<String>) -> Self {
        let context = context.into();
        CompileError::EmptyQuery {
            context: if context.is_empty() {
                context
            } else {
                format!(" in {context}")
            },
        }
    }
}
