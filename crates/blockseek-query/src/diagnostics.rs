//! Non-fatal compiler diagnostics.
//!
//! Everything that degrades a query without invalidating it (a skipped
//! condition, a kind fallback, an injection that could not find its target)
//! is reported here instead of as an error. Each diagnostic is also emitted
//! through `tracing` at the point it is recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// A condition had an empty value and was dropped.
    EmptyValue,
    /// A condition's kind was not recognized; it was treated as text.
    UnknownKind,
    /// A group ended up with no usable conditions and was dropped.
    EmptyGroup,
    /// A raw pattern does not compile locally; the engine will likely reject it.
    SuspectPattern,
    /// Scope injection could not locate its target.
    InjectionTargetNotFound,
    /// Semantic expansion failed or timed out.
    ExpansionUnavailable,
    /// An OR group was collapsed into one pattern clause.
    DisjunctionRewritten,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::EmptyValue => "EmptyValue",
            DiagnosticCode::UnknownKind => "UnknownKind",
            DiagnosticCode::EmptyGroup => "EmptyGroup",
            DiagnosticCode::SuspectPattern => "SuspectPattern",
            DiagnosticCode::InjectionTargetNotFound => "InjectionTargetNotFound",
            DiagnosticCode::ExpansionUnavailable => "ExpansionUnavailable",
            DiagnosticCode::DisjunctionRewritten => "DisjunctionRewritten",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(code = code.as_str(), "{message}");
        Self {
            severity: Severity::Warning,
            code,
            message,
        }
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::debug!(code = code.as_str(), "{message}");
        Self {
            severity: Severity::Info,
            code,
            message,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "{level}[{}]: {}", self.code.as_str(), self.message)
    }
}

/// Ordered collection of diagnostics gathered while compiling one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn warn(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        self.push(Diagnostic::warning(code, message));
    }

    pub fn note(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        self.push(Diagnostic::info(code, message));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_warning())
    }

    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.0.iter().any(|d| d.code == code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
