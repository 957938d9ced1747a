//! Blockseek query compiler
//!
//! Compiles structured boolean queries over an outliner graph into
//! Datascript-style Datalog:
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌───────┐   ┌────────┐
//! │ request  │──►│expansion │──►│  flatten  │──►│ clause  │──►│ scope │──►│ engine │
//! │ (JSON)   │   │ (async)  │   │ + rewrite │   │ builder │   │       │   │ (async)│
//! └──────────┘   └──────────┘   └───────────┘   └─────────┘   └───────┘   └────────┘
//! ```
//!
//! ## Key points
//!
//! - **Tiers**: group sets are classified before compiling. OR-dominant
//!   shapes (an OR of conjunctions) are rejected, never approximated.
//! - **OR-to-regex**: an OR of positive conditions on one field collapses
//!   into a single pattern clause.
//! - **Typed IR**: clauses are built as [`datalog::Clause`] values and
//!   rendered once, so scope injection is structural.
//! - **Diagnostics**: recoverable problems travel with the result; only
//!   untranslatable shapes are errors.
//!
//! ```
//! use blockseek_query::{compile_json, CompilerConfig};
//!
//! let compiled = compile_json(
//!     r#"{"conditions":[{"type":"text","value":"AI"},{"type":"page_reference","value":"ML"}],
//!         "combinator":"OR"}"#,
//!     &CompilerConfig::default(),
//! )
//! .unwrap();
//! assert!(compiled.text.contains("or-join"));
//! ```

pub mod clause;
pub mod compile;
pub mod config;
pub mod datalog;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod expansion;
pub mod flatten;
pub mod hierarchy;
pub mod model;
pub mod pattern;
pub mod request;
pub mod rewrite;
pub mod schema;
pub mod scope;

pub use compile::{classify_request, compile, compile_json, compile_request_v1, CompiledQuery};
pub use config::{CompilerConfig, ConfigError};
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use engine::{EngineError, QueryEngine, Row, SearchError, SearchOutcome, Searcher};
pub use error::CompileError;
pub use expansion::{expand_group_set, expand_request, ExpansionOptions, TermExpander};
pub use flatten::{classify, flatten, FlattenOptions, Flattened, Tier};
pub use hierarchy::{HierarchyOperator, Strength};
pub use model::{
    Combinator, Condition, ConditionGroup, ConditionKind, EntityKind, GroupSet,
    HierarchyRelation, MatchMode, ScopeConstraint,
};
pub use request::{QueryRequest, QueryRequestV1, QueryShape, QUERY_REQUEST_V1_VERSION};
pub use schema::query_request_v1_json_schema;
pub use scope::{inject_scope, inject_text, ScopeTarget};
