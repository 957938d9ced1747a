//! Semantic term expansion before compilation.
//!
//! Conditions tagged with a `semantic_expansion` strategy ask an external
//! service for related terms. The original value and the returned terms are
//! folded into one alternation pattern of same-kind fragments, so the rest of
//! the compiler sees an ordinary pattern condition. Expansion is best effort:
//! an error or a timeout leaves the condition as it was.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::CompilerConfig;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::model::{Condition, ConditionKind, GroupSet, MatchMode};
use crate::pattern::{self, CASE_INSENSITIVE_FLAG};
use crate::request::QueryRequest;

/// External expansion service (synonyms, embeddings, an LLM, ...).
#[async_trait]
pub trait TermExpander: Send + Sync {
    /// Terms related to `term` under `strategy`. The original term may or may
    /// not be included; duplicates are removed by the caller.
    async fn expand(&self, term: &str, strategy: &str) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy)]
pub struct ExpansionOptions {
    pub timeout: Duration,
    pub max_terms: usize,
    pub case_insensitive: bool,
}

impl From<&CompilerConfig> for ExpansionOptions {
    fn from(config: &CompilerConfig) -> Self {
        Self {
            timeout: config.expansion_timeout(),
            max_terms: config.max_expansions_per_term,
            case_insensitive: config.case_insensitive,
        }
    }
}

/// Expand every tagged condition of a request, both hierarchy sides included.
pub async fn expand_request(
    expander: &dyn TermExpander,
    request: &mut QueryRequest,
    options: ExpansionOptions,
) -> Diagnostics {
    let targets: Vec<&mut Condition> = request.conditions_mut().collect();
    expand_all(expander, targets, options).await
}

pub async fn expand_group_set(
    expander: &dyn TermExpander,
    set: &mut GroupSet,
    options: ExpansionOptions,
) -> Diagnostics {
    let targets: Vec<&mut Condition> = set.conditions_mut().collect();
    expand_all(expander, targets, options).await
}

async fn expand_all(
    expander: &dyn TermExpander,
    targets: Vec<&mut Condition>,
    options: ExpansionOptions,
) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    for condition in targets {
        let Some(strategy) = condition.semantic_expansion.take() else {
            continue;
        };
        if condition.is_raw_pattern() {
            diagnostics.note(
                DiagnosticCode::ExpansionUnavailable,
                format!("'{}' is a raw pattern; expansion skipped", condition.value),
            );
            continue;
        }

        let result = tokio::time::timeout(
            options.timeout,
            expander.expand(&condition.value, &strategy),
        )
        .await;
        let terms = match result {
            Ok(Ok(terms)) => terms,
            Ok(Err(e)) => {
                diagnostics.warn(
                    DiagnosticCode::ExpansionUnavailable,
                    format!("expansion of '{}' ({strategy}) failed: {e}", condition.value),
                );
                continue;
            }
            Err(_) => {
                diagnostics.warn(
                    DiagnosticCode::ExpansionUnavailable,
                    format!(
                        "expansion of '{}' ({strategy}) timed out after {}ms",
                        condition.value,
                        options.timeout.as_millis()
                    ),
                );
                continue;
            }
        };

        let extra = distinct_terms(&condition.value, terms, options.max_terms);
        if extra.is_empty() {
            continue;
        }
        tracing::debug!(
            term = %condition.value,
            %strategy,
            added = extra.len(),
            "expanded condition"
        );
        fold_terms(condition, &extra, options.case_insensitive);
    }
    diagnostics
}

/// Trimmed, non-empty terms other than `original`, first occurrence wins,
/// compared case-insensitively.
fn distinct_terms(original: &str, terms: Vec<String>, max: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(original.trim().to_lowercase());
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .take(max)
        .collect()
}

/// Rewrite `condition` into a pattern matching its value or any of `extra`.
fn fold_terms(condition: &mut Condition, extra: &[String], case_insensitive: bool) {
    let fragments = std::iter::once(condition.value.as_str())
        .chain(extra.iter().map(String::as_str))
        .map(|term| {
            pattern::generate(&Condition::new(condition.kind, term, condition.match_mode))
        })
        .collect::<Vec<_>>();
    let body = pattern::alternation(&fragments);
    condition.value = if case_insensitive {
        format!("{CASE_INSENSITIVE_FLAG}{body}")
    } else {
        body
    };
    condition.kind = ConditionKind::Pattern;
    condition.match_mode = MatchMode::Pattern;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConditionGroup;
    use anyhow::anyhow;
    use regex::Regex;

    struct Synonyms;

    #[async_trait]
    impl TermExpander for Synonyms {
        async fn expand(&self, term: &str, _strategy: &str) -> anyhow::Result<Vec<String>> {
            match term {
                "AI" => Ok(vec![
                    "ai".into(),
                    "machine learning".into(),
                    " ".into(),
                    "LLM".into(),
                    "machine learning".into(),
                ]),
                _ => Err(anyhow!("no synonyms for {term}")),
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl TermExpander for Slow {
        async fn expand(&self, _term: &str, _strategy: &str) -> anyhow::Result<Vec<String>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(vec!["late".into()])
        }
    }

    fn options() -> ExpansionOptions {
        ExpansionOptions::from(&CompilerConfig::default())
    }

    #[tokio::test]
    async fn expansion_folds_terms_into_a_pattern() {
        let mut set = GroupSet::single(ConditionGroup::all(vec![
            Condition::text("AI").with_expansion("synonyms"),
            Condition::text("untouched"),
        ]));
        let diags = expand_group_set(&Synonyms, &mut set, options()).await;
        assert!(diags.is_empty());

        let expanded = &set.groups[0].conditions[0];
        assert_eq!(expanded.kind, ConditionKind::Pattern);
        assert!(expanded.semantic_expansion.is_none());
        let re = Regex::new(&expanded.value).expect("expanded pattern compiles");
        assert!(re.is_match("notes on Machine Learning"));
        assert!(re.is_match("an llm demo"));
        assert!(re.is_match("AI"));
        assert!(!re.is_match("nothing"));

        assert_eq!(set.groups[0].conditions[1], Condition::text("untouched"));
    }

    #[tokio::test]
    async fn expansion_respects_max_terms() {
        let mut set = GroupSet::single(ConditionGroup::all(vec![
            Condition::text("AI").with_expansion("synonyms"),
        ]));
        let opts = ExpansionOptions {
            max_terms: 1,
            ..options()
        };
        expand_group_set(&Synonyms, &mut set, opts).await;
        let re = Regex::new(&set.groups[0].conditions[0].value).unwrap();
        assert!(re.is_match("machine learning"));
        assert!(!re.is_match("LLM"));
    }

    #[tokio::test]
    async fn failure_leaves_condition_unchanged() {
        let mut set = GroupSet::single(ConditionGroup::all(vec![
            Condition::page_ref("Rust").with_expansion("synonyms"),
        ]));
        let diags = expand_group_set(&Synonyms, &mut set, options()).await;
        assert!(diags.has_code(DiagnosticCode::ExpansionUnavailable));
        assert_eq!(set.groups[0].conditions[0], Condition::page_ref("Rust"));
    }

    #[tokio::test]
    async fn timeout_leaves_condition_unchanged() {
        let mut set = GroupSet::single(ConditionGroup::all(vec![
            Condition::text("AI").with_expansion("synonyms"),
        ]));
        let opts = ExpansionOptions {
            timeout: Duration::from_millis(20),
            ..options()
        };
        let diags = expand_group_set(&Slow, &mut set, opts).await;
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(set.groups[0].conditions[0], Condition::text("AI"));
    }

    #[tokio::test]
    async fn page_reference_expansion_keeps_reference_syntax() {
        struct One;
        #[async_trait]
        impl TermExpander for One {
            async fn expand(&self, _t: &str, _s: &str) -> anyhow::Result<Vec<String>> {
                Ok(vec!["ML".into()])
            }
        }
        let mut set = GroupSet::single(ConditionGroup::all(vec![
            Condition::page_ref("AI").with_expansion("related"),
        ]));
        expand_group_set(&One, &mut set, options()).await;
        let re = Regex::new(&set.groups[0].conditions[0].value).unwrap();
        assert!(re.is_match("see [[ML]]"));
        assert!(re.is_match("#ai"));
        assert!(!re.is_match("plain ML mention"));
    }
}
