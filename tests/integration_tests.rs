//! Integration tests for the complete Blockseek pipeline
//!
//! These tests verify end-to-end behaviour across the public API:
//! - JSON request → validation → flattening → query text
//! - Query text → scope injection
//! - Request → expansion → compile → engine (async collaborators)
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;

use async_trait::async_trait;
use blockseek_query::{
    compile_json, inject_text, CompiledQuery, CompilerConfig, DiagnosticCode, EngineError,
    QueryEngine, QueryRequestV1, Row, Searcher, TermExpander, Tier,
};
use regex::Regex;
use serde_json::json;

/// Every `re-pattern` literal in a query, unescaped.
fn patterns(text: &str) -> Vec<String> {
    let re = Regex::new(r#"\(re-pattern "((?:[^"\\]|\\.)*)"\)"#).unwrap();
    re.captures_iter(text)
        .map(|c| c[1].replace("\\\\", "\\").replace("\\\"", "\""))
        .collect()
}

// ============================================================================
// Compilation
// ============================================================================

#[test]
fn test_flat_and_request_compiles_to_conjunction() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"version":1,"conditions":[
              {"type":"text","value":"C++ (advanced)"},
              {"type":"page_reference","value":"AI"}],
            "combinator":"AND"}"#,
        &CompilerConfig::default(),
    )?;
    assert_eq!(compiled.tier, Tier::Flat);
    assert!(compiled.text.starts_with("[:find ?b-uuid ?content ?page-name"));
    assert!(compiled.diagnostics.is_empty());

    let pats = patterns(&compiled.text);
    assert_eq!(pats.len(), 2);
    let text_re = Regex::new(&pats[0])?;
    assert!(text_re.is_match("Intro to C++ (advanced)"));
    assert!(!text_re.is_match("Intro to C (advanced)"));
    let page_re = Regex::new(&pats[1])?;
    assert!(page_re.is_match("see [[AI]]"));
    assert!(page_re.is_match("tagged #AI"));
    assert!(page_re.is_match("AI:: yes"));
    assert!(!page_re.is_match("plain AI"));
    Ok(())
}

#[test]
fn test_or_with_exclusion_collapses_to_single_pattern() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"conditions":[
              {"value":"AI"},{"value":"ML"},{"value":"draft","negate":true}],
            "combinator":"OR"}"#,
        &CompilerConfig::default(),
    )?;
    assert_eq!(compiled.rewrites, 1);
    assert!(!compiled.text.contains("or-join"));

    let pats = patterns(&compiled.text);
    let merged = Regex::new(&pats[0])?;
    assert!(merged.is_match("I study AI today"));
    assert!(merged.is_match("ML is fun"));
    assert!(!merged.is_match("nothing relevant"));
    assert!(compiled.text.contains("(not [(re-find ?re1 ?content)])"));
    Ok(())
}

#[test]
fn test_and_of_pure_and_groups_is_unmodified() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"groups":[
              {"conditions":[{"value":"A"},{"value":"B"}],"combinator":"AND"},
              {"conditions":[{"value":"C"}],"combinator":"AND"}],
            "group_combinator":"AND"}"#,
        &CompilerConfig::default(),
    )?;
    assert_eq!(compiled.tier, Tier::AndDominant);
    assert_eq!(compiled.rewrites, 0);
    let pats = patterns(&compiled.text);
    assert_eq!(pats, vec!["(?i).*A.*", "(?i).*B.*", "(?i).*C.*"]);
    Ok(())
}

#[test]
fn test_or_of_conjunctions_is_unsupported() {
    let err = compile_json(
        r#"{"groups":[
              {"conditions":[{"value":"A"},{"value":"B"}],"combinator":"AND"},
              {"conditions":[{"value":"C"}],"combinator":"AND"}],
            "group_combinator":"OR"}"#,
        &CompilerConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "UnsupportedShape");
    assert!(err.to_string().contains("tier 3"));
}

#[test]
fn test_or_of_groups_with_exclusions_is_unsupported() {
    for request in [
        r#"{"groups":[
              {"conditions":[{"value":"alpha"}],"combinator":"AND"},
              {"conditions":[{"value":"delta","negate":true}],"combinator":"AND"}],
            "group_combinator":"OR"}"#,
        r#"{"groups":[
              {"conditions":[{"value":"a1"},{"value":"b1"}],"combinator":"OR"},
              {"conditions":[{"value":"c1"},{"value":"d1","negate":true}],"combinator":"OR"}],
            "group_combinator":"OR"}"#,
    ] {
        let err = compile_json(request, &CompilerConfig::default()).unwrap_err();
        assert_eq!(err.code(), "UnsupportedShape");
        assert!(err.to_string().contains("negated member"));
    }
}

#[test]
fn test_or_of_plain_disjunctions_still_compiles() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"groups":[
              {"conditions":[{"value":"a1"},{"value":"b1"}],"combinator":"OR"},
              {"conditions":[{"value":"c1"}],"combinator":"AND"}],
            "group_combinator":"OR"}"#,
        &CompilerConfig::default(),
    )?;
    assert_eq!(compiled.tier, Tier::Flat);
    assert!(compiled.text.contains("or-join"));
    assert!(!compiled.text.contains("(not "));
    Ok(())
}

#[test]
fn test_page_entity_query() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"entity":"page","conditions":[{"value":"Project","match":"exact"}],
            "scope":{"exclude_journals":true}}"#,
        &CompilerConfig::default(),
    )?;
    assert_eq!(compiled.columns, vec!["page_uuid", "title"]);
    assert!(compiled.text.contains("[(re-pattern \"(?i)^Project$\") ?re0]"));
    assert!(compiled.text.contains("(not [?p :block/journal? true])"));
    Ok(())
}

#[test]
fn test_raw_pattern_passes_through_with_warning_when_invalid() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"conditions":[{"type":"pattern","value":"TODO\\s+\\d+"},
                          {"type":"pattern","value":"(broken"}]}"#,
        &CompilerConfig::default(),
    )?;
    let pats = patterns(&compiled.text);
    assert_eq!(pats[0], r"TODO\s+\d+");
    assert!(compiled.diagnostics.has_code(DiagnosticCode::SuspectPattern));
    Ok(())
}

#[test]
fn test_config_file_changes_policy() -> anyhow::Result<()> {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"{{ "rewrite_plain_or": true, "case_insensitive": false }}"#)?;
    let config = CompilerConfig::from_json_file(file.path())?;

    let compiled = compile_json(
        r#"{"conditions":[{"value":"AI"},{"value":"ML"}],"combinator":"OR"}"#,
        &config,
    )?;
    assert_eq!(compiled.rewrites, 1);
    assert!(!compiled.text.contains("or-join"));
    Ok(())
}

#[test]
fn test_compiled_query_json_shape() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"conditions":[{"value":"AI"}]}"#,
        &CompilerConfig::default(),
    )?;
    let value = serde_json::to_value(&compiled)?;
    assert_eq!(value["tier"], json!("flat"));
    assert_eq!(value["rewrites"], json!(0));
    assert_eq!(value["columns"], json!(["block_uuid", "content", "page_name"]));
    assert!(value["text"].as_str().is_some());
    Ok(())
}

// ============================================================================
// Scope injection
// ============================================================================

#[test]
fn test_text_injection_on_compiled_query() -> anyhow::Result<()> {
    let compiled = compile_json(
        r#"{"conditions":[{"value":"AI"}]}"#,
        &CompilerConfig::default(),
    )?;
    let (same, diag) = inject_text(&compiled.text, &[], &[]);
    assert_eq!(same, compiled.text);
    assert!(diag.is_none());

    let (scoped, diag) = inject_text(
        &compiled.text,
        &["u1".to_string(), "u2".to_string()],
        &["p1".to_string()],
    );
    assert!(diag.is_none());
    assert!(scoped.contains(r#"[(contains? #{"u1" "u2"} ?b-id)]"#));
    assert!(scoped.contains(r#"[(= ?p-id "p1")]"#));
    assert!(scoped.ends_with(']'));
    Ok(())
}

#[test]
fn test_text_injection_matches_structural_injection() -> anyhow::Result<()> {
    let config = CompilerConfig::default();
    let plain = compile_json(r#"{"conditions":[{"value":"AI"}]}"#, &config)?;
    let structural = compile_json(
        r#"{"conditions":[{"value":"AI"}],"scope":{"block_ids":["u1"]}}"#,
        &config,
    )?;
    let (patched, _) = inject_text(&plain.text, &["u1".to_string()], &[]);
    assert_eq!(patched, structural.text);
    Ok(())
}

// ============================================================================
// Search pipeline
// ============================================================================

struct FixtureEngine {
    blocks: Vec<(&'static str, &'static str, &'static str)>,
}

#[async_trait]
impl QueryEngine for FixtureEngine {
    /// Evaluates only the pattern clauses, which is enough for single-sided
    /// AND queries.
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, EngineError> {
        let mut regexes = Vec::new();
        for p in patterns(&query.text) {
            regexes.push(
                Regex::new(&p).map_err(|e| EngineError::PatternRejected {
                    message: e.to_string(),
                })?,
            );
        }
        let negated: Vec<bool> = (0..regexes.len())
            .map(|i| query.text.contains(&format!("(not [(re-find ?re{i} ?content)])")))
            .collect();
        Ok(self
            .blocks
            .iter()
            .filter(|(_, content, _)| {
                regexes
                    .iter()
                    .zip(&negated)
                    .all(|(re, neg)| re.is_match(content) != *neg)
            })
            .map(|(uuid, content, page)| vec![json!(uuid), json!(content), json!(page)])
            .collect())
    }
}

struct Thesaurus;

#[async_trait]
impl TermExpander for Thesaurus {
    async fn expand(&self, term: &str, _strategy: &str) -> anyhow::Result<Vec<String>> {
        Ok(match term {
            "AI" => vec!["artificial intelligence".to_string()],
            _ => Vec::new(),
        })
    }
}

fn fixture() -> Arc<FixtureEngine> {
    Arc::new(FixtureEngine {
        blocks: vec![
            ("b1", "I study AI today", "Journal"),
            ("b2", "artificial intelligence notes", "Research"),
            ("b3", "AI draft", "Research"),
            ("b4", "gardening", "Home"),
        ],
    })
}

#[tokio::test]
async fn test_search_end_to_end() -> anyhow::Result<()> {
    let searcher = Searcher::new(fixture(), CompilerConfig::default());
    let request = QueryRequestV1::from_json_str(
        r#"{"conditions":[{"value":"AI"},{"value":"draft","negate":true}]}"#,
    )?;
    let outcome = searcher.search(&request).await?;
    let ids: Vec<_> = outcome.rows.iter().map(|r| r[0].clone()).collect();
    assert_eq!(ids, vec![json!("b1")]);
    Ok(())
}

#[tokio::test]
async fn test_search_with_expansion_widens_matches() -> anyhow::Result<()> {
    let searcher = Searcher::new(fixture(), CompilerConfig::default())
        .with_expander(Arc::new(Thesaurus));
    let request = QueryRequestV1::from_json_str(
        r#"{"conditions":[{"value":"AI","semantic_expansion":"synonyms"},
                          {"value":"draft","negate":true}]}"#,
    )?;
    let outcome = searcher.search(&request).await?;
    let ids: Vec<_> = outcome.rows.iter().map(|r| r[0].clone()).collect();
    assert_eq!(ids, vec![json!("b1"), json!("b2")]);
    Ok(())
}
