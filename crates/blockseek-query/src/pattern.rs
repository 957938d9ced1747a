//! Pattern generation: one condition → one regex fragment.
//!
//! Fragments use the syntax subset shared by the target engine's matcher
//! (`re-pattern`/`re-find`) and the `regex` crate, so the same fragment can be
//! checked locally. No look-around, no possessive quantifiers.
//!
//! Page references are matched reference-aware: only `[[name]]`, `#name` and
//! `name::` count. A bare occurrence of `name` in running text does not.

use crate::model::{Condition, ConditionKind, MatchMode};

/// Case-insensitive inline flag, prefixed to compiled patterns.
pub const CASE_INSENSITIVE_FLAG: &str = "(?i)";

/// Build the matching fragment for a single condition.
///
/// The fragment carries no inline flags; callers decide case sensitivity.
pub fn generate(condition: &Condition) -> String {
    if condition.is_raw_pattern() {
        return condition.value.clone();
    }
    match condition.kind {
        ConditionKind::Text => text_fragment(&condition.value, condition.match_mode),
        ConditionKind::PageReference => page_reference_fragment(&condition.value),
        ConditionKind::BlockReference => block_reference_fragment(&condition.value),
        // `is_raw_pattern` already covers this kind.
        ConditionKind::Pattern => condition.value.clone(),
    }
}

/// The pattern source a clause should compile for `condition`.
///
/// Raw patterns are passed through untouched (including any flags the caller
/// wrote); generated fragments get the case-insensitive flag when requested.
pub fn pattern_source(condition: &Condition, case_insensitive: bool) -> String {
    let fragment = generate(condition);
    if condition.is_raw_pattern() || !case_insensitive {
        fragment
    } else {
        format!("{CASE_INSENSITIVE_FLAG}{fragment}")
    }
}

pub fn escape(value: &str) -> String {
    regex::escape(value)
}

fn text_fragment(value: &str, mode: MatchMode) -> String {
    let escaped = escape(value);
    match mode {
        MatchMode::Exact => format!("^{escaped}$"),
        MatchMode::Contains => format!(".*{escaped}.*"),
        MatchMode::Pattern => value.to_string(),
    }
}

fn page_reference_fragment(name: &str) -> String {
    let escaped = escape(name);
    // `#AI` must not match `#AIR`; a boundary only makes sense after a word char.
    let tag = if name.chars().last().is_some_and(is_word_char) {
        format!("#{escaped}\\b")
    } else {
        format!("#{escaped}")
    };
    format!("\\[\\[{escaped}\\]\\]|{tag}|{escaped}::")
}

fn block_reference_fragment(uuid: &str) -> String {
    format!("\\(\\({}\\)\\)", escape(uuid))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Join fragments into one alternation, each fragment grouped so inner
/// alternations and anchors stay local to their branch.
pub fn alternation<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments
        .into_iter()
        .map(|f| format!("(?:{})", f.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Local syntax check for a pattern the engine will compile.
///
/// The engine's matcher is the authority; a pattern that passes here can still
/// be rejected at execution time, and vice versa for engine-only syntax.
pub fn check_pattern(pattern: &str) -> Result<(), String> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
