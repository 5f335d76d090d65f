//! Response normalizer: coerces free-form model output into typed records.
//!
//! Models asked for "JSON only" still wrap payloads in markdown fences, leave
//! literal newlines inside string values, or emit stray control characters.
//! Normalization is two-phase and strictly ordered:
//!
//! 1. strip code fences and parse the text as-is — a well-formed payload is
//!    returned untouched, preserving intentional embedded newlines;
//! 2. only if that fails, repair the text (drop control characters, flatten
//!    unescaped newlines/tabs, collapse whitespace runs) and parse once more.
//!
//! A second failure surfaces as [`AiError::MalformedResponse`] carrying the
//! original raw text for diagnostic logging. Nothing here panics on hostile
//! input.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::AiError;

static RE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*\n?").unwrap());

/// Remove markdown code-fence markers (with or without a language tag) and
/// trim surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    RE_FENCE.replace_all(raw, "").trim().to_string()
}

/// Parse model output into `T`, repairing the text if a direct parse fails.
pub fn normalize<T: DeserializeOwned>(raw: &str) -> Result<T, AiError> {
    let stripped = strip_fences(raw);

    // Phase 1: optimistic parse. Valid payloads pass through unmodified.
    if let Ok(value) = serde_json::from_str::<T>(&stripped) {
        return Ok(value);
    }

    // Phase 2: repair, then one retry.
    let repaired = repair(&stripped);
    serde_json::from_str::<T>(&repaired).map_err(|_| AiError::MalformedResponse {
        raw: raw.to_string(),
    })
}

/// Best-effort string surgery for almost-JSON.
///
/// Removes non-printable control characters, replaces unescaped literal
/// newlines and tabs with spaces (a character counts as escaped when the
/// preceding input character is an unescaped backslash), drops unescaped
/// carriage returns, then collapses whitespace runs to single spaces.
fn repair(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut escaped = false;
    for ch in text.chars() {
        let was_escaped = escaped;
        escaped = ch == '\\' && !escaped;
        match ch {
            '\n' | '\t' if !was_escaped => cleaned.push(' '),
            '\r' if !was_escaped => {}
            c if c.is_control() && !matches!(c, '\n' | '\r' | '\t') => {}
            c => cleaned.push(c),
        }
    }

    let mut out = String::with_capacity(cleaned.len());
    let mut in_run = false;
    for ch in cleaned.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TagList {
        tags: Vec<String>,
    }

    #[test]
    fn valid_json_passes_through_unchanged() {
        let parsed: TagList = normalize(r#"{"tags": ["a", "b"]}"#).unwrap();
        assert_eq!(parsed.tags, vec!["a", "b"]);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"tags\": [\"a\",\"b\"]}\n```";
        let parsed: TagList = normalize(raw).unwrap();
        assert_eq!(parsed.tags, vec!["a", "b"]);
    }

    #[test]
    fn bare_fences_are_stripped_too() {
        let raw = "```\n{\"tags\": [\"x\"]}\n```";
        let parsed: TagList = normalize(raw).unwrap();
        assert_eq!(parsed.tags, vec!["x"]);
    }

    #[test]
    fn fencing_never_changes_semantic_content() {
        let plain: TagList = normalize(r#"{"tags": ["a", "b"]}"#).unwrap();
        let fenced: TagList = normalize("```json\n{\"tags\": [\"a\", \"b\"]}\n```").unwrap();
        assert_eq!(plain, fenced);
    }

    #[test]
    fn escaped_newlines_inside_valid_json_are_preserved() {
        #[derive(Deserialize)]
        struct Doc {
            text: String,
        }
        // Phase 1 succeeds, so the embedded \n escape stays intact.
        let parsed: Doc = normalize("{\"text\": \"line one\\nline two\"}").unwrap();
        assert_eq!(parsed.text, "line one\nline two");
    }

    #[test]
    fn literal_newlines_inside_strings_are_repaired() {
        // Invalid as-is: a raw newline inside a JSON string.
        let raw = "{\"tags\": [\"first\nsecond\"]}";
        let parsed: TagList = normalize(raw).unwrap();
        assert_eq!(parsed.tags, vec!["first second"]);
    }

    #[test]
    fn control_characters_are_removed_in_repair() {
        let raw = "{\"tags\": [\"a\x07b\"]}\x00";
        let parsed: TagList = normalize(raw).unwrap();
        assert_eq!(parsed.tags, vec!["ab"]);
    }

    #[test]
    fn whitespace_runs_collapse_in_repair() {
        let raw = "{\"tags\":\t\t[\"a\",\n\n   \"b\"]}";
        let parsed: TagList = normalize(raw).unwrap();
        assert_eq!(parsed.tags, vec!["a", "b"]);
    }

    #[test]
    fn irreparable_text_fails_with_malformed_response() {
        let raw = "```json\n{\"tags\": [\"unbalanced\"";
        let err = normalize::<TagList>(raw).unwrap_err();
        match err {
            AiError::MalformedResponse { raw: attached } => {
                assert_eq!(attached, raw);
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn prose_without_json_fails_cleanly() {
        let err = normalize::<TagList>("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse { .. }));
    }
}
