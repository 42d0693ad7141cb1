//! Structured-response recovery.
//!
//! Models rarely answer with clean JSON: they prepend reasoning, wrap the
//! payload in markdown fences, and leave trailing commas behind. This module
//! runs a deterministic pipeline over raw model text and either produces a
//! parsed JSON value or wraps the original text so the caller can decide what
//! to do with it. Malformed output is an expected condition here, never an
//! error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").unwrap());

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(.*?)\s*```").unwrap());

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[A-Za-z_][A-Za-z0-9_]*\}").unwrap());

/// Recover a JSON value from arbitrary model output.
///
/// Pipeline (each step idempotent):
/// 1. strip `<think>...</think>` reasoning blocks;
/// 2. prefer the inner content of a ```json fenced block, else the whole
///    stripped text;
/// 3. remove trailing commas immediately before `}` / `]`;
/// 4. parse; on failure return `{"content": <original text>}`.
pub fn parse_structured_text(text: &str) -> Value {
    let stripped = strip_reasoning(text);
    let candidate = match extract_json_fence(&stripped) {
        Some(inner) => inner,
        None => stripped.trim().to_string(),
    };
    let cleaned = strip_trailing_commas(&candidate);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "model output is not parseable JSON, wrapping raw text");
            json!({ "content": text })
        }
    }
}

/// Remove `<think>...</think>` blocks (case-insensitive, spans newlines).
/// A no-op on text without such blocks.
pub fn strip_reasoning(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").into_owned()
}

/// Inner content of the first ```json fenced block, if any.
pub fn extract_json_fence(text: &str) -> Option<String> {
    JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Remove trailing commas immediately before a closing `}` or `]`.
///
/// Walks characters and tracks string literals so commas inside quoted
/// values survive. Regex is deliberately not used here.
pub fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_str = false;
    let mut escape = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_str {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_str = false;
            }
            out.push(c);
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                out.push(c);
                i += 1;
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                    // drop the comma, keep the whitespace run
                    i += 1;
                } else {
                    out.push(',');
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Whether the text still contains `{name}`-style placeholders after
/// substitution. Used by the prompt-template fallback.
pub(crate) fn has_unresolved_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_strip_is_idempotent() {
        let plain = "no reasoning here";
        assert_eq!(strip_reasoning(plain), plain);

        let with_block = "<THINK>internal\nmonologue</think>answer";
        let once = strip_reasoning(with_block);
        assert_eq!(once, "answer");
        assert_eq!(strip_reasoning(&once), once);
    }

    #[test]
    fn fence_and_comma_cleanup_end_to_end() {
        let text = "blah <think>ignore</think> ```json\n{\"a\":1,}\n``` trailing";
        let parsed = parse_structured_text(text);
        assert_eq!(parsed, json!({"a": 1}));
    }

    #[test]
    fn fence_tag_is_case_insensitive() {
        let text = "```JSON\n{\"ok\": true}\n```";
        assert_eq!(parse_structured_text(text), json!({"ok": true}));
    }

    #[test]
    fn bare_json_without_fence_parses() {
        let parsed = parse_structured_text("  {\"title\": \"Ashfall\"}  ");
        assert_eq!(parsed, json!({"title": "Ashfall"}));
    }

    #[test]
    fn malformed_output_wraps_original_text() {
        let parsed = parse_structured_text("I cannot comply");
        assert_eq!(parsed, json!({"content": "I cannot comply"}));
    }

    #[test]
    fn wrapped_text_is_the_unmodified_original() {
        let text = "<think>hm</think> not json at all";
        let parsed = parse_structured_text(text);
        assert_eq!(parsed["content"], json!(text));
    }

    #[test]
    fn trailing_commas_removed_in_objects_and_arrays() {
        assert_eq!(
            strip_trailing_commas("{\"a\": [1, 2,], \"b\": 3,}"),
            "{\"a\": [1, 2], \"b\": 3}"
        );
    }

    #[test]
    fn commas_inside_strings_survive() {
        let input = "{\"note\": \"keep ,} this\"}";
        assert_eq!(strip_trailing_commas(input), input);
    }

    #[test]
    fn comma_cleanup_is_idempotent() {
        let once = strip_trailing_commas("{\"a\": 1,}");
        assert_eq!(strip_trailing_commas(&once), once);
    }
}
