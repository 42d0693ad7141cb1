//! Response field extraction.
//!
//! Provider responses are not contractually fixed, so they are handled as
//! dynamic JSON trees addressed by dot paths (`choices.0.message.content`)
//! rather than typed deserialization. Extraction is best-effort: when the
//! configured path misses, a chain of well-known shapes is tried, and the
//! stringified body is the terminal fallback. Nothing in here raises.

use std::collections::HashMap;

use serde_json::Value;

/// Well-known content locations, tried in order after the configured path.
const FALLBACK_CONTENT_PATHS: &[&str] = &[
    "choices.0.message.content",
    "content.0.text",
    "text",
    "response",
    "output",
    "result",
];

/// Resolve a dot-separated path against a JSON value. Numeric segments index
/// arrays, everything else indexes object keys.
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match segment.parse::<usize>() {
            Ok(index) => current.as_array()?.get(index)?,
            Err(_) => current.as_object()?.get(segment)?,
        };
    }
    Some(current)
}

/// Pull the logical `content` string out of a response body.
///
/// Order: the mapping's `content` path, then [`FALLBACK_CONTENT_PATHS`],
/// then the stringified whole body.
pub fn extract_content(body: &Value, mapping: &HashMap<String, String>) -> String {
    if let Some(path) = mapping.get("content") {
        if let Some(value) = extract_path(body, path) {
            return value_to_string(value);
        }
        tracing::warn!(path = %path, "configured content path did not resolve, trying fallbacks");
    }

    for path in FALLBACK_CONTENT_PATHS {
        if let Some(value) = extract_path(body, path) {
            return value_to_string(value);
        }
    }

    body.to_string()
}

/// Best-effort usage block, when the provider reports one.
pub fn extract_usage(body: &Value, mapping: &HashMap<String, String>) -> Option<Value> {
    let path = mapping.get("usage").map(String::as_str).unwrap_or("usage");
    extract_path(body, path).cloned()
}

/// Best-effort finish reason.
pub fn extract_finish_reason(body: &Value, mapping: &HashMap<String, String>) -> Option<String> {
    let path = mapping
        .get("finish_reason")
        .map(String::as_str)
        .unwrap_or("choices.0.finish_reason");
    extract_path(body, path).map(value_to_string)
}

/// Scalars render without JSON quoting; composites as compact JSON; null as
/// empty (so a null content field reads as "nothing extracted").
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(content_path: &str) -> HashMap<String, String> {
        HashMap::from([("content".to_string(), content_path.to_string())])
    }

    #[test]
    fn configured_path_resolves() {
        let body = json!({"choices": [{"message": {"content": "X"}}]});
        assert_eq!(
            extract_content(&body, &mapping("choices.0.message.content")),
            "X"
        );
    }

    #[test]
    fn missing_path_falls_through_to_known_shapes() {
        let body = json!({"content": [{"text": "from claude"}]});
        assert_eq!(
            extract_content(&body, &mapping("choices.0.message.content")),
            "from claude"
        );

        let body = json!({"response": "plain"});
        assert_eq!(extract_content(&body, &HashMap::new()), "plain");
    }

    #[test]
    fn unknown_shape_stringifies_body() {
        let body = json!({"weird": {"nested": 1}});
        let extracted = extract_content(&body, &HashMap::new());
        assert_eq!(extracted, body.to_string());
    }

    #[test]
    fn numeric_segments_index_arrays() {
        let body = json!({"a": [{"b": [10, 20]}]});
        assert_eq!(extract_path(&body, "a.0.b.1"), Some(&json!(20)));
        assert_eq!(extract_path(&body, "a.1.b"), None);
        assert_eq!(extract_path(&body, "a.b"), None);
    }

    #[test]
    fn null_content_reads_as_empty() {
        let body = json!({"text": null});
        assert_eq!(extract_content(&body, &HashMap::new()), "");
    }

    #[test]
    fn non_string_scalars_render_bare() {
        let body = json!({"result": 42});
        assert_eq!(extract_content(&body, &HashMap::new()), "42");
    }

    #[test]
    fn usage_and_finish_reason_are_best_effort() {
        let body = json!({
            "usage": {"total_tokens": 21},
            "choices": [{"finish_reason": "stop", "message": {"content": "x"}}]
        });
        let mapping = HashMap::new();
        assert_eq!(
            extract_usage(&body, &mapping),
            Some(json!({"total_tokens": 21}))
        );
        assert_eq!(
            extract_finish_reason(&body, &mapping).as_deref(),
            Some("stop")
        );
        assert_eq!(extract_usage(&json!({}), &mapping), None);
    }
}
