//! Provider payload construction.
//!
//! Pure functions from `(prompt, config, per-call options)` to a
//! transport-ready JSON body. Merge order is the same for every wire format,
//! later wins: format defaults, then the config's custom params, then the
//! caller's runtime overrides.

use serde_json::{Map, Value, json};

use crate::config::{ModelConfig, WireFormat};

/// Per-call knobs the caller may override on top of the config.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Replaces the config's system message for this call.
    pub system_message: Option<String>,
    /// Extra body fields merged last.
    pub extra: Map<String, Value>,
}

impl CallOptions {
    /// The system message in effect: the per-call override, else the
    /// config's.
    fn effective_system_message<'a>(&'a self, config: &'a ModelConfig) -> Option<&'a str> {
        self.system_message
            .as_deref()
            .or(config.system_message.as_deref())
    }
}

/// Build the request body for one generation call. Does not mutate the
/// config.
pub fn build_payload(config: &ModelConfig, prompt: &str, opts: &CallOptions) -> Value {
    match config.request_format {
        WireFormat::OpenAiChat => build_chat_payload(config, prompt, opts),
        WireFormat::ClaudeMessages => build_claude_payload(config, prompt, opts),
        WireFormat::OpenAiCompletion | WireFormat::CustomJson => {
            build_flat_payload(config, prompt, opts)
        }
    }
}

/// OpenAI Chat Completions shape: ordered `messages` with the system message
/// first when present.
fn build_chat_payload(config: &ModelConfig, prompt: &str, opts: &CallOptions) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = opts.effective_system_message(config) {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({
        "role": "user",
        "content": config.format_prompt(prompt),
    }));

    let mut params = config.base_params();
    params.insert("messages".to_string(), Value::Array(messages));
    apply_overrides(&mut params, opts);
    Value::Object(params)
}

/// Anthropic Messages shape: `system` is a top-level field, not a message.
fn build_claude_payload(config: &ModelConfig, prompt: &str, opts: &CallOptions) -> Value {
    let mut params = config.base_params();
    params.insert(
        "messages".to_string(),
        json!([{ "role": "user", "content": config.format_prompt(prompt) }]),
    );
    if let Some(system) = opts.effective_system_message(config) {
        params.insert("system".to_string(), Value::from(system));
    }
    apply_overrides(&mut params, opts);
    Value::Object(params)
}

/// Flat completion/custom shape.
fn build_flat_payload(config: &ModelConfig, prompt: &str, opts: &CallOptions) -> Value {
    let mut params = config.base_params();
    params.insert(
        "prompt".to_string(),
        Value::from(config.format_prompt(prompt)),
    );
    if let Some(system) = opts.effective_system_message(config) {
        params.insert("system_message".to_string(), Value::from(system));
    }
    apply_overrides(&mut params, opts);
    Value::Object(params)
}

fn apply_overrides(params: &mut Map<String, Value>, opts: &CallOptions) {
    if let Some(max_tokens) = opts.max_tokens {
        params.insert("max_tokens".to_string(), Value::from(max_tokens));
    }
    if let Some(temperature) = opts.temperature {
        params.insert("temperature".to_string(), Value::from(temperature));
    }
    for (key, value) in &opts.extra {
        params.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, WireFormat};

    fn chat_config() -> ModelConfig {
        ModelConfig::new(
            7,
            "chat",
            WireFormat::OpenAiChat,
            "https://api.example.com/v1/chat/completions",
            "gpt-4o-mini",
        )
    }

    #[test]
    fn chat_payload_orders_system_first() {
        let mut config = chat_config();
        config.system_message = Some("You are a fiction editor.".to_string());
        let payload = build_payload(&config, "outline a chapter", &CallOptions::default());

        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "outline a chapter");
        assert_eq!(payload["model"], "gpt-4o-mini");
    }

    #[test]
    fn runtime_overrides_win_over_config_params() {
        let mut config = chat_config();
        config.max_tokens = 2000;
        config
            .request_params
            .insert("temperature".to_string(), Value::from(0.2));

        let opts = CallOptions {
            max_tokens: Some(512),
            temperature: Some(1.1),
            ..Default::default()
        };
        let payload = build_payload(&config, "p", &opts);
        assert_eq!(payload["max_tokens"], 512);
        assert_eq!(payload["temperature"], 1.1);
    }

    #[test]
    fn config_params_win_over_format_defaults() {
        let mut config = chat_config();
        config
            .request_params
            .insert("top_p".to_string(), Value::from(0.9));
        config
            .request_params
            .insert("max_tokens".to_string(), Value::from(4096));

        let payload = build_payload(&config, "p", &CallOptions::default());
        assert_eq!(payload["top_p"], 0.9);
        assert_eq!(payload["max_tokens"], 4096);
    }

    #[test]
    fn extra_params_merge_last() {
        let mut opts = CallOptions::default();
        opts.extra.insert("stream".to_string(), Value::Bool(false));
        opts.extra.insert("max_tokens".to_string(), Value::from(64));
        opts.max_tokens = Some(128);

        let payload = build_payload(&chat_config(), "p", &opts);
        assert_eq!(payload["stream"], false);
        // extra is applied after the typed overrides
        assert_eq!(payload["max_tokens"], 64);
    }

    #[test]
    fn claude_payload_uses_top_level_system() {
        let mut config = chat_config().with_request_format(WireFormat::ClaudeMessages);
        config.system_message = Some("Stay in character.".to_string());

        let payload = build_payload(&config, "describe the villain", &CallOptions::default());
        assert_eq!(payload["system"], "Stay in character.");
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn flat_payload_carries_prompt_field() {
        let config = chat_config().with_request_format(WireFormat::CustomJson);
        let payload = build_payload(&config, "name five taverns", &CallOptions::default());
        assert_eq!(payload["prompt"], "name five taverns");
        assert_eq!(payload["model"], "gpt-4o-mini");
        assert!(payload.get("messages").is_none());
    }

    #[test]
    fn prompt_template_applies_before_send() {
        let mut config = chat_config();
        config.prompt_template = Some("[fantasy] {prompt}".to_string());
        let payload = build_payload(&config, "a duel", &CallOptions::default());
        assert_eq!(payload["messages"][0]["content"], "[fantasy] a duel");
    }

    #[test]
    fn system_override_replaces_config_template() {
        let mut config = chat_config();
        config.system_message = Some("configured".to_string());
        let opts = CallOptions {
            system_message: Some("override".to_string()),
            ..Default::default()
        };
        let payload = build_payload(&config, "p", &opts);
        assert_eq!(payload["messages"][0]["content"], "override");
    }
}
