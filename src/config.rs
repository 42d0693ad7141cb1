//! Model endpoint configuration.
//!
//! A [`ModelConfig`] describes one provider endpoint: where to send requests,
//! how to shape them, how to read the answer back, and how the selection
//! policy should rank it. Records come from the platform's config store and
//! are immutable for the duration of a call; this module only validates and
//! reads them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AiError, Result};

/// Default Anthropic API version sent with Claude-style requests.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire format of a provider endpoint.
///
/// Shared by [`ModelConfig::provider_kind`] (which selects the auth-header
/// style) and [`ModelConfig::request_format`] (which selects the payload
/// shape), so a vendor can be paired with any wire shape it happens to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum WireFormat {
    /// OpenAI Chat Completions style: `{model, messages, ...}`.
    #[serde(rename = "openai_chat")]
    OpenAiChat,
    /// Legacy completions style: flat `{prompt, model, ...}`.
    #[serde(rename = "openai_completion")]
    OpenAiCompletion,
    /// Anthropic Messages style: `{model, max_tokens, messages, system?}`.
    #[serde(rename = "claude_messages")]
    ClaudeMessages,
    /// Flat JSON POST for self-hosted or proxy endpoints.
    #[serde(rename = "custom_json")]
    CustomJson,
}

impl WireFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai_chat",
            Self::OpenAiCompletion => "openai_completion",
            Self::ClaudeMessages => "claude_messages",
            Self::CustomJson => "custom_json",
        }
    }

    /// All formats the crate ships an adapter for.
    pub const fn all() -> &'static [WireFormat] {
        &[
            Self::OpenAiChat,
            Self::OpenAiCompletion,
            Self::ClaudeMessages,
            Self::CustomJson,
        ]
    }
}

impl FromStr for WireFormat {
    type Err = AiError;

    /// Unknown kinds are rejected here, at construction time, rather than
    /// silently coerced to a default.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai_chat" => Ok(Self::OpenAiChat),
            "openai_completion" => Ok(Self::OpenAiCompletion),
            "claude_messages" => Ok(Self::ClaudeMessages),
            "custom_json" => Ok(Self::CustomJson),
            other => Err(AiError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured provider endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: i64,
    /// Owning user; `None` marks a system default.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Display name, also the handle the selection policy matches against.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,

    pub provider_kind: WireFormat,
    pub request_format: WireFormat,
    pub api_endpoint: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    pub model_name: String,

    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "defaults::temperature")]
    pub temperature: f64,
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "defaults::retry_count")]
    pub retry_count: u32,

    /// Extra request headers merged over the built-in ones.
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    /// Extra request-body fields merged over the format defaults.
    #[serde(default)]
    pub request_params: Map<String, Value>,
    /// Logical field -> dot path overrides for response extraction.
    #[serde(default)]
    pub response_mapping: HashMap<String, String>,
    /// Optional prompt template with a `{prompt}` placeholder.
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Optional system message prepended to chat-style requests.
    #[serde(default)]
    pub system_message: Option<String>,

    #[serde(default = "defaults::is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_description: Option<String>,
    #[serde(default)]
    pub is_group_default: bool,
    /// Ordering hint (1-10) for the deterministic fallback choice. Never a
    /// hard scheduler.
    #[serde(default = "defaults::priority")]
    pub priority: u8,

    /// Quota fields are carried for callers to read; the core does not
    /// enforce them.
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub monthly_limit: Option<u32>,
}

mod defaults {
    pub const fn max_tokens() -> u32 {
        2000
    }
    pub const fn temperature() -> f64 {
        0.7
    }
    pub const fn timeout_secs() -> u64 {
        60
    }
    pub const fn retry_count() -> u32 {
        3
    }
    pub const fn is_active() -> bool {
        true
    }
    pub const fn priority() -> u8 {
        1
    }
}

impl ModelConfig {
    /// Minimal constructor for programmatic configs; everything else starts
    /// from the field defaults above.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        kind: WireFormat,
        api_endpoint: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_id: None,
            name: name.into(),
            description: None,
            provider_kind: kind,
            request_format: kind,
            api_endpoint: api_endpoint.into(),
            api_key: None,
            model_name: model_name.into(),
            max_tokens: defaults::max_tokens(),
            temperature: defaults::temperature(),
            timeout_secs: defaults::timeout_secs(),
            retry_count: defaults::retry_count(),
            request_headers: HashMap::new(),
            request_params: Map::new(),
            response_mapping: HashMap::new(),
            prompt_template: None,
            system_message: None,
            is_active: true,
            is_default: false,
            group_name: None,
            group_description: None,
            is_group_default: false,
            priority: defaults::priority(),
            daily_limit: None,
            monthly_limit: None,
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn with_request_format(mut self, format: WireFormat) -> Self {
        self.request_format = format;
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>, is_group_default: bool) -> Self {
        self.group_name = Some(group.into());
        self.is_group_default = is_group_default;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Static validation, run before an adapter is built. All violations are
    /// collected so a misconfigured record reports everything at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.api_endpoint.is_empty() {
            problems.push("api_endpoint must not be empty".to_string());
        } else if !self.api_endpoint.starts_with("http://")
            && !self.api_endpoint.starts_with("https://")
        {
            problems.push("api_endpoint must be an http(s) URL".to_string());
        }
        if self.model_name.is_empty() {
            problems.push("model_name must not be empty".to_string());
        }
        if self.max_tokens == 0 || self.max_tokens > 100_000 {
            problems.push("max_tokens must be within 1..=100000".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            problems.push("temperature must be within 0.0..=2.0".to_string());
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            problems.push("timeout_secs must be within 1..=300".to_string());
        }
        if self.retry_count > 10 {
            problems.push("retry_count must be at most 10".to_string());
        }
        if self.request_headers.len() > 20 {
            problems.push("request_headers is capped at 20 entries".to_string());
        }
        for (key, value) in &self.request_headers {
            if key.len() > 100 {
                problems.push(format!("header name `{key}` exceeds 100 chars"));
            }
            if value.len() > 500 {
                problems.push(format!("header value for `{key}` exceeds 500 chars"));
            }
        }
        if self.request_params.len() > 50 {
            problems.push("request_params is capped at 50 entries".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AiError::ConfigurationError(problems.join("; ")))
        }
    }

    /// Headers for every request to this endpoint: JSON content type, the
    /// auth header the provider kind expects, then the configured custom
    /// headers merged on top (custom wins).
    pub fn request_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        if let Some(key) = &self.api_key {
            match self.provider_kind {
                WireFormat::ClaudeMessages => {
                    headers.insert("x-api-key".to_string(), key.expose_secret().to_string());
                    headers.insert(
                        "anthropic-version".to_string(),
                        ANTHROPIC_VERSION.to_string(),
                    );
                }
                _ => {
                    headers.insert(
                        "Authorization".to_string(),
                        format!("Bearer {}", key.expose_secret()),
                    );
                }
            }
        }

        for (key, value) in &self.request_headers {
            headers.insert(key.clone(), value.clone());
        }
        headers
    }

    /// Base body parameters: model identity and generation defaults, with
    /// the configured overrides merged on top.
    pub fn base_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("model".to_string(), Value::from(self.model_name.clone()));
        params.insert("max_tokens".to_string(), Value::from(self.max_tokens));
        params.insert("temperature".to_string(), Value::from(self.temperature));
        for (key, value) in &self.request_params {
            params.insert(key.clone(), value.clone());
        }
        params
    }

    /// Response field mapping with the well-known defaults filled in.
    pub fn response_mapping(&self) -> HashMap<String, String> {
        let mut mapping = HashMap::from([
            (
                "content".to_string(),
                "choices.0.message.content".to_string(),
            ),
            ("usage".to_string(), "usage".to_string()),
            (
                "finish_reason".to_string(),
                "choices.0.finish_reason".to_string(),
            ),
        ]);
        for (key, value) in &self.response_mapping {
            mapping.insert(key.clone(), value.clone());
        }
        mapping
    }

    /// Run the prompt through the configured template. Falls back to the raw
    /// prompt when the template references placeholders this call cannot
    /// resolve, so a broken template degrades instead of corrupting requests.
    pub fn format_prompt(&self, prompt: &str) -> String {
        let Some(template) = &self.prompt_template else {
            return prompt.to_string();
        };
        let substituted = template.replace("{prompt}", prompt);
        if crate::parser::has_unresolved_placeholders(&substituted) {
            tracing::warn!(
                config_id = self.id,
                "prompt template has unresolved placeholders, using raw prompt"
            );
            return prompt.to_string();
        }
        substituted
    }

    /// Masked key suffix for diagnostics; never the full secret.
    pub fn masked_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let exposed = key.expose_secret();
            if exposed.chars().count() > 4 {
                let tail: String = exposed
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("***{tail}")
            } else {
                "***".to_string()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ModelConfig {
        ModelConfig::new(
            1,
            "primary",
            WireFormat::OpenAiChat,
            "https://api.example.com/v1/chat/completions",
            "gpt-4o-mini",
        )
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut config = base_config();
        config.api_endpoint = "ftp://nope".to_string();
        config.max_tokens = 0;
        config.temperature = 3.5;
        config.timeout_secs = 0;
        config.retry_count = 99;

        let err = config.validate().unwrap_err();
        let AiError::ConfigurationError(message) = err else {
            panic!("expected ConfigurationError");
        };
        assert!(message.contains("api_endpoint"));
        assert!(message.contains("max_tokens"));
        assert!(message.contains("temperature"));
        assert!(message.contains("timeout_secs"));
        assert!(message.contains("retry_count"));
    }

    #[test]
    fn header_cap_enforced() {
        let mut config = base_config();
        for i in 0..21 {
            config
                .request_headers
                .insert(format!("X-Header-{i}"), "v".to_string());
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn auth_header_follows_provider_kind() {
        let openai = base_config().with_api_key("sk-secret-1234");
        let headers = openai.request_headers();
        assert_eq!(
            headers.get("Authorization").map(String::as_str),
            Some("Bearer sk-secret-1234")
        );

        let mut claude = base_config().with_api_key("ak-secret-5678");
        claude.provider_kind = WireFormat::ClaudeMessages;
        let headers = claude.request_headers();
        assert_eq!(
            headers.get("x-api-key").map(String::as_str),
            Some("ak-secret-5678")
        );
        assert!(headers.contains_key("anthropic-version"));
        assert!(!headers.contains_key("Authorization"));
    }

    #[test]
    fn custom_headers_win_over_builtin() {
        let mut config = base_config();
        config
            .request_headers
            .insert("Content-Type".to_string(), "application/json; v=2".to_string());
        let headers = config.request_headers();
        assert_eq!(
            headers.get("Content-Type").map(String::as_str),
            Some("application/json; v=2")
        );
    }

    #[test]
    fn prompt_template_substitutes_or_falls_back() {
        let mut config = base_config();
        config.prompt_template = Some("Write in a noir voice: {prompt}".to_string());
        assert_eq!(
            config.format_prompt("a heist"),
            "Write in a noir voice: a heist"
        );

        config.prompt_template = Some("{prompt} in the style of {author}".to_string());
        assert_eq!(config.format_prompt("a heist"), "a heist");
    }

    #[test]
    fn unknown_kind_is_rejected_at_parse() {
        let err = "grpc_streaming".parse::<WireFormat>().unwrap_err();
        assert!(matches!(err, AiError::UnsupportedProvider(_)));
    }

    #[test]
    fn masked_key_hides_secret() {
        let config = base_config().with_api_key("sk-abcdef");
        assert_eq!(config.masked_key().as_deref(), Some("***cdef"));
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-abcdef"));
    }
}
