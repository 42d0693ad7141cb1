//! The generation service.
//!
//! This is the only entry point the platform's business layer calls. It
//! re-reads the caller's configs, resolves an adapter through the registry,
//! runs the call under the retry policy, and stamps results with enough
//! metadata to trace which config served them. Exhausted retries always
//! surface as an error; a caller never receives a silent empty result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::adapter::ConnectionProbe;
use crate::config::ModelConfig;
use crate::error::{AiError, Result};
use crate::factory::AdapterFactory;
use crate::registry::{AdapterHandle, AdapterRegistry};
use crate::request::CallOptions;
use crate::retry::RetryPolicy;
use crate::store::ConfigStore;

/// One generation call as the caller describes it.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Requested adapter: a config name or group name. `None` lets the
    /// selection policy pick.
    pub model: Option<String>,
    pub user_id: Option<i64>,
    /// Replaces the config's system message for this call.
    pub system_message: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Retries after the first attempt (0-10). Defaults to the resolved
    /// config's `retry_count`.
    pub retry_count: Option<u32>,
    /// Extra body fields merged into the provider payload.
    pub extra: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            user_id: None,
            system_message: None,
            max_tokens: None,
            temperature: None,
            retry_count: None,
            extra: Map::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_extra_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(AiError::ConfigurationError(format!(
                    "temperature override {temperature} is outside 0.0..=2.0"
                )));
            }
        }
        if let Some(retry_count) = self.retry_count {
            if retry_count > 10 {
                return Err(AiError::ConfigurationError(format!(
                    "retry_count override {retry_count} exceeds 10"
                )));
            }
        }
        Ok(())
    }

    fn call_options(&self) -> CallOptions {
        CallOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system_message: self.system_message.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// A plain-text generation with its provenance.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub config_id: i64,
    pub adapter_name: String,
    pub model_name: String,
    pub elapsed: Duration,
}

/// A structured generation with its provenance.
#[derive(Debug, Clone)]
pub struct StructuredGeneration {
    pub data: Value,
    pub raw_text: String,
    pub config_id: i64,
    pub adapter_name: String,
    pub model_name: String,
    pub elapsed: Duration,
}

/// Provider-agnostic generation front end.
pub struct AiService {
    registry: AdapterRegistry,
    store: Arc<dyn ConfigStore>,
    retry: RetryPolicy,
}

impl AiService {
    /// `system_configs` become the read-only system adapter set; user
    /// adapters are loaded from `store` on demand.
    pub fn new(store: Arc<dyn ConfigStore>, system_configs: Vec<ModelConfig>) -> Self {
        Self {
            registry: AdapterRegistry::new(system_configs),
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generate plain text.
    pub async fn generate_text(&self, request: GenerationRequest) -> Result<Generation> {
        let started = Instant::now();
        let handle = self.checkout(&request).await?;
        let opts = request.call_options();
        let attempts = self.attempts_for(&request, &handle);

        let text = self
            .retry
            .run(attempts, || {
                handle.adapter.generate_text(&request.prompt, &opts)
            })
            .await?;

        Ok(Generation {
            text,
            config_id: handle.config.id,
            adapter_name: handle.config.name.clone(),
            model_name: handle.config.model_name.clone(),
            elapsed: started.elapsed(),
        })
    }

    /// Generate a structured response. `shape` is advisory: it is embedded
    /// into the prompt, and the recovered value degrades to
    /// `{"content": raw}` when the model answers with something else.
    pub async fn generate_structured(
        &self,
        request: GenerationRequest,
        shape: Value,
    ) -> Result<StructuredGeneration> {
        let started = Instant::now();
        let handle = self.checkout(&request).await?;
        let opts = request.call_options();
        let attempts = self.attempts_for(&request, &handle);

        let output = self
            .retry
            .run(attempts, || {
                handle
                    .adapter
                    .generate_structured(&request.prompt, &shape, &opts)
            })
            .await?;

        Ok(StructuredGeneration {
            data: output.data,
            raw_text: output.raw_text,
            config_id: handle.config.id,
            adapter_name: handle.config.name.clone(),
            model_name: handle.config.model_name.clone(),
            elapsed: started.elapsed(),
        })
    }

    /// Health-check a config without touching the registry: build a
    /// throwaway adapter and probe it once. Construction failures report
    /// through the probe rather than raising, so configuration screens get
    /// one uniform shape.
    pub async fn test_config(&self, config: ModelConfig, prompt: &str) -> ConnectionProbe {
        match AdapterFactory::build(Arc::new(config)) {
            Ok(adapter) => adapter.test_connection(prompt).await,
            Err(err) => ConnectionProbe::failure(Duration::ZERO, err.to_string()),
        }
    }

    /// Whether a generation call for this user could resolve an adapter
    /// right now.
    pub async fn is_available(&self, user_id: Option<i64>) -> bool {
        if let Some(id) = user_id {
            if let Err(err) = self.registry.reload_user(id, self.store.as_ref()).await {
                tracing::warn!(user_id = id, error = %err, "availability check failed to load configs");
            }
        }
        self.registry.resolve(None, user_id).await.is_ok()
    }

    /// Adapter names visible to the user, for diagnostics and UI pickers.
    pub async fn available_adapters(&self, user_id: Option<i64>) -> Vec<String> {
        if let Some(id) = user_id {
            if let Err(err) = self.registry.reload_user(id, self.store.as_ref()).await {
                tracing::warn!(user_id = id, error = %err, "listing failed to load configs");
            }
        }
        self.registry.available_names(user_id).await
    }

    /// Fresh-read the caller's configs, then resolve. Reloading on every
    /// top-level call trades a little latency for immediate correctness
    /// after config edits.
    async fn checkout(&self, request: &GenerationRequest) -> Result<AdapterHandle> {
        request.validate()?;
        if let Some(user_id) = request.user_id {
            self.registry
                .reload_user(user_id, self.store.as_ref())
                .await?;
        }
        let handle = self
            .registry
            .resolve(request.model.as_deref(), request.user_id)
            .await?;
        tracing::info!(
            config_id = handle.config.id,
            adapter = %handle.config.name,
            "resolved adapter"
        );
        Ok(handle)
    }

    fn attempts_for(&self, request: &GenerationRequest, handle: &AdapterHandle) -> u32 {
        request.retry_count.unwrap_or(handle.config.retry_count) + 1
    }
}
