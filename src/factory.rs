//! Adapter construction.
//!
//! A pure mapping from a validated [`ModelConfig`] to a live adapter.
//! Construction never touches the network; connections are established on
//! the first generation call.

use std::sync::Arc;

use crate::adapter::{HttpAdapter, ProviderAdapter};
use crate::config::{ModelConfig, WireFormat};
use crate::error::{AiError, Result};

pub struct AdapterFactory;

impl AdapterFactory {
    /// Build an adapter for a config. Fails on invalid configuration or on a
    /// provider kind with no adapter implementation; kinds outside the enum
    /// are already rejected when the config record is parsed.
    pub fn build(config: Arc<ModelConfig>) -> Result<Arc<dyn ProviderAdapter>> {
        config.validate()?;
        if !Self::supported_kinds().contains(&config.provider_kind) {
            return Err(AiError::UnsupportedProvider(
                config.provider_kind.as_str().to_string(),
            ));
        }
        let adapter = HttpAdapter::new(config)?;
        Ok(Arc::new(adapter))
    }

    /// Provider kinds this build can serve.
    pub const fn supported_kinds() -> &'static [WireFormat] {
        WireFormat::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_adapter_for_every_supported_kind() {
        for kind in AdapterFactory::supported_kinds() {
            let config = ModelConfig::new(
                1,
                "probe",
                *kind,
                "https://api.example.com/generate",
                "some-model",
            );
            assert!(AdapterFactory::build(Arc::new(config)).is_ok(), "kind {kind}");
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_construction() {
        let mut config = ModelConfig::new(
            1,
            "broken",
            WireFormat::OpenAiChat,
            "not-a-url",
            "some-model",
        );
        config.temperature = 9.0;
        let err = AdapterFactory::build(Arc::new(config)).unwrap_err();
        assert!(matches!(err, AiError::ConfigurationError(_)));
    }
}
