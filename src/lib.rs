//! # Inkgen — resilient AI generation core
//!
//! Inkgen is the AI-provider abstraction of a novel-writing platform. It
//! turns a prompt plus a user-configured model endpoint into plain text or a
//! validated structured result, across heterogeneous and unreliable HTTP
//! text-generation services.
//!
//! What it does, in one request's lifetime:
//!
//! - resolves the right [`ModelConfig`] for the caller (user configs fully
//!   override system defaults, with graceful fallback);
//! - shapes the provider payload for the endpoint's wire format and reads
//!   the answer back through configurable field paths;
//! - retries transient failures with exponential backoff inside the
//!   configured budget;
//! - recovers a JSON object from free-form model output (reasoning
//!   preambles, markdown fences, trailing commas) and, for world-building
//!   generation, converts it into a canonical typed bundle.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use inkgen::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let system = ModelConfig::new(
//!         1,
//!         "default",
//!         WireFormat::OpenAiChat,
//!         "https://api.example.com/v1/chat/completions",
//!         "gpt-4o-mini",
//!     )
//!     .with_api_key("sk-...")
//!     .with_default(true);
//!
//!     let service = AiService::new(Arc::new(MemoryConfigStore::default()), vec![system]);
//!
//!     let result = service
//!         .generate_structured(
//!             GenerationRequest::new("Build a world for a silkpunk trilogy").for_user(42),
//!             WorldviewBundle::shape_hint(),
//!         )
//!         .await?;
//!
//!     let bundle = convert_worldview(&result.data)?;
//!     println!("world: {}", bundle.world_base.name);
//!     Ok(())
//! }
//! ```
#![deny(unsafe_code)]

pub mod adapter;
pub mod config;
pub mod error;
pub mod extract;
pub mod factory;
pub mod parser;
pub mod registry;
pub mod request;
pub mod retry;
pub mod service;
pub mod store;
pub mod worldview;

pub use adapter::{ConnectionProbe, HttpAdapter, ProviderAdapter, StructuredOutput};
pub use config::{ModelConfig, WireFormat};
pub use error::{AiError, Result};
pub use service::{AiService, Generation, GenerationRequest, StructuredGeneration};

/// Common imports for callers.
pub mod prelude {
    pub use crate::adapter::{ConnectionProbe, ProviderAdapter};
    pub use crate::config::{ModelConfig, WireFormat};
    pub use crate::error::{AiError, Result};
    pub use crate::factory::AdapterFactory;
    pub use crate::registry::AdapterRegistry;
    pub use crate::request::CallOptions;
    pub use crate::retry::RetryPolicy;
    pub use crate::service::{AiService, Generation, GenerationRequest, StructuredGeneration};
    pub use crate::store::{ConfigStore, MemoryConfigStore};
    pub use crate::worldview::{WorldviewBundle, convert_worldview};
}
