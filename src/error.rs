//! Error handling for the generation core.
//!
//! Every module converges on the single closed [`AiError`] type. Retry
//! classification lives here so the retry executor and the service agree on
//! what counts as transient.

use thiserror::Error;

/// Convenient alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error, Clone)]
pub enum AiError {
    /// A model configuration failed static validation. Surfaced before any
    /// network I/O and never retried.
    #[error("invalid model configuration: {0}")]
    ConfigurationError(String),

    /// The configured provider kind has no adapter implementation.
    #[error("unsupported provider kind: {0}")]
    UnsupportedProvider(String),

    /// Adapter resolution found nothing for the request. Carries every
    /// adapter name that *was* known, to aid debugging.
    #[error("no adapter available (requested: {requested:?}); known adapters: {available:?}")]
    NoAdapterAvailable {
        requested: Option<String>,
        available: Vec<String>,
    },

    /// Network-level failure while talking to the provider.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// The provider did not answer within the configured timeout.
    #[error("request timed out: {0}")]
    TimeoutError(String),

    /// The provider answered with a non-success HTTP status.
    #[error("API returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    /// The response body could not be decoded as JSON at the transport
    /// level. Distinct from malformed *model output*, which the structured
    /// parser degrades instead of raising.
    #[error("failed to decode response body: {0}")]
    JsonError(String),

    /// Extraction produced no usable content from an otherwise well-formed
    /// response.
    #[error("provider response contained no usable content")]
    EmptyResponse,

    /// All attempts exhausted. Wraps the last underlying error; intermediate
    /// failures are logged, not surfaced.
    #[error("generation failed after {attempts} attempts: {source}")]
    GenerationFailed {
        attempts: u32,
        #[source]
        source: Box<AiError>,
    },

    /// Parsed model output is missing required structure. The one point
    /// where malformed AI output hardens into an error.
    #[error("conversion failed at `{field}`: {message}")]
    ConversionError { field: String, message: String },
}

impl AiError {
    /// Whether the retry loop may attempt the operation again.
    ///
    /// Transport failures, timeouts, bad statuses, undecodable bodies and
    /// empty extractions are all transient from the caller's perspective;
    /// configuration and conversion problems are not.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_)
                | Self::TimeoutError(_)
                | Self::ApiError { .. }
                | Self::JsonError(_)
                | Self::EmptyResponse
        )
    }

    /// Shorthand used by the conversion layer.
    pub fn conversion(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConversionError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}
