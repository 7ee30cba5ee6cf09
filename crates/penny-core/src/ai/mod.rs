//! Pluggable model gateway abstraction
//!
//! A gateway performs exactly one network exchange with a language model per
//! call. It knows nothing about categories, summaries or fallbacks: failures
//! come back as a `GatewayError` and the engine decides what they mean.
//!
//! # Architecture
//!
//! - `ModelGateway` trait: the single `invoke` operation plus health/identity
//! - `GatewayClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `OpenAICompatibleGateway`, `OllamaGateway`, `MockGateway`

mod mock;
mod ollama;
mod openai_compatible;

pub use mock::{MockGateway, MockStep};
pub use ollama::OllamaGateway;
pub use openai_compatible::OpenAICompatibleGateway;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{BackendConfig, BackendKind};

/// One model invocation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_output_tokens: u32,
    /// Bound on this single attempt
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_output_tokens: u32, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            max_output_tokens,
            timeout,
        }
    }
}

/// Why a model call produced no usable text
///
/// Never shown to end users. The engine turns every variant into a degraded
/// outcome and records the message in the audit log.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("model returned an empty completion")]
    EmptyCompletion,

    #[error("model backend not configured: {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Whether a second attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) | Self::MalformedResponse(_) => true,
            Self::EmptyCompletion => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured(_) => false,
        }
    }

    /// Classify a reqwest failure
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Trim a completion, rejecting blank text
pub(crate) fn finish_completion(text: &str) -> Result<String, GatewayError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(GatewayError::EmptyCompletion)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Longest error body kept in a `Status` error
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Trait implemented by every model backend
///
/// Backends must be Send + Sync to be shared across request handlers.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run one generation attempt and return the trimmed completion text
    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GatewayError>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (recorded in audit records)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete gateway client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum GatewayClient {
    /// OpenAI-compatible chat completions (OpenAI, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleGateway),
    /// Ollama generate API
    Ollama(OllamaGateway),
    /// Scripted backend for tests and offline development
    Mock(MockGateway),
    /// No host configured; every call fails with `NotConfigured`
    Unconfigured { kind: BackendKind, model: String },
}

impl GatewayClient {
    /// Build the gateway selected by config
    ///
    /// A missing host is not a startup error: the engine keeps serving
    /// degraded results until the backend is configured.
    pub fn from_config(config: &BackendConfig) -> Self {
        let host = config.host.as_deref().filter(|h| !h.trim().is_empty());

        match (config.kind, host) {
            (BackendKind::Mock, _) => GatewayClient::Mock(MockGateway::new()),
            (BackendKind::OpenAICompatible, Some(host)) => {
                let gateway = match config.api_key.as_deref() {
                    Some(key) => OpenAICompatibleGateway::with_api_key(host, &config.model, key),
                    None => OpenAICompatibleGateway::new(host, &config.model),
                };
                GatewayClient::OpenAICompatible(gateway)
            }
            (BackendKind::Ollama, Some(host)) => {
                GatewayClient::Ollama(OllamaGateway::new(host, &config.model))
            }
            (kind, None) => {
                tracing::warn!(
                    backend = kind.as_str(),
                    "No model host configured, AI features will return degraded results"
                );
                GatewayClient::Unconfigured {
                    kind,
                    model: config.model.clone(),
                }
            }
        }
    }

    /// Backend name for logging
    pub fn backend_name(&self) -> &'static str {
        match self {
            GatewayClient::OpenAICompatible(_) => "openai_compatible",
            GatewayClient::Ollama(_) => "ollama",
            GatewayClient::Mock(_) => "mock",
            GatewayClient::Unconfigured { .. } => "unconfigured",
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, GatewayClient::Unconfigured { .. })
    }
}

#[async_trait]
impl ModelGateway for GatewayClient {
    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GatewayError> {
        match self {
            GatewayClient::OpenAICompatible(g) => g.invoke(request).await,
            GatewayClient::Ollama(g) => g.invoke(request).await,
            GatewayClient::Mock(g) => g.invoke(request).await,
            GatewayClient::Unconfigured { kind, .. } => Err(GatewayError::NotConfigured(
                format!("no host set for {} backend", kind.as_str()),
            )),
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            GatewayClient::OpenAICompatible(g) => g.health_check().await,
            GatewayClient::Ollama(g) => g.health_check().await,
            GatewayClient::Mock(g) => g.health_check().await,
            GatewayClient::Unconfigured { .. } => false,
        }
    }

    fn model(&self) -> &str {
        match self {
            GatewayClient::OpenAICompatible(g) => g.model(),
            GatewayClient::Ollama(g) => g.model(),
            GatewayClient::Mock(g) => g.model(),
            GatewayClient::Unconfigured { model, .. } => model,
        }
    }

    fn host(&self) -> &str {
        match self {
            GatewayClient::OpenAICompatible(g) => g.host(),
            GatewayClient::Ollama(g) => g.host(),
            GatewayClient::Mock(g) => g.host(),
            GatewayClient::Unconfigured { .. } => "",
        }
    }
}
