//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the language model back ends
//! the agent can talk to (Ollama, OpenAI, Replicate). Providers only move
//! text: they receive the fixed instructions plus the serialized transcript
//! and return the raw reply. Turning that reply into an action is the
//! codec's job, not the provider's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LLMConfig;

pub mod ollama;
pub mod openai;
pub mod replicate;
pub mod scripted;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LLMError> for sdk::errors::EngineError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Timeout => Self::LLMTimeout,
            other => Self::LLMProvider(other.to_string()),
        }
    }
}

/// Sampling parameters forwarded to the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 500,
            top_p: 0.95,
        }
    }
}

/// One model invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Fixed system prompt
    pub instructions: String,

    /// Serialized conversation history
    pub transcript: String,

    pub sampling: Sampling,
}

impl CompletionRequest {
    pub fn new(
        instructions: impl Into<String>,
        transcript: impl Into<String>,
        sampling: Sampling,
    ) -> Self {
        Self {
            instructions: instructions.into(),
            transcript: transcript.into(),
            sampling,
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openai", "replicate")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama), false for cloud providers
    fn is_local(&self) -> bool;

    /// Send one request and return the raw reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Check if the provider is currently healthy and available
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Build the provider named by `llm.default_provider`
///
/// Providers are constructed once at startup and shared by reference; the
/// agent never reaches for a global client.
pub fn build_provider(config: &LLMConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.default_provider.as_str() {
        "ollama" => Arc::new(ollama::OllamaProvider::new(
            config.ollama.base_url.clone(),
            config.ollama.model.clone(),
        )?),
        "openai" => Arc::new(openai::OpenAIProvider::from_config(&config.openai)?),
        "replicate" => Arc::new(replicate::ReplicateProvider::from_config(
            &config.replicate,
        )?),
        other => anyhow::bail!("Unknown LLM provider '{}'", other),
    };

    tracing::info!("Using LLM provider: {}", provider.name());
    Ok(provider)
}

/// Map a reqwest send failure onto the provider error taxonomy
pub(crate) fn map_send_error(provider: &str, base_url: &str, e: reqwest::Error) -> LLMError {
    if e.is_timeout() {
        LLMError::Timeout
    } else if e.is_connect() {
        LLMError::ProviderUnavailable(format!(
            "Cannot connect to {} at {}",
            provider, base_url
        ))
    } else {
        LLMError::NetworkError(e.to_string())
    }
}

/// Map a non-success HTTP status onto the provider error taxonomy
pub(crate) fn map_status_error(status: reqwest::StatusCode, body: String) -> LLMError {
    match status.as_u16() {
        401 | 403 => LLMError::AuthenticationFailed(body),
        429 => LLMError::RateLimitExceeded,
        500..=599 => LLMError::ProviderUnavailable(format!("{}: {}", status, body)),
        _ => LLMError::InvalidRequest(format!("{}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::errors::EngineError;

    #[test]
    fn test_default_sampling() {
        let sampling = Sampling::default();
        assert_eq!(sampling.temperature, 0.2);
        assert_eq!(sampling.max_tokens, 500);
        assert_eq!(sampling.top_p, 0.95);
    }

    #[test]
    fn test_timeout_maps_to_engine_timeout() {
        let err: EngineError = LLMError::Timeout.into();
        assert!(matches!(err, EngineError::LLMTimeout));
        assert!(err.is_retryable());

        let err: EngineError = LLMError::RateLimitExceeded.into();
        assert!(matches!(err, EngineError::LLMProvider(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status_error(reqwest::StatusCode::UNAUTHORIZED, "no".into()),
            LLMError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            map_status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new()),
            LLMError::RateLimitExceeded
        ));
        assert!(matches!(
            map_status_error(reqwest::StatusCode::BAD_GATEWAY, String::new()),
            LLMError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            map_status_error(reqwest::StatusCode::BAD_REQUEST, String::new()),
            LLMError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_build_provider_rejects_unknown_name() {
        let mut config = LLMConfig::default();
        config.default_provider = "gpt-banana".to_string();
        assert!(build_provider(&config).is_err());
    }

    #[test]
    fn test_build_default_provider() {
        let provider = build_provider(&LLMConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert!(provider.is_local());
    }
}
