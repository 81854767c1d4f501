//! LLM access for the oracle.
//!
//! One [`LlmProvider`] per process, built by [`create_provider`] over rig-core
//! (OpenAI or Anthropic). The provider carries [`Sampling`] defaults so every
//! oracle question runs deterministically unless a request says otherwise.

pub mod costs;
pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::fmt;
use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    pub fn label(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }

    /// Environment variable holding this backend's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::OpenAi => "gpt-4o",
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "gpt" => Ok(Self::OpenAi),
            other => Err(format!("unknown LLM backend '{other}'")),
        }
    }
}

/// Sampling applied to requests that leave it unset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    /// Output token budget per call.
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
    pub sampling: Sampling,
}

impl LlmConfig {
    /// Config for `backend` with its default model and deterministic sampling.
    pub fn new(backend: LlmBackend, api_key: SecretString) -> Self {
        Self {
            backend,
            api_key,
            model: backend.default_model().to_string(),
            sampling: Sampling::default(),
        }
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::{anthropic, openai};

    let key = config.api_key.expose_secret();
    let provider: Arc<dyn LlmProvider> = match config.backend {
        LlmBackend::Anthropic => {
            let client: rig::client::Client<anthropic::client::AnthropicExt> =
                anthropic::Client::new(key).map_err(|e| client_error(config.backend, e))?;
            Arc::new(RigAdapter::new(
                client.completion_model(&config.model),
                &config.model,
                config.sampling,
            ))
        }
        LlmBackend::OpenAi => {
            let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
                openai::Client::new(key).map_err(|e| client_error(config.backend, e))?;
            Arc::new(RigAdapter::new(
                client.completion_model(&config.model),
                &config.model,
                config.sampling,
            ))
        }
    };

    tracing::info!(
        backend = %config.backend,
        model = %config.model,
        temperature = config.sampling.temperature,
        max_tokens = config.sampling.max_tokens,
        "LLM provider ready"
    );
    Ok(provider)
}

fn client_error(backend: LlmBackend, e: impl fmt::Display) -> LlmError {
    LlmError::RequestFailed {
        provider: backend.label().to_string(),
        reason: format!("Failed to create {backend} client: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_deterministic() {
        let config = LlmConfig::new(LlmBackend::OpenAi, SecretString::from("sk-test"));
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.sampling.temperature, 0.0);
        assert!(config.sampling.max_tokens > 0);
    }

    #[test]
    fn backends_build_with_their_default_models() {
        // rig-core accepts any key at construction; auth fails on first request.
        for backend in [LlmBackend::OpenAi, LlmBackend::Anthropic] {
            let config = LlmConfig::new(backend, SecretString::from("test-key"));
            let provider = create_provider(&config).unwrap();
            assert_eq!(provider.model_name(), backend.default_model());
            assert!(provider.cost_per_token().0 > rust_decimal::Decimal::ZERO);
        }
    }

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("OpenAI".parse::<LlmBackend>(), Ok(LlmBackend::OpenAi));
        assert_eq!("claude".parse::<LlmBackend>(), Ok(LlmBackend::Anthropic));
        assert!("mistral".parse::<LlmBackend>().is_err());
        assert_eq!(LlmBackend::Anthropic.api_key_var(), "ANTHROPIC_API_KEY");
    }
}
