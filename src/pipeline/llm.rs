//! Content-transform capability: "submit a prompt, get generated text".
//!
//! The orchestrator only sees the [`ContentGenerator`] trait, so tests can
//! script responses and hosts can plug in any backend. [`LlmGenerator`] is
//! the default implementation over an `edgequake_llm` provider.
//!
//! ## No retries
//!
//! A failed call surfaces immediately as a [`ProviderError`]. The stage that
//! made it aborts, nothing is committed, and the caller decides whether to
//! run the stage again.

use crate::config::NotecastConfig;
use crate::error::{NotecastError, ProviderError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default Gemini model used when `GEMINI_API_KEY` drives provider selection.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Generates text from a prompt.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// [`ContentGenerator`] backed by an `edgequake_llm` chat provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Duration,
}

impl LlmGenerator {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &NotecastConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve a provider from the config and environment, then wrap it.
    pub fn from_config(config: &NotecastConfig) -> Result<Self, NotecastError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];

        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await
        .map_err(|_| ProviderError::Timeout {
            secs: self.timeout.as_secs(),
        })?
        .map_err(|e| ProviderError::Failed {
            detail: e.to_string(),
        })?;

        debug!(
            "LLM call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the config.
fn build_options(config: &NotecastConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, NotecastError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        NotecastError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`NOTECAST_LLM_PROVIDER` + `NOTECAST_MODEL`), both set.
/// 4. **Gemini** when `GEMINI_API_KEY` is present.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &NotecastConfig) -> Result<Arc<dyn LLMProvider>, NotecastError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("NOTECAST_LLM_PROVIDER"),
        std::env::var("NOTECAST_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            return create_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| NotecastError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
