//! Configuration for the study-artifact pipeline.
//!
//! Every knob lives in [`NotecastConfig`], built via [`NotecastConfigBuilder`].
//! Callers set only what they care about and get documented defaults for the
//! rest; `build()` rejects combinations that would make a stage meaningless.

use crate::error::NotecastError;
use crate::export::ExportOptions;
use crate::pipeline::speech::VoiceConfig;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Configuration for a [`crate::Notecast`] instance.
///
/// # Example
/// ```rust
/// use notecast::NotecastConfig;
///
/// let config = NotecastConfig::builder()
///     .max_chunk_chars(6_000)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_chunk_chars, 6_000);
/// ```
#[derive(Clone)]
pub struct NotecastConfig {
    /// Upper bound on a note-generation chunk, in characters. Default: 12 000.
    ///
    /// Paragraphs are never split, so a single paragraph longer than this is
    /// still sent whole.
    pub max_chunk_chars: usize,

    /// How much of the raw text the classifier sees, in characters. Default: 8 000.
    ///
    /// The subject of a document is almost always clear from its opening;
    /// sending the whole text only costs tokens.
    pub classify_prefix_chars: usize,

    /// Target manuscript length in characters. Default: 3000..=3500.
    ///
    /// Requested in the prompt and reported on the result; never enforced.
    pub manuscript_band: RangeInclusive<usize>,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `provider`, provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for every completion. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    pub max_tokens: usize,

    /// Per-call timeout for LLM and speech requests, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Voice used for audio synthesis.
    pub voice: VoiceConfig,

    /// Layout options for PDF/DOCX export.
    pub export: ExportOptions,

    /// Receives stage and chunk events. Default: no-op.
    pub progress_callback: ProgressCallback,
}

impl Default for NotecastConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 12_000,
            classify_prefix_chars: 8_000,
            manuscript_band: 3000..=3500,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 8192,
            api_timeout_secs: 120,
            voice: VoiceConfig::default(),
            export: ExportOptions::default(),
            progress_callback: Arc::new(NoopProgressCallback),
        }
    }
}

impl fmt::Debug for NotecastConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotecastConfig")
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("classify_prefix_chars", &self.classify_prefix_chars)
            .field("manuscript_band", &self.manuscript_band)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("voice", &self.voice)
            .field("export", &self.export)
            .finish()
    }
}

impl NotecastConfig {
    /// Create a new builder for `NotecastConfig`.
    pub fn builder() -> NotecastConfigBuilder {
        NotecastConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NotecastConfig`].
#[derive(Debug)]
pub struct NotecastConfigBuilder {
    config: NotecastConfig,
}

impl NotecastConfigBuilder {
    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn classify_prefix_chars(mut self, n: usize) -> Self {
        self.config.classify_prefix_chars = n;
        self
    }

    pub fn manuscript_band(mut self, band: RangeInclusive<usize>) -> Self {
        self.config.manuscript_band = band;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn voice(mut self, voice: VoiceConfig) -> Self {
        self.config.voice = voice;
        self
    }

    pub fn export(mut self, options: ExportOptions) -> Self {
        self.config.export = options;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = cb;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NotecastConfig, NotecastError> {
        let c = &self.config;
        if c.max_chunk_chars == 0 {
            return Err(NotecastError::InvalidConfig(
                "max_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.classify_prefix_chars == 0 {
            return Err(NotecastError::InvalidConfig(
                "classify_prefix_chars must be ≥ 1".into(),
            ));
        }
        if c.manuscript_band.is_empty() {
            return Err(NotecastError::InvalidConfig(format!(
                "manuscript_band {}..={} is empty",
                c.manuscript_band.start(),
                c.manuscript_band.end()
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(NotecastError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.voice.language_code.trim().is_empty() {
            return Err(NotecastError::InvalidConfig(
                "voice language code must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
