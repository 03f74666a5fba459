//! The pipeline orchestrator.
//!
//! [`Notecast`] owns the artifact store and the three capabilities
//! (extraction, content generation, speech synthesis) and sequences them:
//!
//! ```text
//! upload ─▶ classify ─▶ write_notes ─▶ generate_manuscript ─▶ synthesize_audio
//!                              │
//!                              └─▶ export (PDF / DOCX, any time after notes)
//! ```
//!
//! ## Failure isolation
//!
//! Every stage checks its precondition, makes its provider calls, and only
//! then commits. A failing call aborts the stage with
//! [`NotecastError::StageFailed`] and leaves the session exactly as it was:
//! the caller can re-run the stage without re-uploading.
//!
//! ## Locking
//!
//! A stage holds its session's mutex from precondition check to commit, so
//! two requests against one document run one after the other. Different
//! documents never share a lock. Exports and questions copy what they need
//! and release the lock before doing any work.

use crate::config::NotecastConfig;
use crate::error::{NotecastError, ProviderError};
use crate::export::{self, ExportTarget};
use crate::markdown;
use crate::output::{
    Attachment, AudioPayload, Manuscript, NotesPayload, SessionSnapshot, UploadReceipt,
};
use crate::pipeline::chunk::chunk_text;
use crate::pipeline::extract::{DefaultExtractor, SourceFormat, TextExtractor};
use crate::pipeline::llm::{ContentGenerator, LlmGenerator};
use crate::pipeline::speech::{GoogleTtsSynthesizer, SpeechSynthesizer};
use crate::pipeline::tidy::{normalise_line_endings, speech_text, tidy_markdown};
use crate::prompts;
use crate::session::{Category, DocumentSession, SessionId, SessionStore, Stage};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Turns uploaded documents into notes, lecture scripts, audio and exports.
pub struct Notecast {
    config: NotecastConfig,
    generator: Arc<dyn ContentGenerator>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    extractor: Arc<dyn TextExtractor>,
    store: SessionStore,
}

impl Notecast {
    /// Orchestrator over `generator`, with the built-in extractor and no
    /// speech synthesizer.
    pub fn new(config: NotecastConfig, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            config,
            generator,
            synthesizer: None,
            extractor: Arc::new(DefaultExtractor),
            store: SessionStore::new(),
        }
    }

    /// Build the default adapters from config and environment.
    ///
    /// The LLM provider must resolve. Speech synthesis is optional: without
    /// `GOOGLE_TTS_API_KEY` the audio stage reports
    /// [`NotecastError::ProviderNotConfigured`] when invoked.
    pub fn from_config(config: NotecastConfig) -> Result<Self, NotecastError> {
        let generator = Arc::new(LlmGenerator::from_config(&config)?);
        let synthesizer = match GoogleTtsSynthesizer::from_env(config.api_timeout_secs) {
            Ok(tts) => Some(Arc::new(tts) as Arc<dyn SpeechSynthesizer>),
            Err(e) => {
                debug!("Speech synthesis unavailable: {}", e);
                None
            }
        };
        let mut notecast = Self::new(config, generator);
        notecast.synthesizer = synthesizer;
        Ok(notecast)
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &NotecastConfig {
        &self.config
    }

    // ── Upload ───────────────────────────────────────────────────────────

    async fn extract(&self, bytes: &[u8], format: SourceFormat) -> Result<String, NotecastError> {
        let text = normalise_line_endings(&self.extractor.extract(bytes, format).await?);
        if text.trim().is_empty() {
            return Err(NotecastError::EmptyDocument);
        }
        Ok(text)
    }

    /// Extract `bytes` and open a new session for the text.
    pub async fn upload(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        source_name: Option<String>,
    ) -> Result<UploadReceipt, NotecastError> {
        let text = self.extract(bytes, format).await?;
        let chars = text.chars().count();
        let session_id = self.store.insert(DocumentSession::new(text, source_name)).await;
        info!("Uploaded {} document ({} chars) as session {}", format, chars, session_id);
        Ok(UploadReceipt {
            session_id,
            chars,
            format,
        })
    }

    /// Open a session over text the caller already has.
    pub async fn upload_text(
        &self,
        text: &str,
        source_name: Option<String>,
    ) -> Result<UploadReceipt, NotecastError> {
        self.upload(text.as_bytes(), SourceFormat::Txt, source_name).await
    }

    /// Read a file from disk, detect its format from the extension, and upload it.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadReceipt, NotecastError> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path)?;
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => NotecastError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => NotecastError::ExtractionFailed {
                format: format.to_string(),
                detail: e.to_string(),
            },
        })?;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        self.upload(&bytes, format, name).await
    }

    /// Swap the document behind an existing session, dropping every artifact.
    pub async fn replace_document(
        &self,
        id: SessionId,
        bytes: &[u8],
        format: SourceFormat,
        source_name: Option<String>,
    ) -> Result<UploadReceipt, NotecastError> {
        let handle = self.store.get(id).await?;
        let text = self.extract(bytes, format).await?;
        let chars = text.chars().count();
        handle.lock().await.reset(text, source_name);
        info!("Replaced document in session {} ({} chars)", id, chars);
        Ok(UploadReceipt {
            session_id: id,
            chars,
            format,
        })
    }

    // ── Stages ───────────────────────────────────────────────────────────

    fn stage_failed(&self, stage: Stage, source: ProviderError) -> NotecastError {
        warn!("{} failed: {}", stage, source);
        self.config
            .progress_callback
            .on_stage_error(stage, &source.to_string());
        NotecastError::StageFailed { stage, source }
    }

    /// Assign the document a subject category.
    ///
    /// Only a bounded prefix of the text is sent. A response other than
    /// `STEM` or `LANGUAGE` is stored as [`Category::Unknown`].
    pub async fn classify(&self, id: SessionId) -> Result<Category, NotecastError> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;
        session.require(Stage::Classify)?;

        let cb = &self.config.progress_callback;
        cb.on_stage_start(Stage::Classify);

        let prefix = char_prefix(session.raw_text(), self.config.classify_prefix_chars);
        let response = self
            .generator
            .generate(&prompts::classification_prompt(prefix))
            .await
            .map_err(|e| self.stage_failed(Stage::Classify, e))?;

        let category = Category::from_response(&response);
        if category == Category::Unknown {
            warn!(
                "Session {}: unrecognised classification {:?}, using general notes",
                id,
                response.trim()
            );
        }
        session.commit_category(category);
        info!("Session {} classified as {}", id, category);
        cb.on_stage_complete(Stage::Classify, response.chars().count());
        Ok(category)
    }

    /// Generate structured notes, one provider call per chunk, in order.
    ///
    /// Notes are committed only once every chunk has succeeded. A chunk whose
    /// response tidies down to nothing fails the stage.
    pub async fn write_notes(&self, id: SessionId) -> Result<String, NotecastError> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;
        session.require(Stage::Notes)?;
        let category = session.category().unwrap_or(Category::Unknown);

        let cb = &self.config.progress_callback;
        cb.on_stage_start(Stage::Notes);
        let start = Instant::now();

        let chunks = chunk_text(session.raw_text(), self.config.max_chunk_chars);
        let total = chunks.len();
        info!("Session {}: generating {} notes from {} chunks", id, category, total);

        let mut parts = Vec::with_capacity(total);
        for chunk in &chunks {
            cb.on_chunk_start(chunk.index, total);
            let response = self
                .generator
                .generate(&prompts::notes_prompt(category, &chunk.text))
                .await
                .map_err(|e| self.stage_failed(Stage::Notes, e))?;
            let cleaned = tidy_markdown(&response);
            if cleaned.is_empty() {
                warn!("Chunk {}/{} produced no notes", chunk.index + 1, total);
                return Err(self.stage_failed(Stage::Notes, ProviderError::EmptyResponse));
            }
            let notes_chars = cleaned.chars().count();
            debug!(
                "Chunk {}/{}: {} chars in, {} chars of notes",
                chunk.index + 1,
                total,
                chunk.char_len(),
                notes_chars
            );
            cb.on_chunk_complete(chunk.index, total, notes_chars);
            parts.push(cleaned);
        }

        let notes = parts.join("\n\n");
        let notes_chars = notes.chars().count();
        session.commit_notes(notes.clone());
        info!(
            "Session {}: notes ready ({} chars, {}ms)",
            id,
            notes_chars,
            start.elapsed().as_millis()
        );
        cb.on_stage_complete(Stage::Notes, notes_chars);
        Ok(notes)
    }

    /// Rewrite the notes as a spoken-register lecture script.
    ///
    /// The configured length band is requested from the provider and reported
    /// on the result; a script outside it is still committed.
    pub async fn generate_manuscript(&self, id: SessionId) -> Result<Manuscript, NotecastError> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;
        session.require(Stage::Manuscript)?;

        let cb = &self.config.progress_callback;
        cb.on_stage_start(Stage::Manuscript);

        let band = &self.config.manuscript_band;
        let prompt = prompts::lecture_prompt(
            session.notes().unwrap_or_default(),
            *band.start(),
            *band.end(),
        );
        let response = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| self.stage_failed(Stage::Manuscript, e))?;

        let manuscript = Manuscript::measure(tidy_markdown(&response), band);
        if !manuscript.within_band {
            warn!(
                "Session {}: manuscript is {} chars, outside {}..={}",
                id,
                manuscript.chars,
                band.start(),
                band.end()
            );
        }
        session.commit_manuscript(manuscript.text.clone());
        info!("Session {}: manuscript ready ({} chars)", id, manuscript.chars);
        cb.on_stage_complete(Stage::Manuscript, manuscript.chars);
        Ok(manuscript)
    }

    /// Synthesise the manuscript into audio with the configured voice.
    pub async fn synthesize_audio(&self, id: SessionId) -> Result<Vec<u8>, NotecastError> {
        let handle = self.store.get(id).await?;
        let mut session = handle.lock().await;
        session.require(Stage::Audio)?;

        let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
            NotecastError::ProviderNotConfigured {
                provider: "speech".to_string(),
                hint: "Set GOOGLE_TTS_API_KEY or attach a synthesizer with Notecast::with_synthesizer."
                    .to_string(),
            }
        })?;

        let cb = &self.config.progress_callback;
        cb.on_stage_start(Stage::Audio);

        let text = speech_text(session.manuscript().unwrap_or_default());
        let audio = synthesizer
            .synthesize(&text, &self.config.voice)
            .await
            .map_err(|e| self.stage_failed(Stage::Audio, e))?;
        if audio.is_empty() {
            return Err(self.stage_failed(Stage::Audio, ProviderError::EmptyResponse));
        }

        session.commit_audio(audio.clone());
        info!("Session {}: audio ready ({} bytes)", id, audio.len());
        cb.on_stage_complete(Stage::Audio, audio.len());
        Ok(audio)
    }

    // ── Composite operations ─────────────────────────────────────────────

    /// Classify, then generate notes.
    pub async fn generate_notes(&self, id: SessionId) -> Result<NotesPayload, NotecastError> {
        let category = self.classify(id).await?;
        let formatted_notes = self.write_notes(id).await?;
        Ok(NotesPayload {
            category,
            formatted_notes,
        })
    }

    /// Write the lecture script, then synthesise it.
    pub async fn generate_audio(&self, id: SessionId) -> Result<AudioPayload, NotecastError> {
        self.generate_manuscript(id).await?;
        let audio = self.synthesize_audio(id).await?;
        Ok(AudioPayload::from_bytes(&audio))
    }

    // ── Read-only operations ─────────────────────────────────────────────

    /// Answer `question` from the document's own text. The session is not modified.
    pub async fn ask(&self, id: SessionId, question: &str) -> Result<String, NotecastError> {
        let handle = self.store.get(id).await?;
        let document = {
            let session = handle.lock().await;
            session.require(Stage::Classify)?;
            session.raw_text().to_string()
        };
        let answer = self
            .generator
            .generate(&prompts::ask_prompt(&document, question))
            .await
            .map_err(|source| {
                warn!("Session {}: question failed: {}", id, source);
                NotecastError::QuestionFailed { source }
            })?;
        Ok(answer.trim().to_string())
    }

    /// Render the session's notes as a PDF or DOCX attachment.
    pub async fn export(&self, id: SessionId, target: ExportTarget) -> Result<Attachment, NotecastError> {
        let handle = self.store.get(id).await?;
        let notes = handle
            .lock()
            .await
            .notes()
            .map(str::to_string)
            .ok_or(NotecastError::NotesMissing)?;

        let options = self.config.export.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            export::render(&markdown::parse(&notes), target, &options)
        })
        .await
        .map_err(|e| NotecastError::Internal(format!("{} export task panicked: {}", target, e)))??;

        info!("Session {}: exported {} ({} bytes)", id, target, bytes.len());
        Ok(Attachment::export(target, bytes))
    }

    /// Current state and artifact sizes of a session.
    pub async fn snapshot(&self, id: SessionId) -> Result<SessionSnapshot, NotecastError> {
        let handle = self.store.get(id).await?;
        let session = handle.lock().await;
        Ok(SessionSnapshot {
            session_id: id,
            state: session.state(),
            source_name: session.source_name().map(str::to_string),
            raw_chars: session.raw_text().chars().count(),
            category: session.category(),
            notes_chars: session.notes().map(|n| n.chars().count()),
            manuscript_chars: session.manuscript().map(|m| m.chars().count()),
            audio_bytes: session.audio().map(<[u8]>::len),
        })
    }

    /// Notes committed for a session, if any.
    pub async fn notes(&self, id: SessionId) -> Result<Option<String>, NotecastError> {
        let handle = self.store.get(id).await?;
        let session = handle.lock().await;
        Ok(session.notes().map(str::to_string))
    }

    /// Drop a session and everything derived from it.
    pub async fn remove(&self, id: SessionId) -> bool {
        self.store.remove(id).await
    }
}

/// The first `max_chars` characters of `text`.
fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn prefix_is_char_bounded() {
        assert_eq!(char_prefix("hello", 3), "hel");
        assert_eq!(char_prefix("hi", 10), "hi");
        assert_eq!(char_prefix("ééé", 2), "éé");
        assert_eq!(char_prefix("", 5), "");
    }

    /// Returns its canned answers in order and records every prompt.
    struct Scripted {
        answers: Mutex<Vec<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<&str, ProviderError>>) -> Arc<Self> {
            let mut answers: Vec<_> = answers
                .into_iter()
                .map(|a| a.map(str::to_string))
                .collect();
            answers.reverse();
            Arc::new(Self {
                answers: Mutex::new(answers),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ContentGenerator for Scripted {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ProviderError::EmptyResponse))
        }
    }

    #[tokio::test]
    async fn classification_prompt_sees_only_prefix() {
        let generator = Scripted::new(vec![Ok("STEM")]);
        let config = NotecastConfig::builder()
            .classify_prefix_chars(5)
            .build()
            .unwrap();
        let notecast = Notecast::new(config, generator.clone());
        let id = notecast
            .upload_text("abcdefghij", None)
            .await
            .unwrap()
            .session_id;

        notecast.classify(id).await.unwrap();
        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.ends_with("abcde"), "got: {prompt}");
    }

    #[tokio::test]
    async fn upload_normalises_line_endings() {
        let notecast = Notecast::new(NotecastConfig::default(), Scripted::new(vec![]));
        let receipt = notecast.upload_text("a\r\n\r\nb\rc", None).await.unwrap();
        assert_eq!(receipt.chars, 6);
        assert_eq!(receipt.format, SourceFormat::Txt);
    }

    #[tokio::test]
    async fn whitespace_upload_is_empty_document() {
        let notecast = Notecast::new(NotecastConfig::default(), Scripted::new(vec![]));
        let err = notecast.upload_text(" \n\n\t", None).await.unwrap_err();
        assert!(matches!(err, NotecastError::EmptyDocument));
    }

    #[tokio::test]
    async fn audio_without_synthesizer_is_not_configured() {
        let generator = Scripted::new(vec![Ok("STEM"), Ok("notes"), Ok("script")]);
        let notecast = Notecast::new(NotecastConfig::default(), generator);
        let id = notecast.upload_text("text", None).await.unwrap().session_id;
        notecast.generate_notes(id).await.unwrap();
        notecast.generate_manuscript(id).await.unwrap();

        let err = notecast.synthesize_audio(id).await.unwrap_err();
        assert!(matches!(err, NotecastError::ProviderNotConfigured { .. }));
        let snap = notecast.snapshot(id).await.unwrap();
        assert_eq!(snap.state, crate::session::SessionState::ManuscriptReady);
    }

    #[tokio::test]
    async fn replace_document_drops_artifacts() {
        let generator = Scripted::new(vec![Ok("LANGUAGE")]);
        let notecast = Notecast::new(NotecastConfig::default(), generator);
        let id = notecast.upload_text("first", None).await.unwrap().session_id;
        notecast.classify(id).await.unwrap();

        notecast
            .replace_document(id, b"second", SourceFormat::Txt, Some("b.txt".into()))
            .await
            .unwrap();
        let snap = notecast.snapshot(id).await.unwrap();
        assert_eq!(snap.category, None);
        assert_eq!(snap.raw_chars, 6);
        assert_eq!(snap.source_name.as_deref(), Some("b.txt"));
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let notecast = Notecast::new(NotecastConfig::default(), Scripted::new(vec![]));
        let err = notecast.classify(SessionId::new()).await.unwrap_err();
        assert!(matches!(err, NotecastError::SessionNotFound { .. }));
    }
}
