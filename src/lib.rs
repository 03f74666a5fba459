//! # notecast
//!
//! Turn a lecture handout into study material: structured notes, a spoken
//! lecture script, an audio recording of it, and printable PDF / DOCX copies
//! of the notes.
//!
//! ## Why this crate?
//!
//! Long documents do not fit in one model call, and a generated artifact is
//! only useful if the ones built from it stay consistent. This crate splits
//! the text at paragraph boundaries, runs every generation step as a
//! separate stage with its own precondition, and commits a stage's output
//! only when the whole stage succeeded. A failure never leaves half-written
//! notes behind, and re-running a stage never requires a re-upload.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX / TXT
//!  │
//!  ├─ 1. Extract    decode the upload to text (pdfium, zip + quick-xml, UTF-8)
//!  ├─ 2. Classify   STEM / LANGUAGE / UNKNOWN from a bounded text prefix
//!  ├─ 3. Notes      paragraph-bounded chunks → LLM, sequentially, joined in order
//!  ├─ 4. Lecture    notes → spoken-register script (~3000–3500 chars)
//!  ├─ 5. Audio      script → speech synthesis (Google Cloud TTS by default)
//!  └─ 6. Export     notes → markdown tree → PDF or DOCX
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notecast::{ExportTarget, Notecast, NotecastConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LLM provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let notecast = Notecast::from_config(NotecastConfig::default())?;
//!     let receipt = notecast.upload_file("lecture.pdf").await?;
//!
//!     let notes = notecast.generate_notes(receipt.session_id).await?;
//!     println!("[{}]\n{}", notes.category, notes.formatted_notes);
//!
//!     let pdf = notecast.export(receipt.session_id, ExportTarget::Pdf).await?;
//!     std::fs::write(&pdf.file_name, &pdf.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notecast` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! notecast = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod studio;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{NotecastConfig, NotecastConfigBuilder};
pub use error::{NotecastError, ProviderError};
pub use export::{render, render_tree, ExportOptions, ExportTarget, NodeRenderer, PageSize};
pub use markdown::{parse, Block, ContentTree};
pub use output::{
    Attachment, AudioPayload, Manuscript, NotesPayload, SessionSnapshot, UploadReceipt,
};
pub use pipeline::chunk::{chunk_text, Chunk};
pub use pipeline::extract::{DefaultExtractor, SourceFormat, TextExtractor};
pub use pipeline::llm::{ContentGenerator, LlmGenerator};
pub use pipeline::speech::{AudioEncoding, GoogleTtsSynthesizer, SpeechSynthesizer, VoiceConfig};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use session::{Category, DocumentSession, SessionId, SessionState, SessionStore, Stage};
pub use studio::Notecast;
