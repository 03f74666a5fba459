//! Error types for the notecast library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`NotecastError`] — returned to the caller from every public operation
//!   (unsupported upload, missing session, a stage invoked out of order, a
//!   stage whose provider call failed, an export that could not be written).
//!
//! * [`ProviderError`] — a single call to the content-transform or
//!   speech-synthesis capability failed. It never reaches the caller on its
//!   own: the orchestrator wraps it in [`NotecastError::StageFailed`] so the
//!   caller always learns *which* stage broke.
//!
//! A stage failure never mutates the session. Whatever was committed before
//! the failing call is still there, so the caller can simply re-invoke the
//! stage without re-uploading.

use crate::session::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the notecast library.
#[derive(Debug, Error)]
pub enum NotecastError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// The upload's format tag is not one of `pdf`, `docx`, `txt`.
    #[error("Unsupported file type '{format}'\nSupported formats: pdf, docx, txt.")]
    UnsupportedFormat { format: String },

    /// The upload has a supported format but its bytes could not be decoded.
    #[error("Failed to extract text from {format} upload: {detail}")]
    ExtractionFailed { format: String, detail: String },

    /// Extraction succeeded but produced no text at all.
    #[error("The uploaded document contains no extractable text")]
    EmptyDocument,

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    // ── Session errors ────────────────────────────────────────────────────
    /// No session is registered under this identifier.
    #[error("No document session with id '{id}'")]
    SessionNotFound { id: String },

    /// A stage was invoked before the artifact it depends on exists.
    #[error("Cannot run {stage}: {missing} not available yet")]
    PreconditionNotMet { stage: Stage, missing: &'static str },

    // ── Provider errors ───────────────────────────────────────────────────
    /// A provider call inside a stage failed; nothing was committed.
    #[error("{stage} failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    /// Answering a question about the document failed.
    #[error("Question answering failed: {source}")]
    QuestionFailed {
        #[source]
        source: ProviderError,
    },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Export was requested before any notes were generated.
    #[error("No notes to export; generate notes first")]
    NotesMissing,

    /// Rendering the content tree into the target encoding failed.
    #[error("{target} export failed: {detail}")]
    ExportFailed { target: String, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotecastError {
    /// The pipeline stage this error belongs to, if it is a stage error.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            NotecastError::PreconditionNotMet { stage, .. }
            | NotecastError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A single failed call to an external capability.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ProviderError {
    /// The provider rejected or failed the request.
    #[error("provider call failed: {detail}")]
    Failed { detail: String },

    /// The provider answered, but with nothing usable.
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// The call did not complete within the configured timeout.
    #[error("provider call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Non-success HTTP status from a REST provider.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
}
