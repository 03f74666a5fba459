//! Document sessions and the artifact store that holds them.
//!
//! A [`DocumentSession`] is everything derived from one uploaded file: the
//! extracted text and the artifacts each pipeline stage produces from it.
//! Sessions live in a [`SessionStore`] keyed by a generated [`SessionId`], and
//! every session sits behind its own async mutex so writes to one document are
//! serialised while different documents proceed independently.
//!
//! ## Artifact lifecycle
//!
//! ```text
//! Empty ─▶ Extracted ─▶ Classified ─▶ NotesReady ─▶ ManuscriptReady ─▶ AudioReady
//! ```
//!
//! Committing a stage's artifact overwrites the previous value and clears
//! every artifact downstream of it, so a regenerated category can never sit
//! next to notes produced under the old one.

use crate::error::NotecastError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

// ── Stages and states ────────────────────────────────────────────────────

/// One step of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Notes,
    Manuscript,
    Audio,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Classify => "classification",
            Stage::Notes => "note generation",
            Stage::Manuscript => "manuscript generation",
            Stage::Audio => "audio synthesis",
        };
        f.write_str(name)
    }
}

/// How far a session has progressed through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionState {
    Empty,
    Extracted,
    Classified,
    NotesReady,
    ManuscriptReady,
    AudioReady,
}

/// Subject category assigned by the classification stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Stem,
    Language,
    /// The provider answered with something other than the two accepted tokens.
    Unknown,
}

impl Category {
    /// Normalise a raw classification response.
    ///
    /// The response is trimmed and upper-cased; only the exact tokens `STEM`
    /// and `LANGUAGE` are accepted. Anything else, including a sentence that
    /// merely contains one of them, maps to [`Category::Unknown`].
    pub fn from_response(response: &str) -> Self {
        match response.trim().to_uppercase().as_str() {
            "STEM" => Category::Stem,
            "LANGUAGE" => Category::Language,
            _ => Category::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Stem => "STEM",
            Category::Language => "LANGUAGE",
            Category::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// The derived state of one uploaded document.
///
/// Fields are read through accessors; only the orchestrator commits new
/// artifacts, and only after a stage has fully succeeded.
#[derive(Debug, Clone, Default)]
pub struct DocumentSession {
    source_name: Option<String>,
    raw_text: String,
    category: Option<Category>,
    notes: Option<String>,
    manuscript: Option<String>,
    audio: Option<Vec<u8>>,
}

impl DocumentSession {
    /// Create a session for freshly extracted text.
    pub fn new(raw_text: impl Into<String>, source_name: Option<String>) -> Self {
        Self {
            source_name,
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }

    pub fn state(&self) -> SessionState {
        if self.audio.is_some() {
            SessionState::AudioReady
        } else if self.manuscript.is_some() {
            SessionState::ManuscriptReady
        } else if self.notes.is_some() {
            SessionState::NotesReady
        } else if self.category.is_some() {
            SessionState::Classified
        } else if !self.raw_text.is_empty() {
            SessionState::Extracted
        } else {
            SessionState::Empty
        }
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn manuscript(&self) -> Option<&str> {
        self.manuscript.as_deref()
    }

    pub fn audio(&self) -> Option<&[u8]> {
        self.audio.as_deref()
    }

    /// Check that the artifact `stage` consumes is present.
    pub fn require(&self, stage: Stage) -> Result<(), NotecastError> {
        let missing = match stage {
            Stage::Classify if self.raw_text.is_empty() => Some("uploaded text"),
            Stage::Notes if self.category.is_none() => Some("category"),
            Stage::Manuscript if self.notes.is_none() => Some("notes"),
            Stage::Audio if self.manuscript.is_none() => Some("manuscript"),
            _ => None,
        };
        match missing {
            Some(missing) => Err(NotecastError::PreconditionNotMet { stage, missing }),
            None => Ok(()),
        }
    }

    /// Replace the document text and drop every derived artifact.
    pub(crate) fn reset(&mut self, raw_text: String, source_name: Option<String>) {
        *self = Self::new(raw_text, source_name);
    }

    pub(crate) fn commit_category(&mut self, category: Category) {
        self.category = Some(category);
        self.notes = None;
        self.manuscript = None;
        self.audio = None;
    }

    pub(crate) fn commit_notes(&mut self, notes: String) {
        self.notes = Some(notes);
        self.manuscript = None;
        self.audio = None;
    }

    pub(crate) fn commit_manuscript(&mut self, manuscript: String) {
        self.manuscript = Some(manuscript);
        self.audio = None;
    }

    pub(crate) fn commit_audio(&mut self, audio: Vec<u8>) {
        self.audio = Some(audio);
    }
}

// ── Identifiers ──────────────────────────────────────────────────────────

/// Opaque identifier of a document session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = NotecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(SessionId)
            .map_err(|_| NotecastError::SessionNotFound { id: s.to_string() })
    }
}

// ── Store ────────────────────────────────────────────────────────────────

/// Handle to a single session; lock it to read or commit artifacts.
pub type SessionHandle = Arc<Mutex<DocumentSession>>;

/// In-memory artifact store keyed by [`SessionId`].
///
/// The outer map lock is only held long enough to look a handle up; all
/// stage work happens under the per-session mutex.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its identifier.
    pub async fn insert(&self, session: DocumentSession) -> SessionId {
        let id = SessionId::new();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        debug!("Session {} created", id);
        id
    }

    /// Look up the handle for `id`.
    pub async fn get(&self, id: SessionId) -> Result<SessionHandle, NotecastError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| NotecastError::SessionNotFound { id: id.to_string() })
    }

    /// Drop a session. Returns `false` if it did not exist.
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            debug!("Session {} removed", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
