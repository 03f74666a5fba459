//! Result payloads returned by [`crate::Notecast`] operations.
//!
//! These are plain serde types: the CLI prints them with `--json`, and a host
//! that puts an HTTP surface in front of the library can return them as-is.
//! Field names on the wire follow the camelCase the web client expects
//! (`formattedNotes`, `audioBase64`).

use crate::export::ExportTarget;
use crate::pipeline::extract::SourceFormat;
use crate::session::{Category, SessionId, SessionState};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Returned by an upload: where the document lives and how much text it had.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub session_id: SessionId,
    /// Characters of extracted text after line-ending normalisation.
    pub chars: usize,
    pub format: SourceFormat,
}

/// Result of the composite classify + notes operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesPayload {
    pub category: Category,
    #[serde(rename = "formattedNotes")]
    pub formatted_notes: String,
}

/// Result of the composite manuscript + synthesis operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    #[serde(rename = "audioBase64")]
    pub audio_base64: String,
}

impl AudioPayload {
    pub fn from_bytes(audio: &[u8]) -> Self {
        Self {
            audio_base64: STANDARD.encode(audio),
        }
    }
}

/// A generated lecture script plus how it measured against the requested band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manuscript {
    pub text: String,
    /// Length in characters.
    pub chars: usize,
    /// Whether `chars` fell inside the configured band.
    pub within_band: bool,
}

impl Manuscript {
    pub(crate) fn measure(text: String, band: &RangeInclusive<usize>) -> Self {
        let chars = text.chars().count();
        Self {
            within_band: band.contains(&chars),
            chars,
            text,
        }
    }
}

/// Binary download: encoded bytes plus the metadata a client needs to save them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

impl Attachment {
    pub(crate) fn export(target: ExportTarget, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: target.content_type(),
            file_name: target.file_name(),
        }
    }
}

/// Read-only view of a session's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub state: SessionState,
    pub source_name: Option<String>,
    pub raw_chars: usize,
    pub category: Option<Category>,
    pub notes_chars: Option<usize>,
    pub manuscript_chars: Option<usize>,
    pub audio_bytes: Option<usize>,
}
