//! Text extraction from uploaded files.
//!
//! Three formats are accepted, identified by a case-insensitive tag (usually
//! the file extension):
//!
//! | Tag    | Decoder                                                  |
//! |--------|----------------------------------------------------------|
//! | `txt`  | UTF-8, invalid sequences replaced                        |
//! | `docx` | `word/document.xml` read from the zip container          |
//! | `pdf`  | pdfium text layer, one page after another                |
//!
//! DOCX paragraphs and PDF pages are separated by a blank line so the chunker
//! sees them as paragraph boundaries.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state; calling it from a tokio
//! worker would stall the runtime for the length of the parse. Zip inflation
//! for large DOCX files is CPU-bound too, so both run on the blocking pool.

use crate::error::NotecastError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use zip::ZipArchive;

/// A supported upload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Txt,
}

impl SourceFormat {
    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, NotecastError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for SourceFormat {
    type Err = NotecastError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(SourceFormat::Pdf),
            "docx" => Ok(SourceFormat::Docx),
            "txt" => Ok(SourceFormat::Txt),
            _ => Err(NotecastError::UnsupportedFormat {
                format: tag.to_string(),
            }),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Docx => "docx",
            SourceFormat::Txt => "txt",
        })
    }
}

/// Decodes upload bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], format: SourceFormat) -> Result<String, NotecastError>;
}

/// The built-in extractor for PDF, DOCX and TXT.
#[derive(Debug, Clone, Default)]
pub struct DefaultExtractor;

#[async_trait]
impl TextExtractor for DefaultExtractor {
    async fn extract(&self, bytes: &[u8], format: SourceFormat) -> Result<String, NotecastError> {
        let text = match format {
            SourceFormat::Txt => String::from_utf8_lossy(bytes).into_owned(),
            SourceFormat::Docx => {
                let owned = bytes.to_vec();
                tokio::task::spawn_blocking(move || extract_docx(&owned))
                    .await
                    .map_err(|e| NotecastError::Internal(format!("DOCX task panicked: {}", e)))??
            }
            SourceFormat::Pdf => {
                let owned = bytes.to_vec();
                tokio::task::spawn_blocking(move || extract_pdf(&owned))
                    .await
                    .map_err(|e| NotecastError::Internal(format!("PDF task panicked: {}", e)))??
            }
        };
        debug!("Extracted {} chars from {} upload", text.chars().count(), format);
        Ok(text)
    }
}

// ── DOCX ─────────────────────────────────────────────────────────────────

fn docx_error(detail: impl fmt::Display) -> NotecastError {
    NotecastError::ExtractionFailed {
        format: "docx".to_string(),
        detail: detail.to_string(),
    }
}

/// Read the body paragraphs of a DOCX container.
pub(crate) fn extract_docx(bytes: &[u8]) -> Result<String, NotecastError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| docx_error(format!("not a zip container: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| docx_error("word/document.xml missing"))?
        .read_to_string(&mut xml)
        .map_err(|e| docx_error(format!("failed to read document.xml: {}", e)))?;

    let paragraphs = docx_paragraphs(&xml)?;
    Ok(paragraphs.join("\n\n"))
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>, NotecastError> {
    let mut reader = Reader::from_str(xml);
    // Whitespace inside <w:t xml:space="preserve"> is content.
    reader.trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"br" | b"cr" => current.push('\n'),
                b"tab" => current.push('\t'),
                _ => {}
            },
            Ok(Event::Text(ref t)) if in_text => {
                let text = t.unescape().map_err(docx_error)?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(docx_error(format!("XML error at {}: {}", reader.buffer_position(), e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

// ── PDF ──────────────────────────────────────────────────────────────────

fn pdf_error(detail: impl fmt::Display) -> NotecastError {
    NotecastError::ExtractionFailed {
        format: "pdf".to_string(),
        detail: detail.to_string(),
    }
}

/// Bind pdfium: `PDFIUM_LIB_PATH` first, then the working directory, then the system.
fn bind_pdfium() -> Result<Pdfium, NotecastError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| {
        pdf_error(format!(
            "pdfium library not available ({e:?}); set PDFIUM_LIB_PATH to libpdfium"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, NotecastError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| pdf_error(format!("{:?}", e)))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut out = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| pdf_error(format!("page {}: {:?}", idx + 1, e)))?
            .all();
        let text = text.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
    }
    Ok(out.join("\n\n"))
}
