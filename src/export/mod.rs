//! Content tree → PDF / DOCX.
//!
//! Both targets are driven by one traversal, [`render_tree`], which hands
//! each block to a [`NodeRenderer`]. A renderer only decides how a heading,
//! paragraph, list or table looks in its format; block order, empty trees and
//! the final byte buffer are handled the same way for every target.
//!
//! ```text
//! notes (markdown) ──▶ markdown::parse ──▶ ContentTree ──▶ render_tree ──┬──▶ PdfRenderer  ──▶ application/pdf
//!                                                                        └──▶ DocxRenderer ──▶ …wordprocessingml.document
//! ```
//!
//! Rendering is pure: no I/O, no shared state, so exports may run
//! concurrently with each other and with pipeline stages.

pub mod docx;
pub mod pdf;

use crate::error::NotecastError;
use crate::markdown::{Block, ContentTree};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use docx::DocxRenderer;
pub use pdf::PdfRenderer;

/// Base name used for exported files.
pub const EXPORT_FILE_STEM: &str = "AI_Study_Notes";

/// Output encoding of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    Pdf,
    Docx,
}

impl ExportTarget {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportTarget::Pdf => "application/pdf",
            ExportTarget::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportTarget::Pdf => "pdf",
            ExportTarget::Docx => "docx",
        }
    }

    /// Download filename, e.g. `AI_Study_Notes.pdf`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", EXPORT_FILE_STEM, self.extension())
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportTarget::Pdf => "PDF",
            ExportTarget::Docx => "DOCX",
        })
    }
}

impl FromStr for ExportTarget {
    type Err = NotecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportTarget::Pdf),
            "docx" | "word" => Ok(ExportTarget::Docx),
            other => Err(NotecastError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Physical page size for paginated output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in PDF points.
    pub fn points(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::Letter => (612.0, 792.0),
        }
    }

    /// Width and height in twentieths of a point (DOCX units).
    pub fn twips(&self) -> (u32, u32) {
        match self {
            PageSize::A4 => (11906, 16838),
            PageSize::Letter => (12240, 15840),
        }
    }
}

/// Layout options shared by both targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Document title stored in metadata. Default: "AI Study Notes".
    pub title: String,
    pub page_size: PageSize,
    /// Page margin in points. Default: 56 (about 2 cm).
    pub margin: f32,
    /// Body text size in points. Default: 11.
    pub font_size: f32,
    /// Print "Page N of M" at the foot of every PDF page. Default: true.
    pub page_numbers: bool,
    /// Flate-compress PDF content streams. Default: true.
    pub compress: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            title: "AI Study Notes".to_string(),
            page_size: PageSize::A4,
            margin: 56.0,
            font_size: 11.0,
            page_numbers: true,
            compress: true,
        }
    }
}

/// Per-target handler for block nodes.
pub trait NodeRenderer {
    fn heading(&mut self, level: u8, text: &str);
    fn paragraph(&mut self, text: &str);
    fn list(&mut self, items: &[String], ordered: bool);
    fn table(&mut self, rows: &[Vec<String>]);
    /// Produce the encoded document.
    fn finish(self) -> Result<Vec<u8>, NotecastError>;
}

/// Walk `tree` once, in order, feeding every block to `renderer`.
pub fn render_tree<R: NodeRenderer>(tree: &ContentTree, mut renderer: R) -> Result<Vec<u8>, NotecastError> {
    for block in &tree.blocks {
        match block {
            Block::Heading { level, text } => renderer.heading(*level, text),
            Block::Paragraph { text } => renderer.paragraph(text),
            Block::List { items, ordered } => renderer.list(items, *ordered),
            Block::Table { rows } => renderer.table(rows),
        }
    }
    renderer.finish()
}

/// Render `tree` into `target`'s encoding.
pub fn render(tree: &ContentTree, target: ExportTarget, options: &ExportOptions) -> Result<Vec<u8>, NotecastError> {
    match target {
        ExportTarget::Pdf => render_tree(tree, PdfRenderer::new(options.clone())),
        ExportTarget::Docx => render_tree(tree, DocxRenderer::new(options.clone())),
    }
}

/// Number of columns a table needs: its longest row.
pub(crate) fn column_count(rows: &[Vec<String>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}
