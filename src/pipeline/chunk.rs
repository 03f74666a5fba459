//! Paragraph-respecting text chunker.
//!
//! Note generation sends a long document to the provider in pieces. Cutting
//! at arbitrary offsets splits sentences, tables and worked examples across
//! two calls, and the model then formats each half badly. This chunker only
//! cuts at paragraph delimiters.
//!
//! ## Algorithm
//!
//! 1. Find paragraphs: maximal runs of non-blank lines. A delimiter is a run
//!    of one or more blank (whitespace-only) lines.
//! 2. Greedily pack consecutive paragraphs into the current chunk while the
//!    chunk, delimiters included, stays within `max_chars`.
//! 3. When the next paragraph would overflow, close the current chunk and
//!    start a new one with that paragraph. A paragraph longer than
//!    `max_chars` on its own becomes a chunk by itself, uncut.
//!
//! Every chunk is a slice of the input, so the delimiters between chunks are
//! exactly the source text between their spans. Lengths are counted in
//! `char`s, not bytes, so a limit means the same for accented or CJK text.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One contiguous, non-empty slice of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    /// The chunk text: from the first character of its first paragraph to
    /// the last non-whitespace character of its last paragraph.
    pub text: String,
    /// Byte range of `text` within the source.
    pub span: Range<usize>,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into ordered chunks of at most `max_chars` characters.
///
/// Empty or whitespace-only input yields no chunks; input without blank
/// lines yields exactly one.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    // (span of the chunk being built, its length in chars)
    let mut current: Option<(Range<usize>, usize)> = None;

    for para in paragraph_spans(text) {
        let para_chars = text[para.clone()].chars().count();
        current = match current.take() {
            None => Some((para, para_chars)),
            Some((span, chars)) => {
                let gap_chars = text[span.end..para.start].chars().count();
                let combined = chars + gap_chars + para_chars;
                if combined <= max_chars {
                    Some((span.start..para.end, combined))
                } else {
                    push_chunk(&mut chunks, text, span);
                    Some((para, para_chars))
                }
            }
        };
    }

    if let Some((span, _)) = current {
        push_chunk(&mut chunks, text, span);
    }
    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str, span: Range<usize>) {
    chunks.push(Chunk {
        index: chunks.len(),
        text: text[span.clone()].to_string(),
        span,
    });
}

/// Byte ranges of every paragraph, trailing whitespace excluded.
fn paragraph_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open: Option<Range<usize>> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let content = line.trim_end();
        if content.trim_start().is_empty() {
            if let Some(span) = open.take() {
                spans.push(span);
            }
            continue;
        }

        let end = start + content.len();
        match open.as_mut() {
            Some(span) => span.end = end,
            None => open = Some(start..end),
        }
    }

    if let Some(span) = open {
        spans.push(span);
    }
    spans
}
