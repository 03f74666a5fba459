//! Paginated PDF rendering.
//!
//! Text is set in the standard Helvetica / Helvetica-Bold Type1 fonts with
//! WinAnsi encoding, so no font program is embedded and the output opens in
//! every viewer. Line breaking uses the fonts' AFM advance widths.
//!
//! Layout is a single top-to-bottom cursor: each block asks for vertical
//! space, and when a line would cross the bottom margin a new page starts.
//! Table rows move to the next page whole when they fit on one; rows taller
//! than a page are split between pages line by line.
//!
//! Each page is a list of content-stream [`Operation`]s. Page numbers are
//! only known once everything is laid out, so the "Page N of M" footers are
//! appended in [`NodeRenderer::finish`], which then hands the pages to
//! `lopdf` for object numbering, stream compression and the xref table.

use super::{column_count, ExportOptions, NodeRenderer};
use crate::error::NotecastError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::mem;

const LINE_SPACING: f32 = 1.4;
const LIST_INDENT: f32 = 18.0;
const CELL_PADDING: f32 = 4.0;
const FOOTER_SIZE: f32 = 9.0;
const BORDER_WIDTH: f32 = 0.5;

// ── Fonts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

/// Helvetica advance widths for WinAnsi codes 32..=126.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold advance widths for WinAnsi codes 32..=126.
#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }

    /// Advance width of one WinAnsi byte in 1/1000 em.
    fn glyph_width(self, byte: u8) -> u16 {
        let table = match self {
            Font::Regular => &HELVETICA_WIDTHS,
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        match byte {
            32..=126 => table[(byte - 32) as usize],
            0x95 => 350,
            0x85 | 0x97 | 0x99 => 1000,
            0x91 | 0x92 => if self == Font::Bold { 278 } else { 222 },
            0x93 | 0x94 => if self == Font::Bold { 500 } else { 333 },
            _ => 556,
        }
    }

    fn width(self, text: &[u8], size: f32) -> f32 {
        text.iter().map(|&b| self.glyph_width(b) as f32).sum::<f32>() * size / 1000.0
    }
}

/// Map text to WinAnsi bytes. Characters outside the code page become `?`;
/// control characters become spaces.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            c if c.is_control() || c.is_whitespace() => b' ',
            _ => b'?',
        })
        .collect()
}

// ── Line breaking ────────────────────────────────────────────────────────

/// Greedy word wrap; words wider than the line are split between characters.
fn wrap(text: &[u8], font: Font, size: f32, max_width: f32) -> Vec<Vec<u8>> {
    let space = font.width(b" ", size);
    let mut lines = Vec::new();
    let mut line: Vec<u8> = Vec::new();
    let mut line_width = 0.0;

    for word in text.split(|&b| b == b' ').filter(|w| !w.is_empty()) {
        for piece in split_long_word(word, font, size, max_width) {
            let w = font.width(&piece, size);
            if line.is_empty() {
                line = piece;
                line_width = w;
            } else if line_width + space + w <= max_width {
                line.push(b' ');
                line.extend_from_slice(&piece);
                line_width += space + w;
            } else {
                lines.push(mem::replace(&mut line, piece));
                line_width = w;
            }
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn split_long_word(word: &[u8], font: Font, size: f32, max_width: f32) -> Vec<Vec<u8>> {
    if font.width(word, size) <= max_width {
        return vec![word.to_vec()];
    }
    let mut pieces = Vec::new();
    let mut current = Vec::new();
    let mut width = 0.0;
    for &b in word {
        let w = font.glyph_width(b) as f32 * size / 1000.0;
        if !current.is_empty() && width + w > max_width {
            pieces.push(mem::take(&mut current));
            width = 0.0;
        }
        current.push(b);
        width += w;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn heading_size(level: u8, body: f32) -> f32 {
    match level {
        1 => body + 9.0,
        2 => body + 5.0,
        3 => body + 2.0,
        _ => body + 1.0,
    }
}

// ── Renderer ─────────────────────────────────────────────────────────────

/// Operations that set one line of text at (`x`, `baseline`).
fn text_ops(font: Font, size: f32, x: f32, baseline: f32, text: &[u8]) -> [Operation; 5] {
    [
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.resource().into(), size.into()]),
        Operation::new("Td", vec![x.into(), baseline.into()]),
        Operation::new("Tj", vec![Object::string_literal(text.to_vec())]),
        Operation::new("ET", vec![]),
    ]
}

/// [`NodeRenderer`] producing a paginated PDF.
pub struct PdfRenderer {
    options: ExportOptions,
    width: f32,
    height: f32,
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    /// Top of the free area on the current page.
    y: f32,
    /// Nothing placed on the current page yet.
    fresh: bool,
}

impl PdfRenderer {
    pub fn new(options: ExportOptions) -> Self {
        let (width, height) = options.page_size.points();
        let y = height - options.margin;
        Self {
            options,
            width,
            height,
            pages: Vec::new(),
            current: Vec::new(),
            y,
            fresh: true,
        }
    }

    fn margin(&self) -> f32 {
        self.options.margin
    }

    fn body_size(&self) -> f32 {
        self.options.font_size
    }

    fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin()
    }

    fn bottom(&self) -> f32 {
        if self.options.page_numbers {
            self.margin() + FOOTER_SIZE * 2.0
        } else {
            self.margin()
        }
    }

    fn new_page(&mut self) {
        self.pages.push(mem::take(&mut self.current));
        self.y = self.height - self.margin();
        self.fresh = true;
    }

    fn ensure_space(&mut self, needed: f32) {
        if !self.fresh && self.y - needed < self.bottom() {
            self.new_page();
        }
    }

    /// Vertical space between blocks; dropped at the top of a page.
    fn gap(&mut self, amount: f32) {
        if !self.fresh {
            self.y -= amount;
        }
    }

    /// Advance one line without drawing anything.
    fn skip_line(&mut self, leading: f32) {
        self.ensure_space(leading);
        self.y -= leading;
        self.fresh = false;
    }

    fn draw_text(&mut self, x: f32, baseline: f32, font: Font, size: f32, text: &[u8]) {
        self.current.extend(text_ops(font, size, x, baseline, text));
        self.fresh = false;
    }

    fn draw_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.current.extend([
            Operation::new("w", vec![BORDER_WIDTH.into()]),
            Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
            Operation::new("S", vec![]),
        ]);
        self.fresh = false;
    }

    /// Wrap and set `text` starting at `x`, one line at a time.
    fn write_wrapped(&mut self, x: f32, width: f32, font: Font, size: f32, text: &[u8]) {
        let leading = size * LINE_SPACING;
        for line in wrap(text, font, size, width) {
            self.ensure_space(leading);
            self.y -= leading;
            self.draw_text(x, self.y + 0.3 * size, font, size, &line);
        }
    }

    fn footer(&self, page: usize, total: usize) -> [Operation; 5] {
        let label = encode_win_ansi(&format!("Page {} of {}", page, total));
        let x = (self.width - Font::Regular.width(&label, FOOTER_SIZE)) / 2.0;
        text_ops(Font::Regular, FOOTER_SIZE, x, self.margin() / 2.0, &label)
    }
}

impl NodeRenderer for PdfRenderer {
    fn heading(&mut self, level: u8, text: &str) {
        let size = heading_size(level, self.body_size());
        let body_leading = self.body_size() * LINE_SPACING;
        self.gap(size * 0.6);
        // Keep the heading on the same page as the first line after it.
        self.ensure_space(size * LINE_SPACING + body_leading);
        let (x, w) = (self.margin(), self.content_width());
        self.write_wrapped(x, w, Font::Bold, size, &encode_win_ansi(text));
        self.gap(size * 0.25);
    }

    fn paragraph(&mut self, text: &str) {
        let size = self.body_size();
        let leading = size * LINE_SPACING;
        let (x, w) = (self.margin(), self.content_width());
        for raw_line in text.split('\n') {
            if raw_line.trim().is_empty() {
                self.skip_line(leading);
                continue;
            }
            self.write_wrapped(x, w, Font::Regular, size, &encode_win_ansi(raw_line));
        }
        self.gap(size * 0.6);
    }

    fn list(&mut self, items: &[String], ordered: bool) {
        let size = self.body_size();
        let leading = size * LINE_SPACING;
        let marker_x = self.margin() + 2.0;
        let text_x = self.margin() + LIST_INDENT;
        let width = self.content_width() - LIST_INDENT;

        for (n, item) in items.iter().enumerate() {
            let marker = if ordered {
                format!("{}.", n + 1).into_bytes()
            } else {
                vec![0x95]
            };
            let lines = wrap(&encode_win_ansi(item), Font::Regular, size, width);
            if lines.is_empty() {
                self.skip_line(leading);
                self.draw_text(marker_x, self.y + 0.3 * size, Font::Regular, size, &marker);
                continue;
            }
            for (i, line) in lines.iter().enumerate() {
                self.ensure_space(leading);
                self.y -= leading;
                let baseline = self.y + 0.3 * size;
                if i == 0 {
                    self.draw_text(marker_x, baseline, Font::Regular, size, &marker);
                }
                self.draw_text(text_x, baseline, Font::Regular, size, line);
            }
        }
        self.gap(size * 0.6);
    }

    fn table(&mut self, rows: &[Vec<String>]) {
        let cols = column_count(rows);
        if cols == 0 {
            return;
        }
        let size = self.body_size();
        let leading = size * LINE_SPACING;
        let col_width = self.content_width() / cols as f32;
        let inner_width = (col_width - 2.0 * CELL_PADDING).max(size);
        let left = self.margin();

        self.gap(size * 0.3);
        for (r, row) in rows.iter().enumerate() {
            let font = if r == 0 && rows.len() > 1 { Font::Bold } else { Font::Regular };
            let cells: Vec<Vec<Vec<u8>>> = (0..cols)
                .map(|c| {
                    row.get(c)
                        .map(|text| wrap(&encode_win_ansi(text), font, size, inner_width))
                        .unwrap_or_default()
                })
                .collect();
            let total = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);

            let mut done = 0;
            while done < total {
                let remaining = total - done;
                let avail = self.y - self.bottom() - 2.0 * CELL_PADDING;
                let fit = (avail / leading).floor().max(0.0) as usize;
                if !self.fresh && (fit == 0 || (done == 0 && fit < remaining)) {
                    self.new_page();
                    continue;
                }
                let take = fit.max(1).min(remaining);
                let height = take as f32 * leading + 2.0 * CELL_PADDING;
                let top = self.y;

                for (c, lines) in cells.iter().enumerate() {
                    let x = left + c as f32 * col_width;
                    self.draw_rect(x, top - height, col_width, height);
                    for (k, line) in lines.iter().skip(done).take(take).enumerate() {
                        let baseline = top - CELL_PADDING - (k + 1) as f32 * leading + 0.3 * size;
                        self.draw_text(x + CELL_PADDING, baseline, font, size, line);
                    }
                }

                self.y = top - height;
                done += take;
            }
        }
        self.gap(size * 0.6);
    }

    fn finish(mut self) -> Result<Vec<u8>, NotecastError> {
        if !self.fresh || self.pages.is_empty() {
            self.pages.push(mem::take(&mut self.current));
        }

        let total = self.pages.len();
        if self.options.page_numbers {
            for i in 0..total {
                let footer = self.footer(i + 1, total);
                self.pages[i].extend(footer);
            }
        }

        assemble(self.pages, self.width, self.height, &self.options).map_err(|detail| {
            NotecastError::ExportFailed {
                target: "PDF".to_string(),
                detail,
            }
        })
    }
}

// ── File assembly ────────────────────────────────────────────────────────

fn font_dictionary(base_font: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Build the page tree around the laid-out pages and serialise it.
fn assemble(
    pages: Vec<Vec<Operation>>,
    width: f32,
    height: f32,
    options: &ExportOptions,
) -> Result<Vec<u8>, String> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font_dictionary("Helvetica"));
    let bold_id = doc.add_object(font_dictionary("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource() => regular_id,
            Font::Bold.resource() => bold_id,
        },
    });

    let count = pages.len() as i64;
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }
            .encode()
            .map_err(|e| format!("content stream: {}", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), width.into(), height.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(encode_win_ansi(&options.title)),
        "Producer" => Object::string_literal("notecast"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    if options.compress {
        doc.compress();
    }

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| e.to_string())?;
    Ok(out)
}
