//! Word-processing (DOCX) rendering.
//!
//! Blocks become `docx-rs` paragraphs and tables, kept in body order until
//! [`NodeRenderer::finish`] builds the [`Docx`] and packs it into a zip
//! container.
//!
//! Headings use the `Heading1`..`Heading6` style ids so Word's navigation
//! pane and table of contents pick them up. List items become ordinary
//! paragraphs with a bullet or number prefix; tables get one cell per column
//! at equal percentage width.

use super::{column_count, ExportOptions, NodeRenderer};
use crate::error::NotecastError;
use docx_rs::{
    BreakType, Docx, PageMargin, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow,
    WidthType,
};
use std::io::Cursor;

/// Full table width in fiftieths of a percent.
const TABLE_WIDTH_PCT: usize = 5000;

/// Page margin in twips (about 2 cm).
const PAGE_MARGIN_TWIPS: u32 = 1134;

enum BodyItem {
    Paragraph(Paragraph),
    Table(Table),
}

/// Drop characters XML 1.0 cannot carry. Tab and line breaks stay.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// One run holding `text`, with a hard break at every newline.
fn text_run(text: &str) -> Run {
    xml_safe(text)
        .split('\n')
        .enumerate()
        .fold(Run::new(), |run, (i, line)| {
            let run = if i > 0 { run.add_break(BreakType::TextWrapping) } else { run };
            run.add_text(line.trim_end_matches('\r'))
        })
}

fn heading_style(level: usize, body: usize) -> Style {
    let size = match level {
        1 => body + 18,
        2 => body + 10,
        3 => body + 4,
        _ => body + 2,
    };
    Style::new(&format!("Heading{level}"), StyleType::Paragraph)
        .name(&format!("heading {level}"))
        .size(size)
        .bold()
}

/// [`NodeRenderer`] producing a DOCX package.
pub struct DocxRenderer {
    options: ExportOptions,
    body: Vec<BodyItem>,
}

impl DocxRenderer {
    pub fn new(options: ExportOptions) -> Self {
        Self {
            options,
            body: Vec::new(),
        }
    }

    fn push_paragraph(&mut self, style: Option<&str>, text: &str) {
        let paragraph = Paragraph::new().add_run(text_run(text));
        let paragraph = match style {
            Some(style) => paragraph.style(style),
            None => paragraph,
        };
        self.body.push(BodyItem::Paragraph(paragraph));
    }

    fn into_docx(self) -> Docx {
        let (page_w, page_h) = self.options.page_size.twips();
        // Sizes are in half-points.
        let body_size = (self.options.font_size * 2.0).round() as usize;
        let margin = PAGE_MARGIN_TWIPS as i32;

        let mut docx = Docx::new()
            .page_size(page_w, page_h)
            .page_margin(
                PageMargin::new()
                    .top(margin)
                    .right(margin)
                    .bottom(margin)
                    .left(margin),
            )
            .default_size(body_size);
        for level in 1..=6 {
            docx = docx.add_style(heading_style(level, body_size));
        }
        docx = docx.add_style(
            Style::new("ListParagraph", StyleType::Paragraph).name("List Paragraph"),
        );

        for item in self.body {
            docx = match item {
                BodyItem::Paragraph(p) => docx.add_paragraph(p),
                // A table must not be the last thing before the section properties.
                BodyItem::Table(t) => docx.add_table(t).add_paragraph(Paragraph::new()),
            };
        }
        docx
    }
}

impl NodeRenderer for DocxRenderer {
    fn heading(&mut self, level: u8, text: &str) {
        let style = format!("Heading{}", level.clamp(1, 6));
        self.push_paragraph(Some(&style), text);
    }

    fn paragraph(&mut self, text: &str) {
        self.push_paragraph(None, text);
    }

    fn list(&mut self, items: &[String], ordered: bool) {
        for (n, item) in items.iter().enumerate() {
            let text = if ordered {
                format!("{}. {}", n + 1, item)
            } else {
                format!("• {}", item)
            };
            self.push_paragraph(Some("ListParagraph"), &text);
        }
    }

    fn table(&mut self, rows: &[Vec<String>]) {
        let cols = column_count(rows);
        if cols == 0 {
            return;
        }
        let (page_w, _) = self.options.page_size.twips();
        let content_twips = page_w.saturating_sub(2 * PAGE_MARGIN_TWIPS) as usize;
        let cell_pct = TABLE_WIDTH_PCT / cols;
        let header = rows.len() > 1;

        let table_rows = rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let cells = (0..cols)
                    .map(|c| {
                        let run = text_run(row.get(c).map(String::as_str).unwrap_or(""));
                        let run = if header && r == 0 { run.bold() } else { run };
                        TableCell::new()
                            .add_paragraph(Paragraph::new().add_run(run))
                            .width(cell_pct, WidthType::Pct)
                    })
                    .collect();
                TableRow::new(cells)
            })
            .collect();

        let table = Table::new(table_rows)
            .set_grid(vec![content_twips / cols; cols])
            .width(TABLE_WIDTH_PCT, WidthType::Pct);
        self.body.push(BodyItem::Table(table));
    }

    fn finish(self) -> Result<Vec<u8>, NotecastError> {
        let mut out = Cursor::new(Vec::new());
        self.into_docx()
            .build()
            .pack(&mut out)
            .map_err(|e| NotecastError::ExportFailed {
                target: "DOCX".to_string(),
                detail: e.to_string(),
            })?;
        Ok(out.into_inner())
    }
}
