//! Markdown → content tree.
//!
//! Generated notes are parsed into a flat sequence of block nodes that both
//! exporters walk. Only the constructs the note prompts ask for get their own
//! node type; everything else survives as a paragraph with its markup intact,
//! so nothing the model wrote is ever dropped silently (thematic breaks
//! excepted).
//!
//! | Source                                   | Node                          |
//! |------------------------------------------|-------------------------------|
//! | `#` … `######` + space                   | `Heading { level, text }`     |
//! | consecutive `-`/`*`/`+`/`•`/`1.`/`1)`    | `List { items, ordered }`     |
//! | pipe row followed by a `---` separator   | `Table { rows }`              |
//! | fenced code block                        | `Paragraph` (raw, newlines kept) |
//! | any other non-blank lines                | `Paragraph` (lines joined)    |
//!
//! Inline `**strong**` and `__strong__` markers are removed from recognised
//! text; exporters render every run in the same weight.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One block-level node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    List { items: Vec<String>, ordered: bool },
    /// The header row, when present, is `rows[0]`. Rows may differ in length.
    Table { rows: Vec<Vec<String>> },
}

/// Ordered block nodes in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTree {
    pub blocks: Vec<Block>,
}

impl ContentTree {
    pub fn parse(markdown: &str) -> Self {
        parse(markdown)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?(?:[ \t]+#+)?[ \t]*$").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:([-*+•])|(\d{1,9})[.)])[ \t]+(.*)$").unwrap());

static RE_THEMATIC_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$").unwrap()
});

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ {0,3}(```|~~~)").unwrap());

static RE_SEPARATOR_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:?-+:?$").unwrap());

static RE_STRONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());

/// Parse markdown into a [`ContentTree`]. Never fails.
pub fn parse(markdown: &str) -> ContentTree {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut builder = TreeBuilder::default();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        // ── Fenced code: raw paragraph up to the closing fence ───────────
        if let Some(caps) = RE_FENCE.captures(line) {
            builder.flush();
            let fence = caps[1].to_string();
            let mut raw = vec![line];
            i += 1;
            while i < lines.len() {
                raw.push(lines[i]);
                i += 1;
                if lines[i - 1].trim_start().starts_with(&fence) {
                    break;
                }
            }
            builder.blocks.push(Block::Paragraph {
                text: raw.join("\n"),
            });
            continue;
        }

        if line.trim().is_empty() {
            builder.flush();
            i += 1;
            continue;
        }

        if let Some(caps) = RE_HEADING.captures(line) {
            builder.flush();
            builder.blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                text: inline(caps.get(2).map_or("", |m| m.as_str())),
            });
            i += 1;
            continue;
        }

        if RE_THEMATIC_BREAK.is_match(line) {
            builder.flush();
            i += 1;
            continue;
        }

        // ── Table: a pipe row whose next line is a separator row ─────────
        if line.contains('|') && lines.get(i + 1).is_some_and(|next| is_separator_row(next)) {
            builder.flush();
            let mut rows = Vec::new();
            while i < lines.len() && !lines[i].trim().is_empty() && lines[i].contains('|') {
                if !is_separator_row(lines[i]) {
                    rows.push(split_row(lines[i]).into_iter().map(|c| inline(&c)).collect());
                }
                i += 1;
            }
            builder.blocks.push(Block::Table { rows });
            continue;
        }

        if let Some(caps) = RE_LIST_ITEM.captures(line) {
            builder.flush_paragraph();
            let ordered = caps.get(2).is_some();
            builder.push_item(inline(caps[3].trim()), ordered);
            i += 1;
            continue;
        }

        // Indented line right after a list item continues that item.
        if builder.list.is_some() && line.starts_with([' ', '\t']) {
            builder.continue_item(&inline(line.trim()));
            i += 1;
            continue;
        }

        builder.flush_list();
        builder.paragraph.push(line.trim());
        i += 1;
    }

    builder.flush();
    ContentTree {
        blocks: builder.blocks,
    }
}

#[derive(Default)]
struct TreeBuilder<'a> {
    blocks: Vec<Block>,
    paragraph: Vec<&'a str>,
    list: Option<(Vec<String>, bool)>,
}

impl TreeBuilder<'_> {
    fn push_item(&mut self, item: String, ordered: bool) {
        match self.list.as_mut() {
            Some((items, o)) if *o == ordered => items.push(item),
            _ => {
                self.flush_list();
                self.list = Some((vec![item], ordered));
            }
        }
    }

    fn continue_item(&mut self, text: &str) {
        if let Some(last) = self.list.as_mut().and_then(|(items, _)| items.last_mut()) {
            if !last.is_empty() {
                last.push(' ');
            }
            last.push_str(text);
        }
    }

    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let text = inline(&self.paragraph.join(" "));
            self.paragraph.clear();
            self.blocks.push(Block::Paragraph { text });
        }
    }

    fn flush_list(&mut self) {
        if let Some((items, ordered)) = self.list.take() {
            self.blocks.push(Block::List { items, ordered });
        }
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.flush_list();
    }
}

/// Split a table row on unescaped pipes; `\|` becomes a literal pipe.
fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn is_separator_row(line: &str) -> bool {
    if !line.contains('-') || !line.contains('|') {
        return false;
    }
    let cells = split_row(line);
    !cells.is_empty() && cells.iter().all(|c| RE_SEPARATOR_CELL.is_match(c))
}

/// Remove strong-emphasis markers.
fn inline(text: &str) -> String {
    RE_STRONG
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map_or(String::new(), |m| m.as_str().to_string())
        })
        .into_owned()
}
