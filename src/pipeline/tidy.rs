//! Deterministic cleanup of generated text.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted models wrap answers in ` ```markdown ` fences, emit
//! `\r\n` line endings, pad with runs of blank lines, scatter zero-width
//! characters, or repeat a table's separator row in its body. None of that
//! changes meaning, but all of it confuses the tree parser and the exporters.
//!
//! Two entry points:
//!
//! - [`tidy_markdown`] for notes: structural cleanup, content untouched.
//! - [`speech_text`] for manuscripts: additionally strips markdown markers
//!   (headings, bullets, emphasis, table pipes) that a speech engine would
//!   otherwise read aloud.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean one generated notes fragment.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to a single blank line
/// 5. Ensure a blank line before each heading
/// 6. Remove spurious mid-table separator rows
/// 7. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
///
/// The result has no leading or trailing blank lines, so fragments can be
/// joined with `"\n\n"`.
pub fn tidy_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_mid_table_separators(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

/// Turn a generated manuscript into plain prose for speech synthesis.
pub fn speech_text(input: &str) -> String {
    let s = tidy_markdown(input);
    let lines: Vec<String> = s
        .lines()
        .filter(|line| !is_separator_row(line) && !RE_RULE.is_match(line))
        .map(strip_line_markers)
        .collect();
    let s = lines.join("\n");
    let s = RE_EMPHASIS.replace_all(&s, |caps: &regex::Captures<'_>| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    collapse_blank_lines(&s).trim().to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|text)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────

pub(crate) fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Normalise heading spacing ────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    let mut in_fence = false;
    for (i, line) in input.lines().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && RE_HEADING.is_match(line) && i > 0 {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 6: Remove spurious mid-table separator rows ─────────────────────

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

fn remove_mid_table_separators(input: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut table_line_count = 0usize;

    for line in input.lines() {
        if is_table_row(line) {
            table_line_count += 1;
            if is_separator_row(line) && table_line_count != 2 {
                continue;
            }
        } else {
            table_line_count = 0;
        }
        result.push(line);
    }

    result.join("\n")
}

// ── Rule 7: Remove invisible Unicode characters ──────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Speech: markdown markers ─────────────────────────────────────────────

static RE_LINE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]\s+|\d+[.)]\s+|>\s?)").unwrap());

static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:[-*_]\s*){3,}$|^\s*```").unwrap());

static RE_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*|__([^_]+)__|\*([^*\s][^*]*)\*|`([^`]+)`").unwrap());

fn strip_line_markers(line: &str) -> String {
    if RE_HEADING.is_match(line) {
        return line
            .trim_start_matches('#')
            .trim_end_matches(|c: char| c == '#' || c.is_whitespace())
            .trim_start()
            .to_string();
    }
    let line = RE_LINE_MARKER.replace(line, "");
    if is_table_row(&line) {
        line.trim_matches('|')
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        line.to_string()
    }
}
