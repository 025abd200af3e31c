//! Diagram block extraction from raw Markdown text.
//!
//! The scanner walks the document line by line and tracks code fences so
//! that diagram markers are only recognized where `PlantUML` source actually
//! lives:
//! - fences whose info string starts with `plantuml` or `puml`
//! - an `@start<kind>` line outside any other fence, through the first
//!   later line containing `@end<kind>`; a start marker without an end is
//!   plain text
//!
//! Offsets are recorded against the original text and never shift, so the
//! rewriter can apply all replacements in one pass.

use std::sync::LazyLock;

use regex::Regex;

use crate::block::{BlockKind, DiagramBlock};
use crate::consts::FENCE_LANGUAGES;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( {0,3})(`{3,}|~{3,})[ \t]*([^\s`]*)").unwrap());

static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})[ \t]*$").unwrap());

static MARKER_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[ \t]*(@start([a-z0-9_]+))").unwrap());

/// Extract all diagram blocks from `text` in document order.
///
/// Indices are one-based and consecutive. Unterminated blocks are ignored
/// and do not hide the diagrams that follow them. A document without
/// diagrams yields an empty list.
#[must_use]
pub fn extract_blocks(text: &str) -> Vec<DiagramBlock> {
    let mut offset = 0;
    let lines: Vec<Line<'_>> = text
        .split_inclusive('\n')
        .enumerate()
        .map(|(i, raw)| {
            let line = Line {
                offset,
                number: i + 1,
                raw,
                text: raw.trim_end_matches(['\n', '\r']),
            };
            offset += raw.len();
            line
        })
        .collect();

    let mut scanner = Scanner {
        text,
        lines: &lines,
        blocks: Vec::new(),
    };
    scanner.run();
    scanner.blocks
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    offset: usize,
    number: usize,
    raw: &'a str,
    text: &'a str,
}

struct Scanner<'t, 'l> {
    text: &'t str,
    lines: &'l [Line<'t>],
    blocks: Vec<DiagramBlock>,
}

impl Scanner<'_, '_> {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.lines.len() {
            let line = self.lines[i];

            if let Some(caps) = FENCE_OPEN.captures(line.text) {
                let indent = caps[1].len();
                let fence = &caps[2];
                let diagram = is_diagram_fence(&caps[3]);
                let close = self.find_fence_close(i + 1, fence.as_bytes()[0], fence.len());
                let Some(close) = close else {
                    // An unclosed fence runs to the end of the document.
                    return;
                };
                if diagram {
                    let body_start = line.offset + line.raw.len();
                    let body_end = self.lines[close].offset;
                    let body = strip_line_ending(&self.text[body_start..body_end]).to_owned();
                    let end = self.lines[close].offset + self.lines[close].text.len();
                    self.push(BlockKind::Fenced, &line, line.offset + indent, end, body);
                }
                i = close + 1;
                continue;
            }

            if let Some(caps) = MARKER_START.captures(line.text) {
                let start = line.offset + caps.get(1).map_or(0, |m| m.start());
                let end_marker = format!("@end{}", caps[2].to_ascii_lowercase());
                if let Some((close, end)) = self.find_end_marker(i + 1, &end_marker) {
                    let source = self.text[start..end].to_owned();
                    self.push(BlockKind::Inline, &line, start, end, source);
                    i = close + 1;
                    continue;
                }
            }

            i += 1;
        }
    }

    fn find_fence_close(&self, from: usize, marker: u8, length: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&j| closes_fence(self.lines[j].text, marker, length))
    }

    /// Line index and absolute offset just past the first `end_marker` at
    /// or after line `from`.
    fn find_end_marker(&self, from: usize, end_marker: &str) -> Option<(usize, usize)> {
        self.lines[from.min(self.lines.len())..]
            .iter()
            .enumerate()
            .find_map(|(k, line)| {
                end_marker_offset(line.text, end_marker).map(|end| (from + k, line.offset + end))
            })
    }

    fn push(&mut self, kind: BlockKind, line: &Line<'_>, start: usize, end: usize, source: String) {
        self.blocks.push(DiagramBlock {
            index: self.blocks.len() + 1,
            kind,
            line: line.number,
            start,
            end,
            source,
        });
    }
}

fn is_diagram_fence(info: &str) -> bool {
    FENCE_LANGUAGES
        .iter()
        .any(|lang| lang.eq_ignore_ascii_case(info))
}

fn closes_fence(line: &str, marker: u8, length: usize) -> bool {
    FENCE_CLOSE.captures(line).is_some_and(|caps| {
        let fence = &caps[1];
        fence.as_bytes()[0] == marker && fence.len() >= length
    })
}

/// Byte offset just past the first `end_marker` in the line, in any case.
fn end_marker_offset(line: &str, end_marker: &str) -> Option<usize> {
    line.to_ascii_lowercase()
        .find(end_marker)
        .map(|pos| pos + end_marker.len())
}

fn strip_line_ending(body: &str) -> &str {
    body.strip_suffix('\n')
        .map_or(body, |b| b.strip_suffix('\r').unwrap_or(b))
}
