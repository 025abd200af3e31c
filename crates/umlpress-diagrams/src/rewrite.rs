//! Markdown rewriting.
//!
//! Replaces each diagram block's span with an image reference (or a visible
//! failure note) in a single left-to-right pass over the original text.

use std::path::Path;

use crate::block::DiagramBlock;
use crate::render::{RenderOutcome, RenderReport};

/// Replacement of `text[start..end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Apply replacements to `text` in one pass.
///
/// Spans refer to the original text and must not overlap. They may be given
/// in any order. Spans that overlap an earlier one or fall outside the text
/// are skipped.
#[must_use]
pub fn rewrite_document(text: &str, replacements: &[Replacement]) -> String {
    let mut ordered: Vec<&Replacement> = replacements.iter().collect();
    ordered.sort_by_key(|r| r.start);

    let extra: usize = ordered.iter().map(|r| r.text.len()).sum();
    let mut result = String::with_capacity(text.len() + extra);
    let mut cursor = 0;

    for replacement in ordered {
        let valid = replacement.start >= cursor
            && replacement.start <= replacement.end
            && text.get(replacement.start..replacement.end).is_some();
        if !valid {
            tracing::warn!(
                start = replacement.start,
                end = replacement.end,
                "Skipping invalid replacement span"
            );
            continue;
        }
        result.push_str(&text[cursor..replacement.start]);
        result.push_str(&replacement.text);
        cursor = replacement.end;
    }

    result.push_str(&text[cursor..]);
    result
}

/// Markdown image reference for a rendered diagram.
///
/// Backslashes in `link` become forward slashes.
#[must_use]
pub fn image_reference(index: usize, link: &str, width: &str) -> String {
    let link = link.replace('\\', "/");
    let destination = if link.contains(char::is_whitespace) {
        format!("<{link}>")
    } else {
        link
    };
    format!("![Diagram {index}]({destination}){{ width={width} }}")
}

/// Bold note shown in place of a diagram that failed to render.
#[must_use]
pub fn failure_note(index: usize, message: &str) -> String {
    let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("**Diagram {index} failed to generate: {message}**")
}

/// Build replacements for every block covered by `report`.
///
/// `link` maps an image path to the text used in the reference (typically
/// a path relative to the rewritten document). Blocks without an outcome
/// are left untouched.
pub fn replacements_for(
    blocks: &[DiagramBlock],
    report: &RenderReport,
    link: impl Fn(&Path) -> String,
    width: &str,
) -> Vec<Replacement> {
    blocks
        .iter()
        .filter_map(|block| {
            let text = match report.outcome(block.index)? {
                RenderOutcome::Cached(path) | RenderOutcome::Rendered(path) => {
                    image_reference(block.index, &link(path), width)
                }
                RenderOutcome::Failed(err) => failure_note(block.index, &err.kind.to_string()),
            };
            Some(Replacement {
                start: block.start,
                end: block.end,
                text,
            })
        })
        .collect()
}
