//! `PlantUML` source preparation.
//!
//! Before a block is handed to the renderer its source is:
//! - wrapped in `@startuml`/`@enduml` when the markers are missing
//! - expanded by resolving local `!include` directives
//! - given a `skinparam dpi` line when a DPI is configured

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::consts::MAX_INCLUDE_DEPTH;

static INCLUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)!include[ \t]+(.+?)[ \t\r]*$").unwrap());

static START_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*@start\w+").unwrap());

static END_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)(?:^|\s)@end\w+").unwrap());

/// Ensure the source carries begin/end markers.
///
/// Sources that already have an `@start<kind>` line and an `@end<kind>`
/// token (any case, any diagram kind) are returned unchanged, so applying
/// this twice gives the same result as applying it once. Addresses such as
/// `bob@endava.com` are not markers.
#[must_use]
pub fn ensure_wrapped(source: &str) -> String {
    if START_MARKER.is_match(source) && END_MARKER.is_match(source) {
        return source.to_owned();
    }
    let body = source.trim_end_matches(['\n', '\r']);
    format!("@startuml\n{body}\n@enduml")
}

/// Result of preparing diagram source with potential warnings.
#[derive(Debug)]
pub struct PrepareResult {
    /// Prepared diagram source.
    pub source: String,
    /// Warnings generated during preparation (e.g., unresolved includes).
    pub warnings: Vec<String>,
}

/// Prepare wrapped `PlantUML` source for rendering.
///
/// Resolves `!include` directives against `include_dirs` (first match wins)
/// and, when `dpi` is set, injects `skinparam dpi` right after the `@start`
/// line.
#[must_use]
pub fn prepare_diagram_source(
    source: &str,
    include_dirs: &[PathBuf],
    dpi: Option<u32>,
) -> PrepareResult {
    let mut warnings = Vec::new();
    let resolved = resolve_includes(source, include_dirs, 0, &mut warnings);
    let source = match dpi {
        Some(dpi) => inject_after_start(&resolved, &format!("skinparam dpi {dpi}\n")),
        None => resolved,
    };
    PrepareResult { source, warnings }
}

/// Replace each resolvable `!include` line with the file's (recursively
/// resolved) content, indented like the directive.
fn resolve_includes(
    source: &str,
    include_dirs: &[PathBuf],
    depth: usize,
    warnings: &mut Vec<String>,
) -> String {
    if depth > MAX_INCLUDE_DEPTH {
        warnings.push(format!(
            "Include depth exceeded maximum of {MAX_INCLUDE_DEPTH}"
        ));
        return source.to_owned();
    }

    INCLUDE_PATTERN
        .replace_all(source, |caps: &Captures| {
            let indent = &caps[1];
            let target = &caps[2];

            // Standard library (`<C4/C4_Container>`) and remote includes are
            // resolved by PlantUML itself.
            if (target.starts_with('<') && target.ends_with('>')) || target.contains("://") {
                return caps[0].to_owned();
            }

            let found = include_dirs
                .iter()
                .find_map(|dir| std::fs::read_to_string(dir.join(target)).ok());
            if let Some(content) = found {
                let nested = resolve_includes(&content, include_dirs, depth + 1, warnings);
                return indent_content(nested.trim_end_matches(['\n', '\r']), indent);
            }

            if include_dirs.is_empty() {
                warnings.push(format!(
                    "Include file not found: '{target}' (no include directories configured)"
                ));
            } else {
                let searched: Vec<_> = include_dirs
                    .iter()
                    .map(|d| d.join(target).display().to_string())
                    .collect();
                warnings.push(format!(
                    "Include file not found: '{target}' (searched: {})",
                    searched.join(", ")
                ));
            }
            caps[0].to_owned()
        })
        .into_owned()
}

/// Indent every non-empty line with `indent`.
fn indent_content(content: &str, indent: &str) -> String {
    if indent.is_empty() {
        return content.to_owned();
    }
    content
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Insert `config` on the line after the first `@start` marker.
fn inject_after_start(source: &str, config: &str) -> String {
    let lower = source.to_ascii_lowercase();
    let Some(newline) = lower
        .find("@start")
        .and_then(|pos| source[pos..].find('\n').map(|n| pos + n + 1))
    else {
        return format!("{config}{source}");
    };

    let mut result = String::with_capacity(source.len() + config.len());
    result.push_str(&source[..newline]);
    result.push_str(config);
    result.push_str(&source[newline..]);
    result
}
