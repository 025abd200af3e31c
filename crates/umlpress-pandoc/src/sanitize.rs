//! Markdown cleanup before handing a document to a LaTeX engine.
//!
//! Two constructs trip up the PDF build:
//! - a bare `$` starts TeX math mode, so prose like `costs $5 and $10`
//!   becomes garbage; every unescaped `$` is escaped
//! - a `---` line is meant as a page separator, so it becomes `\newpage`
//!
//! Both rewrites skip YAML front matter, fenced and indented code blocks and
//! inline code spans.

use std::sync::LazyLock;

use regex::Regex;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})").unwrap());

static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})[ \t]*$").unwrap());

/// Four columns of indentation: an indented code line.
static INDENTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^( {4}| {0,3}\t)").unwrap());

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*([-*+]|\d{1,9}[.)])([ \t]|$)").unwrap());

static PAGE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[ \t]*---[ \t]*$").unwrap());

const BOM: char = '\u{feff}';

/// Replacement for a page separator line.
const NEWPAGE: &str = "\n\\newpage\n";

/// Split `text` into YAML front matter and body.
///
/// A leading byte-order mark is dropped. Front matter must start on the
/// first line with `---` and ends with the next line that is exactly `---`
/// or `...` (trailing whitespace allowed); the returned header includes both
/// delimiter lines. Without a closing delimiter there is no header.
#[must_use]
pub fn split_front_matter(text: &str) -> (&str, &str) {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return ("", text);
    };
    if first.trim_end() != "---" {
        return ("", text);
    }

    let mut offset = first.len();
    for line in lines {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return text.split_at(offset);
        }
    }
    ("", text)
}

/// Prepare Markdown for a LaTeX-backed Pandoc build.
///
/// The front matter is copied untouched. In the body, outside code (fenced,
/// indented after a blank line outside a list, or inline), every
/// `$` not preceded by a backslash becomes `\$` and every line consisting of
/// `---` becomes a `\newpage` directive surrounded by blank lines.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let (header, body) = split_front_matter(text);

    let mut out = String::with_capacity(text.len() + text.len() / 16);
    out.push_str(header);

    let mut fence: Option<(u8, usize)> = None;
    let mut indented_code = false;
    let mut in_list = false;
    let mut prev_blank = true;
    for raw_line in body.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(['\n', '\r']);
        let ending = &raw_line[line.len()..];
        let blank = line.trim().is_empty();

        if let Some((marker, length)) = fence {
            if closes_fence(line, marker, length) {
                fence = None;
            }
            out.push_str(raw_line);
            prev_blank = blank;
            continue;
        }

        let indented = INDENTED.is_match(line);
        if indented_code && (blank || indented) {
            out.push_str(raw_line);
            prev_blank = blank;
            continue;
        }
        indented_code = false;

        if indented && !blank && prev_blank && !in_list {
            indented_code = true;
            out.push_str(raw_line);
            prev_blank = false;
            continue;
        }
        if !blank {
            if LIST_ITEM.is_match(line) {
                in_list = true;
            } else if !indented {
                in_list = false;
            }
        }
        prev_blank = blank;

        if let Some(caps) = FENCE_OPEN.captures(line) {
            let run = &caps[1];
            fence = Some((run.as_bytes()[0], run.len()));
            out.push_str(raw_line);
            continue;
        }

        if PAGE_BREAK.is_match(line) {
            out.push_str(NEWPAGE);
            out.push_str(ending);
            continue;
        }

        escape_dollars(line, &mut out);
        out.push_str(ending);
    }
    out
}

fn closes_fence(line: &str, marker: u8, length: usize) -> bool {
    FENCE_CLOSE.captures(line).is_some_and(|caps| {
        let run = &caps[1];
        run.as_bytes()[0] == marker && run.len() >= length
    })
}

/// Append `line` to `out` with unescaped dollars escaped, leaving inline
/// code spans alone.
fn escape_dollars(line: &str, out: &mut String) {
    let bytes = line.as_bytes();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                let run = backtick_run(bytes, i);
                i = closing_run_end(bytes, i + run, run).unwrap_or(i + run);
            }
            b'$' if i == 0 || bytes[i - 1] != b'\\' => {
                out.push_str(&line[copied..i]);
                out.push_str("\\$");
                i += 1;
                copied = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&line[copied..]);
}

fn backtick_run(bytes: &[u8], start: usize) -> usize {
    bytes[start..].iter().take_while(|&&b| b == b'`').count()
}

/// End of the first backtick run of exactly `length` at or after `from`.
fn closing_run_end(bytes: &[u8], from: usize, length: usize) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        if bytes[j] == b'`' {
            let run = backtick_run(bytes, j);
            if run == length {
                return Some(j + run);
            }
            j += run;
        } else {
            j += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_front_matter() {
        let text = "---\ntitle: Doc\n---\nBody\n";
        assert_eq!(split_front_matter(text), ("---\ntitle: Doc\n---\n", "Body\n"));
    }

    #[test]
    fn test_split_front_matter_dot_terminator() {
        let text = "---\ntitle: Doc\n...\nBody";
        assert_eq!(split_front_matter(text), ("---\ntitle: Doc\n...\n", "Body"));
    }

    #[test]
    fn test_split_front_matter_drops_bom() {
        let text = "\u{feff}---\na: 1\n---\nBody";
        assert_eq!(split_front_matter(text), ("---\na: 1\n---\n", "Body"));
        assert_eq!(split_front_matter("\u{feff}Body"), ("", "Body"));
    }

    #[test]
    fn test_split_front_matter_requires_first_line() {
        let text = "\n---\na: 1\n---\n";
        assert_eq!(split_front_matter(text), ("", text));
    }

    #[test]
    fn test_split_front_matter_unterminated() {
        let text = "---\ntitle: Doc\nBody\n";
        assert_eq!(split_front_matter(text), ("", text));
    }

    #[test]
    fn test_split_front_matter_crlf() {
        let text = "---\r\ntitle: Doc\r\n---\r\nBody";
        assert_eq!(
            split_front_matter(text),
            ("---\r\ntitle: Doc\r\n---\r\n", "Body")
        );
    }

    #[test]
    fn test_only_body_separator_becomes_page_break() {
        let text = "---\ntitle: Doc\n---\nFirst\n---\nSecond\n";
        assert_eq!(
            sanitize(text),
            "---\ntitle: Doc\n---\nFirst\n\n\\newpage\n\nSecond\n"
        );
    }

    #[test]
    fn test_page_break_with_surrounding_spaces() {
        assert_eq!(sanitize("a\n  ---\t\nb"), "a\n\n\\newpage\n\nb");
        assert_eq!(sanitize("a\n----\nb"), "a\n----\nb");
        assert_eq!(sanitize("a\n--- x\nb"), "a\n--- x\nb");
    }

    #[test]
    fn test_dollars_escaped() {
        assert_eq!(sanitize("costs $5 and $10"), "costs \\$5 and \\$10");
        assert_eq!(sanitize("$$"), "\\$\\$");
    }

    #[test]
    fn test_escaped_dollars_untouched() {
        assert_eq!(sanitize("already \\$5"), "already \\$5");
    }

    #[test]
    fn test_inline_code_untouched() {
        assert_eq!(
            sanitize("run `echo $HOME` for $5"),
            "run `echo $HOME` for \\$5"
        );
        assert_eq!(
            sanitize("``a ` $x`` then $y"),
            "``a ` $x`` then \\$y"
        );
    }

    #[test]
    fn test_unmatched_backtick_does_not_hide_dollars() {
        assert_eq!(sanitize("a ` b $c"), "a ` b \\$c");
    }

    #[test]
    fn test_fenced_code_untouched() {
        let text = "Price $1\n\n```sh\necho $PATH\n---\n```\n\n~~~\n$x\n~~~\nend $2\n";
        assert_eq!(
            sanitize(text),
            "Price \\$1\n\n```sh\necho $PATH\n---\n```\n\n~~~\n$x\n~~~\nend \\$2\n"
        );
    }

    #[test]
    fn test_indented_code_untouched() {
        let text = "Shell example:\n\n    echo $HOME\n\n    ---\n\tprintf $x\nback to $5\n";
        assert_eq!(
            sanitize(text),
            "Shell example:\n\n    echo $HOME\n\n    ---\n\tprintf $x\nback to \\$5\n"
        );
    }

    #[test]
    fn test_indented_text_without_blank_line_is_prose() {
        assert_eq!(sanitize("costs\n    $5\n"), "costs\n    \\$5\n");
    }

    #[test]
    fn test_list_continuation_is_prose() {
        let text = "- item\n\n    still the item, $5\n";
        assert_eq!(sanitize(text), "- item\n\n    still the item, \\$5\n");
    }

    #[test]
    fn test_front_matter_untouched() {
        let text = "---\nprice: $5\n---\n$5";
        assert_eq!(sanitize(text), "---\nprice: $5\n---\n\\$5");
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        assert_eq!(sanitize("---\ntitle"), "\n\\newpage\n\ntitle");
    }

    #[test]
    fn test_crlf_preserved() {
        assert_eq!(sanitize("a $1\r\n---\r\nb"), "a \\$1\r\n\n\\newpage\n\r\nb");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let text = "# Title\n\nNothing to see here.\n";
        assert_eq!(sanitize(text), text);
        assert_eq!(sanitize(""), "");
    }
}
