//! Markup canonicalization.
//!
//! Generated markup is parsed into a tree and printed back with a fixed print
//! width and indent, so stored artifacts look the same whatever style the
//! model happened to use. Input that does not parse is rejected outright;
//! there is no best-effort output.

mod parse;
mod print;

pub use parse::{Attribute, Node};

/// Maximum line width the printer aims for.
pub const PRINT_WIDTH: usize = 120;

/// Spaces per nesting level.
pub const INDENT_WIDTH: usize = 2;

/// Reasons markup cannot be canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("markup is empty")]
    Empty,

    #[error("unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),

    #[error("unterminated comment starting at byte {0}")]
    UnterminatedComment(usize),

    #[error("unterminated attribute value starting at byte {0}")]
    UnterminatedAttribute(usize),

    #[error("closing tag </{name}> at byte {offset} does not match any open element")]
    UnexpectedClose { name: String, offset: usize },

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

/// Formats raw generated markup into its canonical form.
///
/// The result ends with exactly one newline.
pub fn canonicalize(raw: &str) -> Result<String, FormatError> {
    let markup = strip_code_fence(raw.trim());
    let nodes = parse::parse(markup)?;
    Ok(print::print_document(&nodes))
}

/// Removes a wrapping markdown code fence such as ```` ```html ... ``` ````.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => return "",
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_document_stays_on_one_line() {
        let html = canonicalize("<div class=\"p-4\">\n   <p>Hello</p>\n</div>").unwrap();
        assert_eq!(html, "<div class=\"p-4\"><p>Hello</p></div>\n");
    }

    #[test]
    fn test_long_element_breaks_children_onto_lines() {
        let items: String = (0..12)
            .map(|i| format!("<li class=\"px-4 py-2\">Item number {}</li>", i))
            .collect();
        let raw = format!("<ul class=\"divide-y\">{}</ul>", items);
        let html = canonicalize(&raw).unwrap();

        let lines: Vec<&str> = html.lines().collect();
        assert_eq!(lines.first(), Some(&"<ul class=\"divide-y\">"));
        assert_eq!(lines[1], "  <li class=\"px-4 py-2\">Item number 0</li>");
        assert_eq!(lines.last(), Some(&"</ul>"));
        assert_eq!(lines.len(), 14);
        assert!(lines.iter().all(|l| l.chars().count() <= PRINT_WIDTH));
        assert!(!html.contains('\t'));
    }

    #[test]
    fn test_strips_markdown_fence() {
        let html = canonicalize("```html\n<main>Hi</main>\n```").unwrap();
        assert_eq!(html, "<main>Hi</main>\n");

        let html = canonicalize("```\n<main>Hi</main>\n```\n").unwrap();
        assert_eq!(html, "<main>Hi</main>\n");
    }

    #[test]
    fn test_is_idempotent() {
        let raw = r#"<!DOCTYPE html><html><head><title>Dashboard</title></head><body class="bg-gray-50 min-h-screen">
<!-- Header: lucide menu -->
<header class="flex items-center justify-between px-6 py-4 bg-white shadow-sm border-b border-gray-200 sticky top-0 z-10">
<h1 class="text-xl font-semibold text-gray-900">Overview</h1><button class="rounded-md bg-indigo-600 px-3 py-2 text-sm font-medium text-white hover:bg-indigo-500" disabled>New report</button>
</header><main class="grid grid-cols-1 gap-6 p-6 md:grid-cols-3"><img src="placeholder.png" alt="chart"><br>
<p class="text-sm text-gray-500">Revenue grew by <strong>12%</strong> compared with the previous quarter, driven mostly by enterprise renewals and new self-serve signups.</p>
</main></body></html>"#;

        let once = canonicalize(raw).unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
        assert!(once.lines().all(|l| l.chars().count() <= PRINT_WIDTH));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert_eq!(canonicalize("   \n "), Err(FormatError::Empty));
        assert_eq!(canonicalize("```html\n```"), Err(FormatError::Empty));
    }

    #[test]
    fn test_rejects_unclosed_element() {
        assert_eq!(
            canonicalize("<div><p>Hello</p>"),
            Err(FormatError::Unclosed("div".to_string()))
        );
    }

    #[test]
    fn test_rejects_mismatched_close() {
        assert!(matches!(
            canonicalize("<div><span>Hello</div></span>"),
            Err(FormatError::UnexpectedClose { .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_generation() {
        assert!(matches!(
            canonicalize("<div class=\"p-4\"><p>Hel</p><butt"),
            Err(FormatError::UnterminatedTag(_))
        ));
        assert!(matches!(
            canonicalize("<div class=\"p-4><p>Hello</p></div>"),
            Err(FormatError::UnterminatedAttribute(_))
        ));
    }
}
