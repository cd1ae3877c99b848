//! Width-aware printer for parsed markup.

use super::parse::{Attribute, Node};
use super::{INDENT_WIDTH, PRINT_WIDTH};

/// Inline-level elements that may share a line with surrounding text.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "em", "i", "kbd", "mark", "q", "s", "small", "span",
    "strong", "sub", "sup", "time", "u",
];

fn is_inline(node: &Node) -> bool {
    match node {
        Node::Text(_) => true,
        Node::Element { name, .. } => INLINE_ELEMENTS.iter().any(|n| n.eq_ignore_ascii_case(name)),
        _ => false,
    }
}

/// True when an element holds block-level or raw content somewhere below it.
fn has_block_descendant(node: &Node) -> bool {
    match node {
        Node::Element { children, .. } => children.iter().any(|child| match child {
            Node::Element { .. } => !is_inline(child) || has_block_descendant(child),
            Node::Raw { .. } => true,
            _ => false,
        }),
        _ => false,
    }
}

/// Prints top-level nodes. Every line, including the last, ends with `\n`.
pub(super) fn print_document(nodes: &[Node]) -> String {
    let mut out = String::new();
    print_children(nodes, 0, &mut out);
    out
}

fn width(text: &str) -> usize {
    text.chars().count()
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    out.push_str(&" ".repeat(depth * INDENT_WIDTH));
    out.push_str(line);
    out.push('\n');
}

/// A run of inline content with no whitespace inside it, or a lone block node.
enum Segment<'a> {
    Word(String),
    Block(&'a Node),
}

/// Splits children at whitespace and around block-level nodes.
///
/// Pieces that touch without whitespace stay in one word so printing never
/// inserts whitespace where the source had none between inline content.
/// An inline element that wraps block content, or is wider than `available`
/// on its own, is printed as a block.
fn segments(children: &[Node], available: usize) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut word = String::new();

    fn flush(word: &mut String, segments: &mut Vec<Segment<'_>>) {
        if !word.is_empty() {
            segments.push(Segment::Word(std::mem::take(word)));
        }
    }

    for child in children {
        match child {
            Node::Text(text) => {
                if text.starts_with(' ') {
                    flush(&mut word, &mut segments);
                }
                for (i, piece) in text.split(' ').filter(|p| !p.is_empty()).enumerate() {
                    if i > 0 {
                        flush(&mut word, &mut segments);
                    }
                    word.push_str(piece);
                }
                if text.ends_with(' ') {
                    flush(&mut word, &mut segments);
                }
            }
            node if is_inline(node) && !has_block_descendant(node) => {
                let inline = render_inline(node);
                if width(&inline) <= available {
                    word.push_str(&inline);
                } else {
                    flush(&mut word, &mut segments);
                    segments.push(Segment::Block(node));
                }
            }
            node => {
                flush(&mut word, &mut segments);
                segments.push(Segment::Block(node));
            }
        }
    }
    flush(&mut word, &mut segments);

    segments
}

/// Prints children one level at a time, filling words into lines.
fn print_children(children: &[Node], depth: usize, out: &mut String) {
    let available = PRINT_WIDTH.saturating_sub(depth * INDENT_WIDTH).max(1);
    let mut line = String::new();

    for segment in segments(children, available) {
        match segment {
            Segment::Block(node) => {
                if !line.is_empty() {
                    push_line(out, depth, &std::mem::take(&mut line));
                }
                print_node(node, depth, out);
            }
            Segment::Word(word) => {
                if line.is_empty() {
                    line = word;
                } else if width(&line) + 1 + width(&word) <= available {
                    line.push(' ');
                    line.push_str(&word);
                } else {
                    push_line(out, depth, &std::mem::take(&mut line));
                    line = word;
                }
            }
        }
    }

    if !line.is_empty() {
        push_line(out, depth, &line);
    }
}

fn print_node(node: &Node, depth: usize, out: &mut String) {
    let indent = depth * INDENT_WIDTH;

    match node {
        Node::Element {
            name,
            attributes,
            children,
        } => {
            let inline = render_inline(node);
            if !inline.contains('\n') && indent + width(&inline) <= PRINT_WIDTH {
                push_line(out, depth, &inline);
                return;
            }

            print_open_tag(name, attributes, false, depth, out);
            print_children(children, depth + 1, out);
            push_line(out, depth, &format!("</{}>", name));
        }
        Node::Void { name, attributes } => {
            print_open_tag(name, attributes, true, depth, out);
        }
        // Raw content is reproduced exactly, including its line breaks.
        Node::Raw { .. } => push_line(out, depth, &render_inline(node)),
        Node::Text(text) => {
            if !text.trim().is_empty() {
                push_line(out, depth, text.trim());
            }
        }
        Node::Comment(_) | Node::Doctype(_) => push_line(out, depth, &render_inline(node)),
    }
}

/// Prints an opening tag on one line, or one attribute per line when it
/// does not fit.
fn print_open_tag(
    name: &str,
    attributes: &[Attribute],
    self_closing: bool,
    depth: usize,
    out: &mut String,
) {
    let tag = open_tag(name, attributes, self_closing);
    if attributes.is_empty() || depth * INDENT_WIDTH + width(&tag) <= PRINT_WIDTH {
        push_line(out, depth, &tag);
        return;
    }

    push_line(out, depth, &format!("<{}", name));
    for attribute in attributes {
        push_line(out, depth + 1, &render_attribute(attribute));
    }
    push_line(out, depth, if self_closing { "/>" } else { ">" });
}

/// Renders a node on a single line, with element content trimmed.
fn render_inline(node: &Node) -> String {
    match node {
        Node::Text(text) => text.clone(),
        Node::Comment(text) => format!("<!-- {} -->", text),
        Node::Doctype(text) => render_doctype(text),
        Node::Void { name, attributes } => open_tag(name, attributes, true),
        Node::Raw {
            name,
            attributes,
            content,
        } => format!("{}{}</{}>", open_tag(name, attributes, false), content, name),
        Node::Element {
            name,
            attributes,
            children,
        } => {
            let inner: String = children.iter().map(render_inline).collect();
            format!(
                "{}{}</{}>",
                open_tag(name, attributes, false),
                inner.trim_matches(' '),
                name
            )
        }
    }
}

fn render_doctype(text: &str) -> String {
    match text.get(..7) {
        Some(keyword) if keyword.eq_ignore_ascii_case("doctype") => {
            let rest = text[7..].trim();
            if rest.is_empty() {
                "<!doctype>".to_string()
            } else {
                format!("<!doctype {}>", rest)
            }
        }
        _ => format!("<!{}>", text),
    }
}

fn open_tag(name: &str, attributes: &[Attribute], self_closing: bool) -> String {
    let mut tag = format!("<{}", name);
    for attribute in attributes {
        tag.push(' ');
        tag.push_str(&render_attribute(attribute));
    }
    tag.push_str(if self_closing { " />" } else { ">" });
    tag
}

fn render_attribute(attribute: &Attribute) -> String {
    match &attribute.value {
        None => attribute.name.clone(),
        Some(value) if !value.contains('"') => format!("{}=\"{}\"", attribute.name, value),
        Some(value) if !value.contains('\'') => format!("{}='{}'", attribute.name, value),
        Some(value) => format!("{}=\"{}\"", attribute.name, value.replace('"', "&quot;")),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse;
    use super::*;

    fn print(src: &str) -> String {
        print_document(&parse(src).unwrap())
    }

    #[test]
    fn test_void_and_self_closed_elements() {
        assert_eq!(print("<br>"), "<br />\n");
        assert_eq!(
            print("<img src=\"a.png\" alt=\"A\">"),
            "<img src=\"a.png\" alt=\"A\" />\n"
        );
        assert_eq!(
            print("<svg><path d=\"M0 0\"/></svg>"),
            "<svg><path d=\"M0 0\" /></svg>\n"
        );
    }

    #[test]
    fn test_doctype_and_comment() {
        assert_eq!(
            print("<!DOCTYPE html>\n<!--   hero section   -->"),
            "<!doctype html>\n<!-- hero section -->\n"
        );
    }

    #[test]
    fn test_attribute_quoting() {
        assert_eq!(
            print(r#"<div title='say "hi"' data-a="it's"></div>"#),
            "<div title='say \"hi\"' data-a=\"it's\"></div>\n"
        );
    }

    #[test]
    fn test_long_open_tag_puts_attributes_on_lines() {
        let class = "a".repeat(130);
        let html = print(&format!("<div class=\"{}\" id=\"x\">Hi</div>", class));
        let expected = format!("<div\n  class=\"{}\"\n  id=\"x\"\n>\n  Hi\n</div>\n", class);
        assert_eq!(html, expected);
    }

    #[test]
    fn test_text_fills_lines_and_keeps_inline_elements() {
        let sentence = "word ".repeat(40);
        let html = print(&format!("<p>{}<strong>bold</strong>, end</p>", sentence));
        let lines: Vec<&str> = html.lines().collect();

        assert_eq!(lines[0], "<p>");
        assert_eq!(lines.last(), Some(&"</p>"));
        assert!(lines[1..lines.len() - 1]
            .iter()
            .all(|l| l.starts_with("  ") && l.chars().count() <= PRINT_WIDTH));
        // No whitespace is introduced between the element and the comma.
        assert!(html.contains("<strong>bold</strong>,"));
    }

    #[test]
    fn test_raw_text_keeps_line_breaks() {
        let html = print("<div><pre>line 1\n  line 2</pre></div>");
        assert_eq!(html, "<div>\n  <pre>line 1\n  line 2</pre>\n</div>\n");
    }

    #[test]
    fn test_link_wrapping_cards_respects_print_width() {
        let cards: String = (0..6)
            .map(|i| {
                format!(
                    "<div class=\"rounded-lg border border-gray-200 p-6 shadow-sm\">\
                     <h3 class=\"text-lg font-semibold text-gray-900\">Card {}</h3>\
                     <p class=\"mt-2 text-sm text-gray-600\">Short description of the card content.</p></div>",
                    i
                )
            })
            .collect();
        let html = print(&format!(
            "<section><a href=\"/x\" class=\"block rounded-xl hover:bg-gray-50\">{}</a></section>",
            cards
        ));

        let lines: Vec<&str> = html.lines().collect();
        assert!(
            lines.iter().all(|l| l.chars().count() <= PRINT_WIDTH),
            "{}",
            html
        );
        assert_eq!(lines[1], "  <a href=\"/x\" class=\"block rounded-xl hover:bg-gray-50\">");
        assert_eq!(lines[lines.len() - 2], "  </a>");
        assert_eq!(html.matches("<h3").count(), 6);
    }

    #[test]
    fn test_wide_inline_element_breaks_inside() {
        let words = "label ".repeat(30);
        let html = print(&format!("<p><span class=\"font-bold\">{}</span></p>", words));
        assert!(html.starts_with("<p>\n  <span class=\"font-bold\">\n    label"));
        assert!(html.lines().all(|l| l.chars().count() <= PRINT_WIDTH));
    }

    #[test]
    fn test_block_siblings_get_their_own_lines() {
        let paragraph = format!("<p>{}</p>", "x".repeat(60));
        let html = print(&format!("<section>{}{}</section>", paragraph, paragraph));
        let expected = format!("<section>\n  {}\n  {}\n</section>\n", paragraph, paragraph);
        assert_eq!(html, expected);
    }
}
