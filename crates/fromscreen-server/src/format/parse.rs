//! Strict markup parser.

use super::FormatError;

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is kept byte for byte.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "pre", "textarea"];

pub(super) fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// One `name` or `name="value"` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Whitespace-collapsed value, `None` for bare attributes like `disabled`.
    pub value: Option<String>,
}

/// A parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `<!doctype ...>` or another `<!...>` declaration, brackets stripped.
    Doctype(String),
    /// Comment text, trimmed.
    Comment(String),
    /// Text with whitespace runs collapsed to one space.
    Text(String),
    /// An element with children.
    Element {
        name: String,
        attributes: Vec<Attribute>,
        children: Vec<Node>,
    },
    /// A void or self-closed element.
    Void {
        name: String,
        attributes: Vec<Attribute>,
    },
    /// A raw-text element and its verbatim content.
    Raw {
        name: String,
        attributes: Vec<Attribute>,
        content: String,
    },
}

struct OpenElement {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<OpenElement>,
    roots: Vec<Node>,
}

/// Parses markup into a list of top-level nodes.
pub(super) fn parse(src: &str) -> Result<Vec<Node>, FormatError> {
    let mut parser = Parser {
        src,
        pos: 0,
        stack: Vec::new(),
        roots: Vec::new(),
    };

    while parser.pos < src.len() {
        parser.step()?;
    }

    if let Some(open) = parser.stack.pop() {
        return Err(FormatError::Unclosed(open.name));
    }

    let has_content = parser
        .roots
        .iter()
        .any(|node| !matches!(node, Node::Text(text) if text.trim().is_empty()));
    if !has_content {
        return Err(FormatError::Empty);
    }

    Ok(parser.roots)
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.src.as_bytes().get(pos).copied()
    }

    fn find_from(&self, from: usize, pattern: &str) -> Option<usize> {
        self.src[from..].find(pattern).map(|i| from + i)
    }

    fn skip_whitespace(&mut self) {
        while self
            .byte_at(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
    }

    fn step(&mut self) -> Result<(), FormatError> {
        let src = self.src;
        let start = self.pos;
        let rest = self.rest();

        if rest.starts_with("<!--") {
            let end = self
                .find_from(start + 4, "-->")
                .ok_or(FormatError::UnterminatedComment(start))?;
            let text = src[start + 4..end].trim().to_string();
            self.pos = end + 3;
            self.push(Node::Comment(text));
        } else if rest.starts_with("</") {
            let end = self
                .find_from(start, ">")
                .ok_or(FormatError::UnterminatedTag(start))?;
            let name = src[start + 2..end].trim();
            self.pos = end + 1;
            self.close(name, start)?;
        } else if rest.starts_with("<!") {
            let end = self
                .find_from(start, ">")
                .ok_or(FormatError::UnterminatedTag(start))?;
            let text = collapse_whitespace(src[start + 2..end].trim());
            self.pos = end + 1;
            self.push(Node::Doctype(text));
        } else if rest.starts_with('<')
            && self.byte_at(start + 1).is_some_and(|b| b.is_ascii_alphabetic())
        {
            self.open_tag()?;
        } else {
            // Text runs to the next `<`. A `<` that starts no tag is text too.
            let first = rest.chars().next().map_or(1, char::len_utf8);
            let end = self.find_from(start + first, "<").unwrap_or(src.len());
            let text = collapse_whitespace(&src[start..end]);
            self.pos = end;
            self.push(Node::Text(text));
        }

        Ok(())
    }

    fn push(&mut self, node: Node) {
        let siblings = match self.stack.last_mut() {
            Some(open) => &mut open.children,
            None => &mut self.roots,
        };

        if let Node::Text(text) = &node {
            if let Some(Node::Text(previous)) = siblings.last_mut() {
                if previous.ends_with(' ') && text.starts_with(' ') {
                    previous.push_str(&text[1..]);
                } else {
                    previous.push_str(text);
                }
                return;
            }
        }
        siblings.push(node);
    }

    fn close(&mut self, name: &str, offset: usize) -> Result<(), FormatError> {
        // `</br>` and friends carry no meaning.
        if is_void(name) {
            return Ok(());
        }

        let matches_top = self
            .stack
            .last()
            .is_some_and(|open| open.name.eq_ignore_ascii_case(name));
        if !matches_top {
            return Err(FormatError::UnexpectedClose {
                name: name.to_string(),
                offset,
            });
        }

        let open = self
            .stack
            .pop()
            .ok_or_else(|| FormatError::Unclosed(name.to_string()))?;
        self.push(Node::Element {
            name: open.name,
            attributes: open.attributes,
            children: open.children,
        });
        Ok(())
    }

    fn open_tag(&mut self) -> Result<(), FormatError> {
        let start = self.pos;
        self.pos += 1;

        let name_start = self.pos;
        while self
            .byte_at(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_' | b'.'))
        {
            self.pos += 1;
        }
        let name = self.src[name_start..self.pos].to_string();

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            match self.byte_at(self.pos) {
                None => return Err(FormatError::UnterminatedTag(start)),
                Some(b'>') => {
                    self.pos += 1;
                    break false;
                }
                Some(b'/') if self.byte_at(self.pos + 1) == Some(b'>') => {
                    self.pos += 2;
                    break true;
                }
                Some(b'/') | Some(b'=') => {
                    self.pos += 1;
                }
                Some(_) => attributes.push(self.attribute(start)?),
            }
        };

        if self_closing || is_void(&name) {
            self.push(Node::Void { name, attributes });
        } else if is_raw_text(&name) {
            let content = self.raw_text(&name)?;
            self.push(Node::Raw {
                name,
                attributes,
                content,
            });
        } else {
            self.stack.push(OpenElement {
                name,
                attributes,
                children: Vec::new(),
            });
        }

        Ok(())
    }

    fn attribute(&mut self, tag_start: usize) -> Result<Attribute, FormatError> {
        let name_start = self.pos;
        while self
            .byte_at(self.pos)
            .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
        {
            self.pos += 1;
        }
        let name = self.src[name_start..self.pos].to_string();

        self.skip_whitespace();
        if self.byte_at(self.pos) != Some(b'=') {
            return Ok(Attribute { name, value: None });
        }
        self.pos += 1;
        self.skip_whitespace();

        let value = match self.byte_at(self.pos) {
            None => return Err(FormatError::UnterminatedTag(tag_start)),
            Some(quote @ (b'"' | b'\'')) => {
                let value_start = self.pos;
                let close = self
                    .find_from(value_start + 1, if quote == b'"' { "\"" } else { "'" })
                    .ok_or(FormatError::UnterminatedAttribute(value_start))?;
                self.pos = close + 1;
                &self.src[value_start + 1..close]
            }
            Some(_) => {
                let value_start = self.pos;
                while self
                    .byte_at(self.pos)
                    .is_some_and(|b| !b.is_ascii_whitespace() && b != b'>')
                {
                    self.pos += 1;
                }
                &self.src[value_start..self.pos]
            }
        };

        Ok(Attribute {
            name,
            value: Some(collapse_whitespace(value.trim())),
        })
    }

    /// Consumes everything up to and including `</name ...>`.
    fn raw_text(&mut self, name: &str) -> Result<String, FormatError> {
        let needle = format!("</{}", name.to_ascii_lowercase());
        let lowered = self.rest().to_ascii_lowercase();
        let close = lowered
            .find(&needle)
            .map(|i| self.pos + i)
            .ok_or_else(|| FormatError::Unclosed(name.to_string()))?;
        let end = self
            .find_from(close, ">")
            .ok_or(FormatError::UnterminatedTag(close))?;

        let content = self.src[self.pos..close].to_string();
        self.pos = end + 1;
        Ok(content)
    }
}

/// Replaces every run of ASCII whitespace with a single space.
pub(super) fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}
