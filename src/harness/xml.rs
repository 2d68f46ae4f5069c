//! Minimal XML reader for single tool-call elements.
//!
//! Supports what model output realistically contains: nested elements,
//! attributes in either quote style, CDATA sections, comments, processing
//! instructions, self-closing tags, and the predefined plus numeric
//! character entities. DTDs and namespaces are not interpreted.

use thiserror::Error;

/// A well-formedness error with a 1-based line and 0-based column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}: line {line}, column {column}")]
pub struct XmlError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Element content in document order. Comments are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn has_element_children(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Text before the first child element.
    pub fn leading_text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) => text.push_str(t),
                Node::Element(_) => break,
            }
        }
        text
    }

    /// Serialize back to XML. Text is escaped, so CDATA content comes out
    /// as entity-escaped text; empty elements use `<name />`.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value, true));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str(" />");
            return;
        }

        out.push('>');
        for node in &self.children {
            match node {
                Node::Text(text) => out.push_str(&escape(text, false)),
                Node::Element(child) => child.write_xml(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Parse a document consisting of exactly one root element.
pub fn parse_element(input: &str) -> Result<Element, XmlError> {
    let mut reader = Reader { input, pos: 0 };

    reader.skip_misc()?;
    if !reader.rest().starts_with('<') {
        return Err(reader.error("no element found"));
    }
    let root = reader.element()?;
    reader.skip_misc()?;

    if reader.pos < input.len() {
        return Err(reader.error("junk after document element"));
    }
    Ok(root)
}

struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, message: &str) -> XmlError {
        let before = &self.input[..self.pos];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count(),
            None => before.chars().count(),
        };
        XmlError {
            message: message.to_string(),
            line,
            column,
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start_matches([' ', '\t', '\r', '\n']);
        self.pos = self.input.len() - trimmed.len();
    }

    /// Skip whitespace, comments and processing instructions.
    fn skip_misc(&mut self) -> Result<(), XmlError> {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("<!--") {
                self.comment()?;
            } else if self.rest().starts_with("<?") {
                self.processing_instruction()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<&'a str, XmlError> {
        match self.rest().find(terminator) {
            Some(rel) => {
                let body = &self.rest()[..rel];
                self.pos += rel + terminator.len();
                Ok(body)
            }
            None => {
                self.pos = self.input.len();
                Err(self.error(&format!("unclosed {}", what)))
            }
        }
    }

    fn comment(&mut self) -> Result<(), XmlError> {
        self.pos += "<!--".len();
        self.skip_past("-->", "comment")?;
        Ok(())
    }

    fn processing_instruction(&mut self) -> Result<(), XmlError> {
        self.pos += "<?".len();
        self.skip_past("?>", "processing instruction")?;
        Ok(())
    }

    fn name(&mut self) -> Result<String, XmlError> {
        let rest = self.rest();
        let mut end = 0;
        for (idx, ch) in rest.char_indices() {
            let valid = if idx == 0 {
                ch.is_alphabetic() || ch == '_' || ch == ':'
            } else {
                ch.is_alphanumeric() || matches!(ch, '_' | ':' | '-' | '.')
            };
            if !valid {
                break;
            }
            end = idx + ch.len_utf8();
        }

        if end == 0 {
            return Err(self.error("not well-formed (invalid token)"));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn element(&mut self) -> Result<Element, XmlError> {
        self.pos += 1; // '<'
        let name = self.name()?;
        let mut attributes: Vec<(String, String)> = Vec::new();

        loop {
            let had_space = {
                let before = self.pos;
                self.skip_whitespace();
                self.pos > before
            };

            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(Element {
                    name,
                    attributes,
                    children: Vec::new(),
                });
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }
            if !had_space || self.peek().is_none() {
                return Err(self.error("not well-formed (invalid token)"));
            }

            let key = self.name()?;
            if attributes.iter().any(|(existing, _)| *existing == key) {
                return Err(self.error("duplicate attribute"));
            }
            self.skip_whitespace();
            if self.peek() != Some('=') {
                return Err(self.error("not well-formed (invalid token)"));
            }
            self.pos += 1;
            self.skip_whitespace();
            let value = self.attribute_value()?;
            attributes.push((key, value));
        }

        let children = self.content(&name)?;
        Ok(Element {
            name,
            attributes,
            children,
        })
    }

    fn attribute_value(&mut self) -> Result<String, XmlError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("not well-formed (invalid token)")),
        };
        self.pos += 1;

        let Some(rel) = self.rest().find(quote) else {
            self.pos = self.input.len();
            return Err(self.error("unclosed token"));
        };
        let raw = &self.rest()[..rel];
        if let Some(lt) = raw.find('<') {
            self.pos += lt;
            return Err(self.error("not well-formed (invalid token)"));
        }
        let start = self.pos;
        let value = self.decode(raw, start)?;
        self.pos += rel + 1;
        Ok(value)
    }

    fn content(&mut self, name: &str) -> Result<Vec<Node>, XmlError> {
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error("no element found"));
            }

            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != name {
                    return Err(self.error("mismatched tag"));
                }
                self.skip_whitespace();
                if self.peek() != Some('>') {
                    return Err(self.error("not well-formed (invalid token)"));
                }
                self.pos += 1;
                return Ok(nodes);
            }

            if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let text = self.skip_past("]]>", "CDATA section")?;
                push_text(&mut nodes, text);
            } else if rest.starts_with("<!--") {
                self.comment()?;
            } else if rest.starts_with("<?") {
                self.processing_instruction()?;
            } else if rest.starts_with('<') {
                let child = self.element()?;
                nodes.push(Node::Element(child));
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let raw = &rest[..end];
                let start = self.pos;
                let text = self.decode(raw, start)?;
                self.pos += end;
                push_text(&mut nodes, &text);
            }
        }
    }

    /// Resolve entity references in `raw`, which starts at byte `start`.
    fn decode(&mut self, raw: &str, start: usize) -> Result<String, XmlError> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let entity_pos = start + (raw.len() - rest.len()) + amp;

            let Some(semi) = after.find(';') else {
                self.pos = entity_pos;
                return Err(self.error("not well-formed (invalid token)"));
            };
            let entity = &after[..semi];

            let resolved = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => numeric_entity(entity),
            };
            let Some(ch) = resolved else {
                self.pos = entity_pos;
                return Err(self.error("undefined entity"));
            };

            out.push(ch);
            rest = &after[semi + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}
