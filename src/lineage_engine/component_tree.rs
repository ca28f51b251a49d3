//! Component tree reader for pipeline definition documents.
//!
//! Turns a hierarchical pipeline definition (an SSIS-style XML document) into
//! an ordered tree of typed nodes with flat attribute maps. Namespaced
//! attribute names (`DTS:ObjectName`) are kept verbatim; lookup helpers match
//! on the local name so callers do not need to care about prefixes.
//!
//! This is the external-format boundary: a document that fails to parse is
//! skipped at batch level, it never aborts the run.

use std::collections::HashMap;

/// A single node in the component tree: type tag, attributes, text content
/// and child nodes in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<ComponentNode>,
}

impl ComponentNode {
    fn new(tag: String) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Tag name without a namespace prefix (`DTS:Executable` -> `Executable`)
    pub fn local_tag(&self) -> &str {
        match self.tag.rsplit(':').next() {
            Some(local) => local,
            None => &self.tag,
        }
    }

    /// Exact attribute lookup, prefix included
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute lookup by local name, matching `name` or any `prefix:name`
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        if let Some(value) = self.attributes.get(local) {
            return Some(value);
        }
        let suffix = format!(":{}", local);
        self.attributes
            .iter()
            .find(|(key, _)| key.ends_with(&suffix))
            .map(|(_, value)| value.as_str())
    }

    /// All nodes below this one, in document order, excluding self
    pub fn descendants(&self) -> Vec<&ComponentNode> {
        let mut nodes = Vec::new();
        for child in &self.children {
            nodes.push(child);
            nodes.extend(child.descendants());
        }
        nodes
    }
}

/// Error raised for documents that are not well-formed
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedEof(String),
    MismatchedTag { expected: String, found: String },
    Malformed { offset: usize, message: String },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedEof(what) => {
                write!(f, "unexpected end of document while reading {}", what)
            }
            ParseError::MismatchedTag { expected, found } => {
                write!(
                    f,
                    "mismatched closing tag: expected </{}>, found </{}>",
                    expected, found
                )
            }
            ParseError::Malformed { offset, message } => {
                write!(f, "malformed document at byte {}: {}", offset, message)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses a pipeline definition document into its component tree.
pub fn parse_document(input: &str) -> Result<ComponentNode, ParseError> {
    let mut parser = DocumentParser { input, pos: 0 };
    parser.skip_prolog()?;
    if parser.eof() {
        return Err(ParseError::UnexpectedEof("the document root".to_string()));
    }
    let root = parser.parse_element()?;
    parser.skip_prolog()?;
    if !parser.eof() {
        return Err(parser.malformed("trailing content after the document root"));
    }
    Ok(root)
}

struct DocumentParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> DocumentParser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.rest().starts_with(pattern)
    }

    fn malformed(&self, message: &str) -> ParseError {
        ParseError::Malformed {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Advances past `delimiter`, erroring with `what` at end of input
    fn skip_past(&mut self, delimiter: &str, what: &str) -> Result<(), ParseError> {
        match self.rest().find(delimiter) {
            Some(index) => {
                self.pos += index + delimiter.len();
                Ok(())
            }
            None => Err(ParseError::UnexpectedEof(what.to_string())),
        }
    }

    /// Skips whitespace, declarations, processing instructions and comments
    fn skip_prolog(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.skip_past("?>", "a processing instruction")?;
            } else if self.starts_with("<!--") {
                self.skip_past("-->", "a comment")?;
            } else if self.starts_with("<!") {
                self.skip_past(">", "a document type declaration")?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_element(&mut self) -> Result<ComponentNode, ParseError> {
        if !self.starts_with("<") {
            return Err(self.malformed("expected '<' to open an element"));
        }
        self.pos += 1;
        let tag = self.read_name()?;
        let mut node = ComponentNode::new(tag);

        // attributes until the tag closes
        loop {
            self.skip_whitespace();
            if self.starts_with("/>") {
                self.pos += 2;
                return Ok(node);
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.eof() {
                return Err(ParseError::UnexpectedEof(format!(
                    "attributes of element <{}>",
                    node.tag
                )));
            }
            let (name, value) = self.parse_attribute()?;
            node.attributes.insert(name, value);
        }

        let mut text = String::new();
        loop {
            if self.eof() {
                return Err(ParseError::UnexpectedEof(format!(
                    "content of element <{}>",
                    node.tag
                )));
            }
            if self.starts_with("</") {
                self.pos += 2;
                let closing = self.read_name()?;
                self.skip_whitespace();
                if !self.starts_with(">") {
                    return Err(self.malformed("expected '>' after a closing tag name"));
                }
                self.pos += 1;
                if closing != node.tag {
                    return Err(ParseError::MismatchedTag {
                        expected: node.tag,
                        found: closing,
                    });
                }
                break;
            }
            if self.starts_with("<!--") {
                self.skip_past("-->", "a comment")?;
            } else if self.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                match self.rest().find("]]>") {
                    Some(index) => {
                        text.push_str(&self.rest()[..index]);
                        self.pos += index + 3;
                    }
                    None => return Err(ParseError::UnexpectedEof("a CDATA section".to_string())),
                }
            } else if self.starts_with("<?") {
                self.skip_past("?>", "a processing instruction")?;
            } else if self.starts_with("<") {
                let child = self.parse_element()?;
                node.children.push(child);
            } else {
                let index = self.rest().find('<').unwrap_or(self.rest().len());
                text.push_str(&unescape(&self.rest()[..index]));
                self.pos += index;
            }
        }

        let trimmed = text.trim();
        node.text = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        Ok(node)
    }

    fn read_name(&mut self) -> Result<String, ParseError> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/' || c == '=')
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.malformed("expected a name"));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn parse_attribute(&mut self) -> Result<(String, String), ParseError> {
        let name = self.read_name()?;
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Err(self.malformed("expected '=' after an attribute name"));
        }
        self.pos += 1;
        self.skip_whitespace();
        let quote = match self.rest().chars().next() {
            Some(c @ ('"' | '\'')) => c,
            _ => return Err(self.malformed("expected a quoted attribute value")),
        };
        self.pos += 1;
        match self.rest().find(quote) {
            Some(index) => {
                let value = unescape(&self.rest()[..index]);
                self.pos += index + 1;
                Ok((name, value))
            }
            None => Err(ParseError::UnexpectedEof(format!(
                "the value of attribute '{}'",
                name
            ))),
        }
    }
}

/// Replaces entity references with their characters. Unknown references are
/// kept as-is rather than rejected; property payloads in the wild are sloppy.
fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(index) = rest.find('&') {
        out.push_str(&rest[..index]);
        rest = &rest[index..];
        let (ch, consumed) = decode_entity(rest);
        out.push(ch);
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

fn decode_entity(rest: &str) -> (char, usize) {
    for (entity, ch) in [
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&amp;", '&'),
        ("&quot;", '"'),
        ("&apos;", '\''),
    ] {
        if rest.starts_with(entity) {
            return (ch, entity.len());
        }
    }
    // numeric references (&#10; / &#xA;) show up in DTS property payloads
    if let Some(stripped) = rest.strip_prefix("&#") {
        if let Some(end) = stripped.find(';') {
            let body = &stripped[..end];
            let parsed = match body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => body.parse::<u32>().ok(),
            };
            if let Some(ch) = parsed.and_then(char::from_u32) {
                return (ch, 2 + end + 1);
            }
        }
    }
    ('&', 1)
}
