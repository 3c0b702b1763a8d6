//! A small, forgiving HTML tree builder.
//!
//! It handles the markup produced by the Markdown translator plus whatever
//! raw HTML authors embed: void elements, optional end tags (`p`, `li`, `td`,
//! ...), comments, character references and raw-text elements. It is not a
//! full HTML5 parser; unknown constructs degrade to text.

use regex::{Captures, Regex};
use std::sync::OnceLock;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

/// Arena-allocated document tree; node `0` is the document root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Opening one of these closes an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "main", "nav", "ol", "p", "pre", "section", "table", "ul",
];

impl Document {
    pub const ROOT: NodeId = 0;

    pub fn parse(html: &str) -> Self {
        let mut builder = TreeBuilder::new();
        builder.run(html);
        builder.doc
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id].data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
    }

    /// Parent element, skipping the document node.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.element(p).is_some())
    }

    /// 1-based position among element siblings and the sibling count.
    pub fn element_position(&self, id: NodeId) -> (usize, usize) {
        let Some(parent) = self.parent(id) else {
            return (1, 1);
        };
        let mut index = 0;
        let mut count = 0;
        for sibling in self.element_children(parent) {
            count += 1;
            if sibling == id {
                index = count;
            }
        }
        (index, count)
    }

    /// First element named `name` in document order.
    pub fn find_first(&self, name: &str) -> Option<NodeId> {
        (0..self.nodes.len()).find(|&id| self.tag_name(id) == Some(name))
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].data {
            NodeData::Text(t) => out.push_str(t),
            _ => {
                for &child in &self.nodes[id].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { parent: Some(parent), children: Vec::new(), data });
        self.nodes[parent].children.push(id);
        id
    }
}

struct TreeBuilder {
    doc: Document,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let doc = Document {
            nodes: vec![Node { parent: None, children: Vec::new(), data: NodeData::Document }],
        };
        Self { doc, open: vec![Document::ROOT] }
    }

    fn current(&self) -> NodeId {
        *self.open.last().unwrap_or(&Document::ROOT)
    }

    fn open_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.open.iter().rev().filter_map(|&id| self.doc.tag_name(id))
    }

    fn run(&mut self, html: &str) {
        let mut pos = 0;
        let len = html.len();
        while pos < len {
            let rest = &html[pos..];
            if let Some(after) = rest.strip_prefix("<!--") {
                pos += 4 + after.find("-->").map(|i| i + 3).unwrap_or(after.len());
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            } else if rest.starts_with("</") {
                match parse_end_tag(rest) {
                    Some((name, consumed)) => {
                        self.end_tag(&name);
                        pos += consumed;
                    }
                    None => {
                        self.text("<");
                        pos += 1;
                    }
                }
            } else if rest.starts_with('<') {
                match parse_start_tag(rest) {
                    Some((tag, consumed)) => {
                        pos += consumed;
                        let name = tag.name.clone();
                        let self_closing = tag.self_closing;
                        let opened = self.start_tag(tag);
                        if opened && !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                            let body = &html[pos..];
                            let end = find_raw_text_end(body, &name);
                            let content = &body[..end];
                            let text = if name == "title" || name == "textarea" {
                                decode_entities(content)
                            } else {
                                content.to_string()
                            };
                            if !text.is_empty() {
                                let current = self.current();
                                self.doc.push(current, NodeData::Text(text));
                            }
                            pos += end;
                        }
                    }
                    None => {
                        self.text("<");
                        pos += 1;
                    }
                }
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                self.text(&decode_entities(&rest[..end]));
                pos += end;
            }
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let current = self.current();
        // Merge with a preceding text node.
        if let Some(&last) = self.doc.nodes[current].children.last() {
            if let NodeData::Text(existing) = &mut self.doc.nodes[last].data {
                existing.push_str(text);
                return;
            }
        }
        self.doc.push(current, NodeData::Text(text.to_string()));
    }

    /// Returns whether the element was opened (pushed on the stack).
    fn start_tag(&mut self, tag: StartTag) -> bool {
        let name = tag.name.as_str();

        if matches!(name, "html" | "head" | "body") && self.open_names().any(|n| n == name) {
            return false;
        }

        if CLOSES_PARAGRAPH.contains(&name) {
            self.close_if_open("p", &["div", "blockquote", "li", "td", "th", "table"]);
        }
        match name {
            "li" => self.close_if_open("li", &["ul", "ol"]),
            "dt" | "dd" => {
                self.close_if_open("dt", &["dl"]);
                self.close_if_open("dd", &["dl"]);
            }
            "tr" => self.close_if_open("tr", &["table", "thead", "tbody", "tfoot"]),
            "td" | "th" => {
                self.close_if_open("td", &["tr", "table"]);
                self.close_if_open("th", &["tr", "table"]);
            }
            "thead" | "tbody" | "tfoot" => {
                for group in ["thead", "tbody", "tfoot"] {
                    self.close_if_open(group, &["table"]);
                }
            }
            _ => {}
        }

        let current = self.current();
        let void = VOID_ELEMENTS.contains(&name) || tag.self_closing;
        let id = self.doc.push(
            current,
            NodeData::Element(ElementData { name: tag.name, attrs: tag.attrs }),
        );
        if !void {
            self.open.push(id);
        }
        !void
    }

    /// Close the innermost open `name` unless a `boundary` element is
    /// reached first.
    fn close_if_open(&mut self, name: &str, boundary: &[&str]) {
        for (depth, &id) in self.open.iter().enumerate().rev() {
            match self.doc.tag_name(id) {
                Some(n) if n == name => {
                    self.open.truncate(depth);
                    return;
                }
                Some(n) if boundary.contains(&n) => return,
                _ => {}
            }
        }
    }

    fn end_tag(&mut self, name: &str) {
        let found = self
            .open
            .iter()
            .rposition(|&id| self.doc.tag_name(id) == Some(name));
        if let Some(depth) = found {
            self.open.truncate(depth);
        }
    }
}

struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_'
}

fn parse_end_tag(input: &str) -> Option<(String, usize)> {
    let body = &input[2..];
    let name_len = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
    if name_len == 0 || !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let close = body.find('>')?;
    Some((body[..name_len].to_ascii_lowercase(), 2 + close + 1))
}

fn parse_start_tag(input: &str) -> Option<(StartTag, usize)> {
    let body = &input[1..];
    if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
    let name = body[..name_len].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    let bytes = body.as_bytes();
    let mut i = name_len;

    loop {
        while i < bytes.len() && (bytes[i] as char).is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        match bytes[i] {
            b'>' => return Some((StartTag { name, attrs, self_closing }, 1 + i + 1)),
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let start = i;
        while i < bytes.len() && !matches!(bytes[i], b'=' | b'>' | b'/') && !(bytes[i] as char).is_ascii_whitespace() {
            i += 1;
        }
        let attr_name = body[start..i].to_ascii_lowercase();
        while i < bytes.len() && (bytes[i] as char).is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && (bytes[i] as char).is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                let value_start = i + 1;
                let value_end = body[value_start..].find(quote as char)? + value_start;
                value = decode_entities(&body[value_start..value_end]);
                i = value_end + 1;
            } else {
                let value_start = i;
                while i < bytes.len() && bytes[i] != b'>' && !(bytes[i] as char).is_ascii_whitespace() {
                    i += 1;
                }
                value = decode_entities(&body[value_start..i]);
            }
        }
        if !attr_name.is_empty() && !attrs.iter().any(|(k, _): &(String, String)| *k == attr_name) {
            attrs.push((attr_name, value));
        }
    }
}

fn find_raw_text_end(body: &str, name: &str) -> usize {
    let lower = body.to_ascii_lowercase();
    let needle = format!("</{}", name);
    lower.find(&needle).unwrap_or(body.len())
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});").unwrap())
}

/// Replace character references with the characters they name. Unknown
/// references are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    entity_regex()
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(num) = body.strip_prefix('#') {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
                    .map(|c| if c == '\0' { '\u{FFFD}' } else { c })
            } else {
                named_entity(body)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{A0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "bull" => '•',
        "middot" => '·',
        "deg" => '°',
        "times" => '×',
        "divide" => '÷',
        "plusmn" => '±',
        "euro" => '€',
        "pound" => '£',
        "yen" => '¥',
        "cent" => '¢',
        "sect" => '§',
        "para" => '¶',
        "larr" => '←',
        "rarr" => '→',
        "uarr" => '↑',
        "darr" => '↓',
        "check" => '✓',
        "shy" => '\u{AD}',
        _ => return None,
    })
}
