//! Markdown to HTML translation.
//!
//! Parsing is done by `pulldown-cmark`; the event stream is post-processed to
//! provide the extensions the converter always enables: heading ids and a
//! `[TOC]` marker, highlighted code blocks, newline-to-`<br>`, abbreviations
//! and block attribute lists.

use crate::highlight::{CodeHighlighter, escape_html};
use crate::units::{quoted, run_parser, ws};
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{is_not, take_while1};
use nom::character::complete::{char, multispace1};
use nom::combinator::{map, opt};
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair, preceded, separated_pair};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// A named translator behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// Pipe tables with column alignment.
    Tables,
    /// Backtick and tilde fenced code blocks.
    FencedCode,
    Footnotes,
    DefinitionLists,
    /// `*[HTML]: Hyper Text Markup Language` definitions mark up every use
    /// of the abbreviation with `<abbr>`.
    Abbreviations,
    /// `{#id .class key=value}` on headings, and `{: ...}` closing a
    /// paragraph or a list item.
    Attributes,
    /// Syntax-highlighting markup on fenced code.
    CodeHighlight,
    /// Soft line breaks become hard breaks.
    NewlineToBreak,
    /// Ordered lists keep their start number; list kinds never merge.
    SaneLists,
    /// Heading ids plus `[TOC]` replacement.
    TableOfContents,
}

const STANDARD_EXTENSIONS: [Extension; 10] = [
    Extension::Tables,
    Extension::FencedCode,
    Extension::Footnotes,
    Extension::DefinitionLists,
    Extension::Abbreviations,
    Extension::Attributes,
    Extension::CodeHighlight,
    Extension::NewlineToBreak,
    Extension::SaneLists,
    Extension::TableOfContents,
];

/// The fixed set of extensions every conversion runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: &'static [Extension],
}

impl ExtensionSet {
    pub const fn standard() -> Self {
        Self { extensions: &STANDARD_EXTENSIONS }
    }

    pub fn contains(&self, ext: Extension) -> bool {
        self.extensions.contains(&ext)
    }

    pub fn iter(&self) -> impl Iterator<Item = Extension> + '_ {
        self.extensions.iter().copied()
    }

    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        for ext in self.iter() {
            match ext {
                Extension::Tables => options.insert(Options::ENABLE_TABLES),
                Extension::Footnotes => options.insert(Options::ENABLE_FOOTNOTES),
                Extension::DefinitionLists => options.insert(Options::ENABLE_DEFINITION_LIST),
                Extension::Attributes => options.insert(Options::ENABLE_HEADING_ATTRIBUTES),
                // Handled by CommonMark itself or by post-processing.
                Extension::FencedCode
                | Extension::Abbreviations
                | Extension::CodeHighlight
                | Extension::NewlineToBreak
                | Extension::SaneLists
                | Extension::TableOfContents => {}
            }
        }
        options
    }
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// One heading collected for the table of contents.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

pub struct MarkdownTranslator {
    extensions: ExtensionSet,
    highlighter: CodeHighlighter,
}

impl MarkdownTranslator {
    pub fn new() -> Self {
        Self {
            extensions: ExtensionSet::standard(),
            highlighter: CodeHighlighter::new(),
        }
    }

    pub fn extensions(&self) -> ExtensionSet {
        self.extensions
    }

    /// Convert Markdown source to an HTML fragment.
    pub fn translate(&self, source: &str) -> String {
        let (text, abbreviations) = if self.extensions.contains(Extension::Abbreviations) {
            Abbreviations::extract(source)
        } else {
            (source.to_string(), Abbreviations::default())
        };
        let block_attributes = self.extensions.contains(Extension::Attributes);

        let parser = Parser::new_ext(&text, self.extensions.parser_options());
        let mut events: Vec<Event> = Vec::new();
        let mut toc: Vec<TocEntry> = Vec::new();
        let mut used_ids: HashSet<String> = HashSet::new();
        // Where each open paragraph or list item starts in `events`.
        let mut blocks: Vec<usize> = Vec::new();

        let mut heading: Option<PendingHeading> = None;
        let mut code: Option<(String, String)> = None;

        for event in parser {
            if let Some((lang, buf)) = code.as_mut() {
                match event {
                    Event::Text(text) => buf.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        let block = if self.extensions.contains(Extension::CodeHighlight) {
                            self.highlighter.highlight_block(buf, lang)
                        } else {
                            format!("<pre><code>{}</code></pre>\n", escape_html(buf))
                        };
                        events.push(Event::Html(block.into()));
                        code = None;
                    }
                    _ => {}
                }
                continue;
            }

            let event = match event {
                Event::SoftBreak if self.extensions.contains(Extension::NewlineToBreak) => {
                    Event::HardBreak
                }
                other => other,
            };

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info.to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code = Some((lang, String::new()));
                }
                Event::Start(Tag::Heading { level, id, classes, attrs }) => {
                    heading = Some(PendingHeading {
                        level,
                        id: id.map(|s| s.to_string()),
                        classes: classes.iter().map(|c| c.to_string()).collect(),
                        attrs: attrs
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.as_ref().map(|v| v.to_string())))
                            .collect(),
                        inner: Vec::new(),
                        text: String::new(),
                    });
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(pending) = heading.take() {
                        let html = pending.finish(&mut used_ids, &mut toc);
                        events.push(Event::Html(html.into()));
                    }
                }
                other => {
                    for event in abbreviations.expand(other) {
                        if let Some(pending) = heading.as_mut() {
                            match &event {
                                Event::Text(t) | Event::Code(t) => pending.text.push_str(t),
                                _ => {}
                            }
                            pending.inner.push(event);
                            continue;
                        }
                        if matches!(event, Event::Start(Tag::Paragraph | Tag::Item)) {
                            blocks.push(events.len());
                        }
                        let closes_block = matches!(event, Event::End(TagEnd::Paragraph | TagEnd::Item));
                        events.push(event);
                        if closes_block {
                            if let Some(start) = blocks.pop().filter(|_| block_attributes) {
                                apply_block_attributes(&mut events, start);
                            }
                        }
                    }
                }
            }
        }

        if self.extensions.contains(Extension::TableOfContents) {
            events = replace_toc_markers(events, &toc);
        }

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

impl Default for MarkdownTranslator {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate with the standard extension set.
pub fn translate(source: &str) -> String {
    MarkdownTranslator::new().translate(source)
}

struct PendingHeading<'a> {
    level: HeadingLevel,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    inner: Vec<Event<'a>>,
    text: String,
}

impl PendingHeading<'_> {
    fn finish(self, used_ids: &mut HashSet<String>, toc: &mut Vec<TocEntry>) -> String {
        let id = match self.id {
            Some(explicit) => explicit,
            None => unique_id(&slugify(&self.text), used_ids),
        };
        used_ids.insert(id.clone());

        let level = self.level as u8;
        toc.push(TocEntry { level, id: id.clone(), text: self.text.trim().to_string() });

        let mut inner = String::new();
        html::push_html(&mut inner, self.inner.into_iter());

        let mut attrs = format!(" id=\"{}\"", escape_html(&id));
        if !self.classes.is_empty() {
            attrs.push_str(&format!(" class=\"{}\"", escape_html(&self.classes.join(" "))));
        }
        for (key, value) in &self.attrs {
            match value {
                Some(v) => attrs.push_str(&format!(" {}=\"{}\"", key, escape_html(v))),
                None => attrs.push_str(&format!(" {}", key)),
            }
        }
        format!("<h{level}{attrs}>{inner}</h{level}>\n")
    }
}

fn slug_strip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").unwrap())
}

fn slug_dash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-\s]+").unwrap())
}

/// Lowercased ASCII slug. Accented letters lose their accents, other
/// non-ASCII characters are dropped; word characters, spaces and hyphens
/// survive, and runs of spaces/hyphens collapse to a single `-`.
pub fn slugify(text: &str) -> String {
    let ascii: String = text.nfkd().filter(char::is_ascii).collect();
    let stripped = slug_strip_regex().replace_all(&ascii, "");
    let lowered = stripped.trim().to_lowercase();
    slug_dash_regex().replace_all(&lowered, "-").to_string()
}

fn abbreviation_definition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ {0,3}\*\[([^\]]+)\] ?:[ \t]*(.*?)\s*$").unwrap())
}

/// Abbreviations defined in a document, with their expansions.
#[derive(Debug, Default)]
struct Abbreviations {
    titles: HashMap<String, String>,
    pattern: Option<Regex>,
}

impl Abbreviations {
    /// Remove the definition lines from `source`, outside fenced code.
    fn extract(source: &str) -> (String, Self) {
        let mut text = String::with_capacity(source.len());
        let mut titles = HashMap::new();
        let mut fence: Option<String> = None;
        for line in source.split_inclusive('\n') {
            let trimmed = line.trim_start();
            let marker: String = trimmed.chars().take_while(|c| matches!(c, '`' | '~')).collect();
            match &fence {
                Some(open) if trimmed.starts_with(open.as_str()) && trimmed[open.len()..].trim().is_empty() => fence = None,
                Some(_) => {}
                None if marker.len() >= 3 && line.len() - trimmed.len() < 4 => fence = Some(marker),
                None => {
                    if let Some(caps) = abbreviation_definition_regex().captures(line) {
                        titles.insert(caps[1].to_string(), caps[2].to_string());
                        continue;
                    }
                }
            }
            text.push_str(line);
        }

        let mut names: Vec<&String> = titles.keys().collect();
        // Longest first so a longer abbreviation wins over its prefix.
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let pattern = (!names.is_empty())
            .then(|| {
                let alternatives: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
                Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).ok()
            })
            .flatten();
        (text, Self { titles, pattern })
    }

    /// Split a text event around each use of an abbreviation.
    fn expand<'a>(&self, event: Event<'a>) -> Vec<Event<'a>> {
        let (Some(pattern), Event::Text(text)) = (&self.pattern, &event) else {
            return vec![event];
        };
        if !pattern.is_match(text) {
            return vec![event];
        }
        let mut out = Vec::new();
        let mut last = 0;
        for found in pattern.find_iter(text) {
            if found.start() > last {
                out.push(Event::Text(text[last..found.start()].to_string().into()));
            }
            let title = self.titles.get(found.as_str()).map(String::as_str).unwrap_or_default();
            out.push(Event::InlineHtml(format!("<abbr title=\"{}\">", escape_html(title)).into()));
            out.push(Event::Text(found.as_str().to_string().into()));
            out.push(Event::InlineHtml("</abbr>".into()));
            last = found.end();
        }
        if last < text.len() {
            out.push(Event::Text(text[last..].to_string().into()));
        }
        out
    }
}

/// One entry of a `{: ...}` attribute list.
#[derive(Debug, Clone, PartialEq)]
enum BlockAttribute {
    Id(String),
    Class(String),
    Pair(String, String),
}

fn attribute_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | ':'))(input)
}

fn attribute_value(input: &str) -> IResult<&str, String> {
    alt((
        map(quoted, |q: &str| q[1..].strip_suffix(&q[..1]).unwrap_or(&q[1..]).to_string()),
        map(is_not(" \t\r\n}"), str::to_string),
    ))(input)
}

fn block_attribute(input: &str) -> IResult<&str, BlockAttribute> {
    alt((
        map(preceded(char('#'), attribute_name), |n: &str| BlockAttribute::Id(n.to_string())),
        map(preceded(char('.'), attribute_name), |n: &str| BlockAttribute::Class(n.to_string())),
        map(separated_pair(attribute_name, char('='), attribute_value), |(k, v): (&str, String)| {
            BlockAttribute::Pair(k.to_string(), v)
        }),
    ))(input)
}

fn attribute_list(input: &str) -> IResult<&str, Vec<BlockAttribute>> {
    delimited(pair(char('{'), opt(char(':'))), ws(separated_list0(multispace1, block_attribute)), char('}'))(input)
}

/// Parse `{: #id .class key="value"}` into HTML attribute text with a
/// leading space. Empty lists are not attribute lists.
fn parse_attribute_list(text: &str) -> Option<String> {
    let attributes = run_parser(attribute_list, text).filter(|list| !list.is_empty())?;
    let mut id = None;
    let mut classes: Vec<String> = Vec::new();
    let mut pairs: Vec<(String, String)> = Vec::new();
    for attribute in attributes {
        match attribute {
            BlockAttribute::Id(v) => id = Some(v),
            BlockAttribute::Class(v) => classes.push(v),
            BlockAttribute::Pair(k, v) if k == "id" => id = Some(v),
            BlockAttribute::Pair(k, v) if k == "class" => classes.extend(v.split_whitespace().map(str::to_string)),
            BlockAttribute::Pair(k, v) => pairs.push((k, v)),
        }
    }
    let mut html = String::new();
    if let Some(id) = id {
        html.push_str(&format!(" id=\"{}\"", escape_html(&id)));
    }
    if !classes.is_empty() {
        html.push_str(&format!(" class=\"{}\"", escape_html(&classes.join(" "))));
    }
    for (key, value) in pairs {
        html.push_str(&format!(" {}=\"{}\"", key, escape_html(&value)));
    }
    Some(html)
}

fn trailing_attribute_list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+(\{:?[ \t]*[^}\n \t][^}\n]*\})[ \t]*$").unwrap())
}

/// Move an attribute list closing the paragraph or list item that starts
/// at `start` (and ends with the last event) onto its opening tag.
fn apply_block_attributes(events: &mut Vec<Event<'_>>, start: usize) {
    let end = events.len() - 1;
    match events[start] {
        Event::Start(Tag::Paragraph) => {
            // The list sits alone on the last line.
            let mut first = end;
            while first > start + 1 && matches!(events[first - 1], Event::Text(_)) {
                first -= 1;
            }
            if first == end || first < start + 2 || !matches!(events[first - 1], Event::SoftBreak | Event::HardBreak) {
                return;
            }
            let line: String = events[first..end]
                .iter()
                .filter_map(|e| match e {
                    Event::Text(t) => Some(t.as_ref()),
                    _ => None,
                })
                .collect();
            let Some(attributes) = parse_attribute_list(&line) else {
                return;
            };
            events.drain(first - 1..end);
            events[start] = Event::Html(format!("<p{}>", attributes).into());
            let last = events.len() - 1;
            events[last] = Event::Html("</p>\n".into());
        }
        Event::Start(Tag::Item) if end > start + 1 => {
            let Event::Text(text) = &events[end - 1] else {
                return;
            };
            let parsed = trailing_attribute_list_regex().captures(text).and_then(|caps: Captures| {
                let whole = caps.get(0)?;
                Some((text[..whole.start()].to_string(), parse_attribute_list(&caps[1])?))
            });
            let Some((head, attributes)) = parsed else {
                return;
            };
            events[end - 1] = Event::Text(head.into());
            events[start] = Event::Html(format!("<li{}>", attributes).into());
            events[end] = Event::Html("</li>\n".into());
        }
        _ => {}
    }
}

/// `base`, or `base_1`, `base_2`, ... when already taken. Empty slugs are
/// never valid ids.
fn unique_id(base: &str, used: &HashSet<String>) -> String {
    if !base.is_empty() && !used.contains(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn replace_toc_markers<'a>(events: Vec<Event<'a>>, toc: &[TocEntry]) -> Vec<Event<'a>> {
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0;
    while i < events.len() {
        if matches!(events[i], Event::Start(Tag::Paragraph)) {
            if let Some(end) = toc_marker_end(&events, i) {
                out.push(Event::Html(render_toc(toc).into()));
                i = end + 1;
                continue;
            }
        }
        out.push(events[i].clone());
        i += 1;
    }
    out
}

/// Index of the closing paragraph event when the paragraph at `start` holds
/// nothing but the text `[TOC]`.
fn toc_marker_end(events: &[Event], start: usize) -> Option<usize> {
    let mut text = String::new();
    for (offset, event) in events[start + 1..].iter().enumerate() {
        match event {
            Event::Text(t) => text.push_str(t),
            Event::End(TagEnd::Paragraph) => {
                return (text.trim() == "[TOC]").then_some(start + 1 + offset);
            }
            _ => return None,
        }
    }
    None
}

fn render_toc(toc: &[TocEntry]) -> String {
    let mut html = String::from("<div class=\"toc\">\n");
    let mut stack: Vec<u8> = Vec::new();
    for entry in toc {
        if stack.last().is_some_and(|&top| entry.level <= top) {
            while stack.last().is_some_and(|&top| entry.level < top) {
                html.push_str("</li>\n</ul>\n");
                stack.pop();
            }
            if stack.last().is_some_and(|&top| entry.level == top) {
                html.push_str("</li>\n");
            } else {
                // Shallower than anything open but deeper than the parent level.
                html.push_str("<ul>\n");
                stack.push(entry.level);
            }
        } else {
            html.push_str("<ul>\n");
            stack.push(entry.level);
        }
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            escape_html(&entry.id),
            escape_html(&entry.text)
        ));
    }
    for _ in stack {
        html.push_str("</li>\n</ul>\n");
    }
    html.push_str("</div>\n");
    html
}
