//! Inline formatting: styled text is cut into pieces (words, spaces, glue,
//! images, anchors and forced breaks), pieces are broken into lines, and
//! lines are painted at a baseline.

use crate::cascade::{TextAlign, WhiteSpace};
use crate::fallback_font::{FallbackFont, Glyph};
use crate::fonts::{PdfFont, StandardFont, encode_winansi, is_standard_encodable};
use crate::pdf_generator::DrawOp;
use crate::units::{BorderStyle, Color};
use std::sync::Arc;

const TAB_SIZE: usize = 8;
const EPSILON: f32 = 0.01;

/// Background of an inline element such as `<code>`; the vertical padding
/// extends the painted area without affecting the line height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanBackground {
    pub color: Color,
    pub padding_y: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: StandardFont,
    pub size: f32,
    pub color: Color,
    pub line_height: f32,
    pub underline: bool,
    pub line_through: bool,
    pub background: Option<SpanBackground>,
    /// Index into the document's link targets.
    pub link: Option<usize>,
    /// Face for characters `font` cannot encode.
    pub fallback: Option<Arc<FallbackFont>>,
}

impl TextStyle {
    pub fn ascent(&self) -> f32 {
        self.font.ascent() * self.size / 1000.0
    }

    pub fn descent(&self) -> f32 {
        self.font.descent() * self.size / 1000.0
    }

    pub fn text_width(&self, text: &str) -> f32 {
        match self.fallback {
            None => self.font.text_width(text, self.size),
            Some(_) => text.chars().map(|c| self.char_width(c)).sum(),
        }
    }

    /// Advance of `c` in points.
    pub fn char_width(&self, c: char) -> f32 {
        match self.fallback_glyph(c) {
            Some((font, glyph)) => font.advance(glyph, self.size),
            None => self.font.char_width(c) * self.size / 1000.0,
        }
    }

    /// The fallback glyph `c` is drawn with, if the standard font lacks it.
    fn fallback_glyph(&self, c: char) -> Option<(&FallbackFont, Glyph)> {
        if is_standard_encodable(c) {
            return None;
        }
        let font = self.fallback.as_deref()?;
        Some((font, font.glyph(c)?))
    }

    fn half_leading_extents(&self) -> (f32, f32) {
        let (a, d) = (self.ascent(), self.descent());
        let lead = (self.line_height - (a + d)) / 2.0;
        (a + lead, d + lead)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PieceKind {
    Word(String),
    Space { preserved: bool },
    /// Horizontal space taken by an inline box's padding and border.
    Glue,
    Image { id: usize, height: f32 },
    /// Zero-width marker for an element id.
    Anchor(String),
    Break,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub kind: PieceKind,
    pub width: f32,
    pub style: usize,
    /// A line may break right before this piece.
    pub break_before: bool,
}

impl Piece {
    fn is_space(&self) -> bool {
        matches!(self.kind, PieceKind::Space { .. })
    }

    fn is_content(&self) -> bool {
        !matches!(self.kind, PieceKind::Space { .. } | PieceKind::Anchor(_))
    }
}

/// The inline content of one block container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineContent {
    pub pieces: Vec<Piece>,
    pub styles: Vec<TextStyle>,
}

impl InlineContent {
    /// True when nothing would be painted.
    pub fn is_blank(&self) -> bool {
        !self.pieces.iter().any(|p| p.is_content())
    }

    pub fn anchors(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|p| match &p.kind {
            PieceKind::Anchor(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Accumulates pieces while walking an inline subtree, applying
/// `white-space` processing as text arrives.
#[derive(Debug)]
pub struct InlineBuilder {
    content: InlineContent,
    after_space: bool,
    column: usize,
    break_next: bool,
}

impl Default for InlineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InlineBuilder {
    pub fn new() -> Self {
        Self {
            content: InlineContent::default(),
            after_space: true,
            column: 0,
            break_next: false,
        }
    }

    /// Index of `style`, interning equal styles.
    pub fn style(&mut self, style: TextStyle) -> usize {
        if let Some(i) = self.content.styles.iter().rposition(|s| *s == style) {
            return i;
        }
        self.content.styles.push(style);
        self.content.styles.len() - 1
    }

    fn push(&mut self, kind: PieceKind, width: f32, style: usize) {
        let break_before = self.break_next;
        self.break_next = false;
        self.content.pieces.push(Piece { kind, width, style, break_before });
    }

    fn flush_word(&mut self, word: &mut String, style: usize) {
        if word.is_empty() {
            return;
        }
        let text = std::mem::take(word);
        let width = self.content.styles[style].text_width(&text);
        self.push(PieceKind::Word(text), width, style);
        self.after_space = false;
    }

    fn push_space(&mut self, style: usize, preserved: bool) {
        let width = self.content.styles[style].text_width(" ");
        self.push(PieceKind::Space { preserved }, width, style);
        self.after_space = true;
    }

    pub fn push_text(&mut self, text: &str, style: usize, white_space: WhiteSpace) {
        let mut word = String::new();
        for c in text.chars() {
            if white_space.collapses_spaces() {
                if c == '\n' && white_space.preserves_newlines() {
                    self.flush_word(&mut word, style);
                    self.push_break(style);
                } else if matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c') {
                    self.flush_word(&mut word, style);
                    if !self.after_space {
                        self.push_space(style, false);
                    }
                } else {
                    word.push(c);
                }
                continue;
            }
            match c {
                '\n' => {
                    self.flush_word(&mut word, style);
                    self.push_break(style);
                }
                '\r' => {}
                '\t' => {
                    self.flush_word(&mut word, style);
                    for _ in 0..TAB_SIZE - self.column % TAB_SIZE {
                        self.push_space(style, true);
                        self.column += 1;
                    }
                }
                ' ' => {
                    self.flush_word(&mut word, style);
                    self.push_space(style, true);
                    self.column += 1;
                }
                _ => {
                    word.push(c);
                    self.column += 1;
                }
            }
        }
        self.flush_word(&mut word, style);
    }

    pub fn push_break(&mut self, style: usize) {
        self.push(PieceKind::Break, 0.0, style);
        self.after_space = true;
        self.column = 0;
    }

    pub fn push_glue(&mut self, width: f32, style: usize) {
        if width > 0.0 {
            self.push(PieceKind::Glue, width, style);
        }
    }

    pub fn push_image(&mut self, id: usize, width: f32, height: f32, style: usize) {
        self.break_next = true;
        self.push(PieceKind::Image { id, height }, width, style);
        self.break_next = true;
        self.after_space = false;
    }

    pub fn push_anchor(&mut self, name: &str, style: usize) {
        let break_before = self.break_next;
        self.content.pieces.push(Piece {
            kind: PieceKind::Anchor(name.to_string()),
            width: 0.0,
            style,
            break_before: false,
        });
        self.break_next = break_before;
    }

    pub fn finish(self) -> InlineContent {
        self.content
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub pieces: Vec<Piece>,
    pub width: f32,
    /// Ended by `<br>` or a preserved newline rather than by wrapping.
    pub ends_with_break: bool,
}

impl Line {
    pub fn has_content(&self) -> bool {
        self.pieces.iter().any(|p| p.is_content())
    }

    fn has_anchor(&self) -> bool {
        self.pieces.iter().any(|p| matches!(p.kind, PieceKind::Anchor(_)))
    }

    fn push(&mut self, piece: Piece) {
        self.width += piece.width;
        self.pieces.push(piece);
    }

    fn trim_end(&mut self) {
        while let Some(index) = self
            .pieces
            .iter()
            .rposition(|p| !matches!(p.kind, PieceKind::Anchor(_)))
            .filter(|&i| matches!(self.pieces[i].kind, PieceKind::Space { preserved: false }))
        {
            self.pieces.remove(index);
        }
        self.width = self.pieces.iter().map(|p| p.width).sum();
    }
}

fn finish_line(lines: &mut Vec<Line>, line: &mut Line, keep_empty: bool) {
    let mut done = std::mem::take(line);
    done.trim_end();
    if keep_empty || done.has_content() || done.has_anchor() {
        lines.push(done);
    }
}

/// Where [`break_lines`] may end a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    /// At spaces and around images.
    Soft,
    /// Only at forced breaks, but a line wider than the box is cut between
    /// characters.
    Preformatted,
    /// Only at forced breaks; wide lines overflow.
    Never,
}

impl Wrap {
    pub fn for_white_space(white_space: WhiteSpace) -> Self {
        match white_space {
            WhiteSpace::Pre => Wrap::Preformatted,
            WhiteSpace::NoWrap => Wrap::Never,
            _ => Wrap::Soft,
        }
    }
}

/// End of the unbreakable group that starts at `start`.
fn group_end(pieces: &[Piece], start: usize, wrap: bool) -> usize {
    let mut j = start + 1;
    while j < pieces.len() {
        let p = &pieces[j];
        if matches!(p.kind, PieceKind::Break) {
            break;
        }
        if wrap && (p.is_space() || p.break_before) {
            break;
        }
        j += 1;
    }
    j
}

/// Longest prefix of `text` no wider than `room`; with `force`, at least
/// one character.
fn split_word(text: &str, style: &TextStyle, room: f32, force: bool) -> (String, String) {
    let mut width = 0.0;
    let mut split = 0;
    for (i, c) in text.char_indices() {
        let w = style.char_width(c);
        if width + w > room + EPSILON {
            break;
        }
        width += w;
        split = i + c.len_utf8();
    }
    if split == 0 && force {
        split = text.chars().next().map_or(0, char::len_utf8);
    }
    (text[..split].to_string(), text[split..].to_string())
}

/// Put as much of the group `start..end` on `line` as fits, splitting a
/// word by characters. Returns the index to continue from.
fn fit_partial(
    pieces: &mut [Piece],
    start: usize,
    end: usize,
    available: f32,
    styles: &[TextStyle],
    line: &mut Line,
) -> usize {
    let mut k = start;
    while k < end {
        if line.width + pieces[k].width <= available + EPSILON {
            line.push(pieces[k].clone());
            k += 1;
            continue;
        }
        let piece = pieces[k].clone();
        match &piece.kind {
            PieceKind::Word(text) => {
                let style = &styles[piece.style];
                let (head, tail) = split_word(text, style, available - line.width, !line.has_content());
                if !head.is_empty() {
                    line.push(Piece {
                        width: style.text_width(&head),
                        kind: PieceKind::Word(head),
                        ..piece.clone()
                    });
                    if tail.is_empty() {
                        k += 1;
                    } else {
                        pieces[k] = Piece {
                            width: style.text_width(&tail),
                            kind: PieceKind::Word(tail),
                            break_before: true,
                            ..piece
                        };
                    }
                }
            }
            _ if !line.has_content() => {
                line.push(piece);
                k += 1;
            }
            _ => {}
        }
        return k;
    }
    k
}

/// Break inline content into lines no wider than `available`.
///
/// A group too wide for an empty line is broken between characters unless
/// `wrap` is [`Wrap::Never`]. Collapsible spaces never start a line.
pub fn break_lines(content: &InlineContent, available: f32, wrap: Wrap) -> Vec<Line> {
    let soft = wrap == Wrap::Soft;
    let mut pieces = content.pieces.clone();
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut i = 0;
    while i < pieces.len() {
        match pieces[i].kind {
            PieceKind::Break => {
                line.ends_with_break = true;
                finish_line(&mut lines, &mut line, true);
                i += 1;
                continue;
            }
            PieceKind::Space { preserved } if soft || !preserved => {
                if preserved || line.has_content() {
                    line.push(pieces[i].clone());
                }
                i += 1;
                continue;
            }
            _ => {}
        }

        let end = group_end(&pieces, i, soft);
        let group_width: f32 = pieces[i..end].iter().map(|p| p.width).sum();
        if wrap == Wrap::Never || line.width + group_width <= available + EPSILON {
            for piece in &pieces[i..end] {
                line.push(piece.clone());
            }
            i = end;
        } else if line.has_content() {
            finish_line(&mut lines, &mut line, false);
        } else {
            i = fit_partial(&mut pieces, i, end, available, &content.styles, &mut line);
            finish_line(&mut lines, &mut line, false);
        }
    }
    finish_line(&mut lines, &mut line, false);
    lines
}

/// Narrowest width the content can take without breaking inside words.
pub fn min_content_width(content: &InlineContent) -> f32 {
    let pieces = &content.pieces;
    let mut widest: f32 = 0.0;
    let mut i = 0;
    while i < pieces.len() {
        if pieces[i].is_space() || matches!(pieces[i].kind, PieceKind::Break) {
            i += 1;
            continue;
        }
        let end = group_end(pieces, i, true);
        widest = widest.max(pieces[i..end].iter().map(|p| p.width).sum());
        i = end;
    }
    widest
}

/// Width of the content laid out without any soft wrapping.
pub fn max_content_width(content: &InlineContent) -> f32 {
    break_lines(content, f32::INFINITY, Wrap::Soft)
        .iter()
        .map(|line| line.width)
        .fold(0.0, f32::max)
}

/// Extents of a line box above and below its baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub above: f32,
    pub below: f32,
}

impl LineMetrics {
    pub fn height(&self) -> f32 {
        self.above + self.below
    }
}

/// Line box size: the container's strut plus every piece on the line, each
/// text style centered in its own line height.
pub fn line_metrics(line: &Line, styles: &[TextStyle], strut: &TextStyle) -> LineMetrics {
    let (mut above, mut below) = strut.half_leading_extents();
    for piece in &line.pieces {
        match &piece.kind {
            PieceKind::Image { height, .. } => above = above.max(*height),
            PieceKind::Word(_) | PieceKind::Space { .. } | PieceKind::Glue => {
                let (a, b) = styles[piece.style].half_leading_extents();
                above = above.max(a);
                below = below.max(b);
            }
            PieceKind::Anchor(_) | PieceKind::Break => {}
        }
    }
    LineMetrics { above, below }
}

/// Output of painting one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaintedLine {
    pub ops: Vec<DrawOp>,
    /// Link index and `[x, y_top, width, height]`.
    pub links: Vec<(usize, [f32; 4])>,
    pub anchors: Vec<String>,
    pub missing_glyphs: usize,
}

fn align_offset(align: TextAlign, available: f32, width: f32) -> f32 {
    let free = (available - width).max(0.0);
    match align {
        TextAlign::Left | TextAlign::Justify => 0.0,
        TextAlign::Center => free / 2.0,
        TextAlign::Right => free,
    }
}

fn flush_run(painted: &mut PaintedLine, run: &mut String, x: f32, baseline: f32, style: &TextStyle, word_spacing: f32) {
    if run.is_empty() {
        return;
    }
    let mut x = x;
    let mut rest = run.as_str();
    while let Some(first) = rest.chars().next() {
        let fallback = style.fallback_glyph(first).is_some();
        let split = rest
            .char_indices()
            .find(|&(_, c)| style.fallback_glyph(c).is_some() != fallback)
            .map_or(rest.len(), |(i, _)| i);
        let (text, tail) = rest.split_at(split);
        rest = tail;

        let (font, bytes, spacing) = if fallback {
            let bytes: Vec<u8> = text
                .chars()
                .filter_map(|c| style.fallback_glyph(c))
                .flat_map(|(_, glyph)| glyph.id.to_be_bytes())
                .collect();
            // Word spacing only applies to single-byte code 32.
            (PdfFont::Fallback, bytes, 0.0)
        } else {
            let (bytes, missing) = encode_winansi(text);
            painted.missing_glyphs += missing;
            (PdfFont::Standard(style.font), bytes, word_spacing)
        };
        painted.ops.push(DrawOp::Text {
            x,
            y: baseline,
            font,
            size: style.size,
            color: style.color,
            bytes,
            word_spacing: spacing,
        });
        x += style.text_width(text) + spacing * text.matches(' ').count() as f32;
    }
    run.clear();
}

/// Paint `line` with its left edge at `x` and baseline at `baseline`.
/// Justified lines stretch their spaces, except the last line and lines
/// ended by a forced break.
pub fn paint_line(
    line: &Line,
    styles: &[TextStyle],
    x: f32,
    baseline: f32,
    available: f32,
    align: TextAlign,
    last_line: bool,
) -> PaintedLine {
    let pieces = &line.pieces;
    let spaces = pieces.iter().filter(|p| p.is_space()).count();
    let justify = align == TextAlign::Justify
        && !last_line
        && !line.ends_with_break
        && spaces > 0
        && line.width < available;
    let word_spacing = if justify { (available - line.width) / spaces as f32 } else { 0.0 };

    let mut painted = PaintedLine::default();
    let mut x = x + align_offset(align, available, line.width);
    let mut i = 0;
    while i < pieces.len() {
        let piece = &pieces[i];
        let style = &styles[piece.style];
        match &piece.kind {
            PieceKind::Image { id, height } => {
                painted.ops.push(DrawOp::Image {
                    x,
                    y: baseline - height,
                    width: piece.width,
                    height: *height,
                    image: *id,
                });
                if let Some(link) = style.link {
                    painted.links.push((link, [x, baseline - height, piece.width, *height]));
                }
                x += piece.width;
                i += 1;
                continue;
            }
            PieceKind::Anchor(name) => {
                painted.anchors.push(name.clone());
                i += 1;
                continue;
            }
            PieceKind::Break => {
                i += 1;
                continue;
            }
            _ => {}
        }

        // A segment: consecutive text pieces sharing one style.
        let mut end = i;
        while end < pieces.len()
            && pieces[end].style == piece.style
            && matches!(pieces[end].kind, PieceKind::Word(_) | PieceKind::Space { .. } | PieceKind::Glue)
        {
            end += 1;
        }
        let segment = &pieces[i..end];
        let (ascent, descent) = (style.ascent(), style.descent());
        let width: f32 = segment
            .iter()
            .map(|p| p.width + if p.is_space() { word_spacing } else { 0.0 })
            .sum();

        if let Some(bg) = style.background {
            painted.ops.push(DrawOp::Rect {
                x,
                y: baseline - ascent - bg.padding_y,
                width,
                height: ascent + descent + 2.0 * bg.padding_y,
                color: bg.color,
                radius: bg.radius,
            });
        }

        let mut run = String::new();
        let mut run_x = x;
        let mut cursor = x;
        let mut text_start = None;
        let mut text_end = x;
        for p in segment {
            match &p.kind {
                PieceKind::Glue => {
                    flush_run(&mut painted, &mut run, run_x, baseline, style, word_spacing);
                    cursor += p.width;
                }
                PieceKind::Word(text) => {
                    if run.is_empty() {
                        run_x = cursor;
                    }
                    run.push_str(text);
                    text_start.get_or_insert(cursor);
                    cursor += p.width;
                    text_end = cursor;
                }
                _ => {
                    if run.is_empty() {
                        run_x = cursor;
                    }
                    run.push(' ');
                    text_start.get_or_insert(cursor);
                    cursor += p.width + word_spacing;
                    text_end = cursor;
                }
            }
        }
        flush_run(&mut painted, &mut run, run_x, baseline, style, word_spacing);

        if let Some(start) = text_start {
            let thickness = (style.size * 0.05).max(0.5);
            let mut decorate = |y: f32| {
                painted.ops.push(DrawOp::Line {
                    x1: start,
                    y1: y,
                    x2: text_end,
                    y2: y,
                    width: thickness,
                    color: style.color,
                    style: BorderStyle::Solid,
                });
            };
            if style.underline {
                decorate(baseline + style.size * 0.1);
            }
            if style.line_through {
                decorate(baseline - style.size * 0.3);
            }
        }
        if let Some(link) = style.link {
            painted.links.push((link, [x, baseline - ascent, width, ascent + descent]));
        }
        x += width;
        i = end;
    }
    painted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(size: f32) -> TextStyle {
        TextStyle {
            font: StandardFont::Courier,
            size,
            color: Color::BLACK,
            line_height: size * 1.2,
            underline: false,
            line_through: false,
            background: None,
            link: None,
            fallback: None,
        }
    }

    /// Courier at 10pt: every character is 6pt wide.
    fn content(text: &str, ws: WhiteSpace) -> InlineContent {
        let mut builder = InlineBuilder::new();
        let s = builder.style(style(10.0));
        builder.push_text(text, s, ws);
        builder.finish()
    }

    fn line_text(line: &Line) -> String {
        line.pieces
            .iter()
            .map(|p| match &p.kind {
                PieceKind::Word(w) => w.clone(),
                PieceKind::Space { .. } => " ".to_string(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn test_collapse_whitespace() {
        let c = content("  hello \n\t world  ", WhiteSpace::Normal);
        let lines = break_lines(&c, 1000.0, Wrap::Soft);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "hello world");
        assert!((lines[0].width - 66.0).abs() < 0.01);
    }

    #[test]
    fn test_greedy_wrapping() {
        let c = content("aaa bbb ccc ddd", WhiteSpace::Normal);
        // "aaa bbb" is 42pt wide.
        let lines = break_lines(&c, 45.0, Wrap::Soft);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["aaa bbb", "ccc ddd"]);
        assert!(lines.iter().all(|l| !l.ends_with_break));
    }

    #[test]
    fn test_long_word_breaks_by_character() {
        let c = content("abcdefghij", WhiteSpace::Normal);
        let lines = break_lines(&c, 25.0, Wrap::Soft);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_preformatted_keeps_spaces_and_newlines() {
        let c = content("fn main() {\n    x\n}\n", WhiteSpace::Pre);
        let lines = break_lines(&c, 1000.0, Wrap::Preformatted);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        // A trailing newline does not open an empty line.
        assert_eq!(texts, vec!["fn main() {", "    x", "}"]);
    }

    #[test]
    fn test_preformatted_blank_lines_survive() {
        let c = content("a\n\nb", WhiteSpace::Pre);
        let lines = break_lines(&c, 1000.0, Wrap::Preformatted);
        assert_eq!(lines.len(), 3);
        assert!(!lines[1].has_content());
    }

    #[test]
    fn test_preformatted_overflow_breaks_by_character() {
        let c = content("0123456789", WhiteSpace::Pre);
        let lines = break_lines(&c, 30.0, Wrap::Preformatted);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["01234", "56789"]);
    }

    #[test]
    fn test_nowrap_overflows_instead_of_breaking() {
        let c = content("aaa bbb ccc", WhiteSpace::NoWrap);
        let lines = break_lines(&c, 30.0, Wrap::Never);
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "aaa bbb ccc");
        assert!((lines[0].width - 66.0).abs() < 0.01);
    }

    #[test]
    fn test_collapsible_space_never_starts_a_line() {
        let piece = |kind, width| Piece { kind, width, style: 0, break_before: false };
        let c = InlineContent {
            pieces: vec![
                piece(PieceKind::Word("one".to_string()), 18.0),
                piece(PieceKind::Break, 0.0),
                piece(PieceKind::Space { preserved: false }, 6.0),
                piece(PieceKind::Word("two".to_string()), 18.0),
            ],
            styles: vec![style(10.0)],
        };
        for wrap in [Wrap::Soft, Wrap::Preformatted, Wrap::Never] {
            let lines = break_lines(&c, 1000.0, wrap);
            let texts: Vec<String> = lines.iter().map(line_text).collect();
            assert_eq!(texts, vec!["one", "two"], "{:?}", wrap);
            assert!((lines[1].width - 18.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_tabs_expand_to_stops() {
        let c = content("ab\tc", WhiteSpace::Pre);
        let lines = break_lines(&c, 1000.0, Wrap::Preformatted);
        assert_eq!(line_text(&lines[0]), "ab      c");
    }

    #[test]
    fn test_pre_line_keeps_newlines_only() {
        let c = content("a   b\nc", WhiteSpace::PreLine);
        let lines = break_lines(&c, 1000.0, Wrap::Soft);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["a b", "c"]);
    }

    #[test]
    fn test_words_across_styles_stay_together() {
        let mut builder = InlineBuilder::new();
        let plain = builder.style(style(10.0));
        let bold = builder.style(TextStyle { font: StandardFont::CourierBold, ..style(10.0) });
        builder.push_text("xx ", plain, WhiteSpace::Normal);
        builder.push_text("bold", bold, WhiteSpace::Normal);
        builder.push_text(", yy", plain, WhiteSpace::Normal);
        let c = builder.finish();
        // "xx bold," does not fit in 40pt; "bold," must move as one.
        let lines = break_lines(&c, 40.0, Wrap::Soft);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["xx", "bold,", "yy"]);
    }

    #[test]
    fn test_break_element() {
        let mut builder = InlineBuilder::new();
        let s = builder.style(style(10.0));
        builder.push_text("one ", s, WhiteSpace::Normal);
        builder.push_break(s);
        builder.push_text(" two", s, WhiteSpace::Normal);
        let lines = break_lines(&builder.finish(), 1000.0, Wrap::Soft);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with_break);
        assert_eq!(line_text(&lines[0]), "one");
        assert_eq!(line_text(&lines[1]), "two");
    }

    #[test]
    fn test_blank_content() {
        assert!(content(" \n ", WhiteSpace::Normal).is_blank());
        assert!(break_lines(&content("   ", WhiteSpace::Normal), 100.0, Wrap::Soft).is_empty());
    }

    #[test]
    fn test_content_widths() {
        let c = content("aa bbbb c", WhiteSpace::Normal);
        assert!((min_content_width(&c) - 24.0).abs() < 0.01);
        assert!((max_content_width(&c) - 54.0).abs() < 0.01);
    }

    #[test]
    fn test_line_metrics_half_leading() {
        let c = content("x", WhiteSpace::Normal);
        let lines = break_lines(&c, 100.0, Wrap::Soft);
        let strut = style(10.0);
        let m = line_metrics(&lines[0], &c.styles, &strut);
        assert!((m.height() - 12.0).abs() < 0.01);
        // Courier ascent 6.29 plus half of the 12 - 7.86 leading.
        assert!((m.above - (6.29 + 2.07)).abs() < 0.01);
    }

    #[test]
    fn test_image_raises_line() {
        let mut builder = InlineBuilder::new();
        let s = builder.style(style(10.0));
        builder.push_text("a", s, WhiteSpace::Normal);
        builder.push_image(0, 50.0, 40.0, s);
        let c = builder.finish();
        let lines = break_lines(&c, 1000.0, Wrap::Soft);
        let m = line_metrics(&lines[0], &c.styles, &style(10.0));
        assert_eq!(m.above, 40.0);
    }

    #[test]
    fn test_image_is_a_break_opportunity() {
        let mut builder = InlineBuilder::new();
        let s = builder.style(style(10.0));
        builder.push_text("aaaa", s, WhiteSpace::Normal);
        builder.push_image(0, 50.0, 40.0, s);
        let lines = break_lines(&builder.finish(), 60.0, Wrap::Soft);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_paint_alignment() {
        let c = content("ab", WhiteSpace::Normal);
        let lines = break_lines(&c, 100.0, Wrap::Soft);
        let painted = paint_line(&lines[0], &c.styles, 10.0, 50.0, 100.0, TextAlign::Right, true);
        match &painted.ops[0] {
            DrawOp::Text { x, y, bytes, .. } => {
                assert!((x - 98.0).abs() < 0.01);
                assert_eq!(*y, 50.0);
                assert_eq!(bytes, b"ab");
            }
            other => panic!("unexpected {:?}", other),
        }
        let centered = paint_line(&lines[0], &c.styles, 0.0, 50.0, 100.0, TextAlign::Center, true);
        assert!(matches!(centered.ops[0], DrawOp::Text { x, .. } if (x - 44.0).abs() < 0.01));
    }

    #[test]
    fn test_paint_justify_uses_word_spacing() {
        let c = content("aa bb cc dd", WhiteSpace::Normal);
        let lines = break_lines(&c, 40.0, Wrap::Soft);
        assert_eq!(lines.len(), 2);
        let first = paint_line(&lines[0], &c.styles, 0.0, 10.0, 40.0, TextAlign::Justify, false);
        match &first.ops[0] {
            DrawOp::Text { word_spacing, .. } => assert!((word_spacing - 10.0).abs() < 0.01),
            other => panic!("unexpected {:?}", other),
        }
        let last = paint_line(&lines[1], &c.styles, 0.0, 10.0, 40.0, TextAlign::Justify, true);
        assert!(matches!(last.ops[0], DrawOp::Text { word_spacing, .. } if word_spacing == 0.0));
    }

    #[test]
    fn test_paint_decorations_links_and_background() {
        let mut builder = InlineBuilder::new();
        let s = builder.style(TextStyle {
            underline: true,
            link: Some(3),
            background: Some(SpanBackground { color: Color::rgb(240, 240, 240), padding_y: 2.0, radius: 3.0 }),
            ..style(10.0)
        });
        builder.push_anchor("here", s);
        builder.push_glue(4.0, s);
        builder.push_text("link", s, WhiteSpace::Normal);
        builder.push_glue(4.0, s);
        let c = builder.finish();
        let lines = break_lines(&c, 100.0, Wrap::Soft);
        let painted = paint_line(&lines[0], &c.styles, 0.0, 20.0, 100.0, TextAlign::Left, true);

        assert_eq!(painted.anchors, vec!["here".to_string()]);
        assert!(matches!(painted.ops[0], DrawOp::Rect { width, .. } if (width - 32.0).abs() < 0.01));
        assert!(matches!(painted.ops[1], DrawOp::Text { x, .. } if (x - 4.0).abs() < 0.01));
        assert!(matches!(painted.ops[2], DrawOp::Line { x1, x2, .. } if x1 == 4.0 && (x2 - 28.0).abs() < 0.01));
        assert_eq!(painted.links.len(), 1);
        assert_eq!(painted.links[0].0, 3);
    }

    #[test]
    fn test_unencodable_characters_are_counted() {
        let c = content("a\u{4e2d}b", WhiteSpace::Normal);
        let lines = break_lines(&c, 100.0, Wrap::Soft);
        let painted = paint_line(&lines[0], &c.styles, 0.0, 10.0, 100.0, TextAlign::Left, true);
        assert_eq!(painted.missing_glyphs, 1);
    }

    #[test]
    fn test_fallback_runs_are_split_out() {
        let needed = crate::fallback_font::uncovered_characters("\u{3a9}");
        let Some(font) = FallbackFont::find_system(&needed) else {
            return;
        };
        let omega = font.glyph('\u{3a9}').unwrap();
        let mut builder = InlineBuilder::new();
        let s = builder.style(TextStyle { fallback: Some(Arc::new(font)), ..style(10.0) });
        builder.push_text("a\u{3a9}b c", s, WhiteSpace::Normal);
        let c = builder.finish();
        let lines = break_lines(&c, 1000.0, Wrap::Soft);
        let painted = paint_line(&lines[0], &c.styles, 0.0, 10.0, 1000.0, TextAlign::Left, true);
        assert_eq!(painted.missing_glyphs, 0);
        let runs: Vec<(PdfFont, Vec<u8>, f32)> = painted
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { font, bytes, x, .. } => Some((*font, bytes.clone(), *x)),
                _ => None,
            })
            .collect();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].0, PdfFont::Standard(StandardFont::Courier));
        assert_eq!(runs[0].1, b"a");
        assert_eq!(runs[1].0, PdfFont::Fallback);
        assert_eq!(runs[1].1, omega.id.to_be_bytes().to_vec());
        assert!((runs[1].2 - 6.0).abs() < 0.01);
        assert_eq!(runs[2].1, b"b c");
        let omega_width = c.styles[s].char_width('\u{3a9}');
        assert!((runs[2].2 - (6.0 + omega_width)).abs() < 0.01);
    }
}
