//! Block layout and pagination.
//!
//! The engine walks the styled tree once, top to bottom, keeping a cursor
//! on the current page. Block boxes stack with collapsing vertical margins;
//! runs of inline children become line boxes; tables are measured, laid out
//! row by row and never split inside a row. Box backgrounds and borders are
//! painted into placeholder groups reserved when a box opens, so they end up
//! beneath the box's content and can be sliced across pages once the box
//! closes.

use crate::cascade::{
    BOTTOM, BorderCollapse, BorderSide, ComputedStyle, Display, LEFT, ListStyleType, PageGeometry, RIGHT, TOP,
};
use crate::dom::{Document, ElementData, NodeData, NodeId};
use crate::fallback_font::FallbackFont;
use crate::fonts::{PdfFont, encode_winansi};
use crate::image::{ImageStore, scale_to_fit};
use crate::inline::{
    InlineBuilder, InlineContent, PaintedLine, PieceKind, SpanBackground, TextStyle, Wrap, break_lines, line_metrics,
    max_content_width, min_content_width, paint_line,
};
use crate::pdf_generator::{Destination, DrawOp, LinkAnnotation, LinkTarget, OutlineEntry, PageCanvas};
use crate::table_renderer::{ColumnContent, DefaultTableRenderer, TableDimensions, TableRenderer};
use crate::units::{BorderStyle, Color, Length, PT_PER_PX};
use std::sync::Arc;

/// Height of the page used for content that is never paginated.
const UNBOUNDED: f32 = 1.0e9;
const FIT_TOLERANCE: f32 = 0.01;

/// Pages and document-level navigation produced by layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutResult {
    pub pages: Vec<PageCanvas>,
    pub destinations: Vec<Destination>,
    pub outline: Vec<OutlineEntry>,
    /// Characters replaced because the standard fonts cannot encode them.
    pub missing_glyphs: usize,
}

/// Lay out a styled document onto pages of the given geometry.
pub fn layout_document(
    doc: &Document,
    styles: &[Option<ComputedStyle>],
    page: PageGeometry,
    images: &mut ImageStore,
    fallback: Option<Arc<FallbackFont>>,
) -> LayoutResult {
    let mut engine = Engine::new(doc, styles, images, fallback, page, true);
    engine.layout_children(Document::ROOT, page.margin[LEFT], page.content_width());
    engine.finish()
}

/// Vertical margins that have met but not yet been applied.
#[derive(Debug, Clone, Copy, Default)]
struct CollapsedMargin {
    positive: f32,
    negative: f32,
}

impl CollapsedMargin {
    fn add(&mut self, margin: f32) {
        if margin > 0.0 {
            self.positive = self.positive.max(margin);
        } else {
            self.negative = self.negative.min(margin);
        }
    }

    fn resolve(&self) -> f32 {
        self.positive + self.negative
    }
}

#[derive(Debug, Clone)]
struct Decoration {
    background: Color,
    border: [BorderSide; 4],
    radius: f32,
}

impl Decoration {
    fn of(style: &ComputedStyle) -> Option<Self> {
        (!style.background_color.is_transparent() || style.has_visible_border()).then(|| Decoration {
            background: style.background_color,
            border: style.border,
            radius: style.border_radius,
        })
    }

    /// Ops for one fragment of the box; edges that continue on another page
    /// get neither border nor rounding.
    fn paint(&self, x: f32, y: f32, width: f32, height: f32, top_edge: bool, bottom_edge: bool) -> Vec<DrawOp> {
        let radius = if top_edge && bottom_edge { self.radius } else { 0.0 };
        let mut ops = Vec::new();
        if !self.background.is_transparent() {
            ops.push(DrawOp::Rect { x, y, width, height, color: self.background, radius });
        }
        ops.extend(border_ops(&self.border, x, y, width, height, radius, top_edge, bottom_edge));
        ops
    }
}

#[allow(clippy::too_many_arguments)]
fn border_ops(
    border: &[BorderSide; 4],
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    radius: f32,
    top_edge: bool,
    bottom_edge: bool,
) -> Vec<DrawOp> {
    let mut ops = Vec::new();
    let first = border[TOP];
    let uniform = border.iter().all(|b| *b == first) && first.used_width() > 0.0;
    if radius > 0.0 && uniform && top_edge && bottom_edge {
        let w = first.width;
        ops.push(DrawOp::RoundedOutline {
            x: x + w / 2.0,
            y: y + w / 2.0,
            width: width - w,
            height: height - w,
            radius: (radius - w / 2.0).max(0.0),
            line_width: w,
            color: first.color,
        });
        return ops;
    }

    for (side, shown) in [(TOP, top_edge), (RIGHT, true), (BOTTOM, bottom_edge), (LEFT, true)] {
        let b = &border[side];
        let w = b.used_width();
        if !shown || w <= 0.0 || b.color.is_transparent() {
            continue;
        }
        let (rx, ry, rw, rh) = match side {
            TOP => (x, y, width, w),
            RIGHT => (x + width - w, y, w, height),
            BOTTOM => (x, y + height - w, width, w),
            _ => (x, y, w, height),
        };
        let horizontal = side == TOP || side == BOTTOM;
        match b.style {
            BorderStyle::Dashed | BorderStyle::Dotted => {
                let (x1, y1, x2, y2) = if horizontal {
                    (rx, ry + rh / 2.0, rx + rw, ry + rh / 2.0)
                } else {
                    (rx + rw / 2.0, ry, rx + rw / 2.0, ry + rh)
                };
                ops.push(DrawOp::Line { x1, y1, x2, y2, width: w, color: b.color, style: b.style });
            }
            BorderStyle::Double if w >= 3.0 => {
                let band = w / 3.0;
                let (inner_x, inner_y) = match side {
                    TOP => (rx, ry + 2.0 * band),
                    RIGHT | BOTTOM => (rx, ry),
                    _ => (rx + 2.0 * band, ry),
                };
                let (outer_x, outer_y) = match side {
                    RIGHT => (rx + 2.0 * band, ry),
                    BOTTOM => (rx, ry + 2.0 * band),
                    _ => (rx, ry),
                };
                let (bw, bh) = if horizontal { (rw, band) } else { (band, rh) };
                for (px, py) in [(inner_x, inner_y), (outer_x, outer_y)] {
                    ops.push(DrawOp::Rect { x: px, y: py, width: bw, height: bh, color: b.color, radius: 0.0 });
                }
            }
            _ => ops.push(DrawOp::Rect { x: rx, y: ry, width: rw, height: rh, color: b.color, radius: 0.0 }),
        }
    }
    ops
}

/// A decorated box whose bottom is not known yet.
struct OpenBox {
    x: f32,
    width: f32,
    /// Page and y of the border-box top, set when content first lands.
    top: Option<(usize, f32)>,
    /// Placeholder groups, one per page the box touches.
    slots: Vec<(usize, usize)>,
    decoration: Decoration,
}

#[derive(Debug, Clone)]
enum MarkerKind {
    Disc,
    Circle,
    Square,
    Text(String),
}

/// A list marker waiting for the first line of its item.
#[derive(Debug, Clone)]
struct Marker {
    node: NodeId,
    kind: MarkerKind,
    style: TextStyle,
    content_x: f32,
}

/// Horizontal box metrics of a block, resolved against its containing width.
#[derive(Debug, Clone, Copy)]
struct BoxMetrics {
    margin: [f32; 4],
    border: [f32; 4],
    padding: [f32; 4],
    content_width: f32,
}

impl BoxMetrics {
    fn border_box_width(&self) -> f32 {
        self.border[LEFT] + self.padding[LEFT] + self.content_width + self.padding[RIGHT] + self.border[RIGHT]
    }
}

/// Content of a table cell laid out on an unbounded page, relative to the
/// cell's content box.
#[derive(Debug, Default)]
struct SubLayout {
    ops: Vec<DrawOp>,
    links: Vec<LinkAnnotation>,
    destinations: Vec<(String, f32)>,
    outline: Vec<(String, u8, f32)>,
    height: f32,
}

struct CellLayout {
    node: NodeId,
    column: usize,
    /// Content-box offsets from the cell's grid rectangle.
    inset: [f32; 4],
    content: SubLayout,
}

struct RowLayout {
    node: NodeId,
    header: bool,
    height: f32,
    cells: Vec<CellLayout>,
}

struct Engine<'a> {
    doc: &'a Document,
    styles: &'a [Option<ComputedStyle>],
    images: &'a mut ImageStore,
    fallback: Option<Arc<FallbackFont>>,
    page: PageGeometry,
    paginate: bool,
    pages: Vec<PageCanvas>,
    cursor: f32,
    /// Nothing has been placed on the current page yet.
    fresh_page: bool,
    /// The current page was started by overflow, so leading margins drop.
    truncate_margins: bool,
    break_pending: bool,
    pending_margin: CollapsedMargin,
    open_boxes: Vec<OpenBox>,
    pending_anchors: Vec<String>,
    pending_headings: Vec<(String, u8)>,
    markers: Vec<Marker>,
    counters: Vec<i32>,
    link_targets: Vec<LinkTarget>,
    destinations: Vec<Destination>,
    outline: Vec<OutlineEntry>,
    missing_glyphs: usize,
}

impl<'a> Engine<'a> {
    fn new(
        doc: &'a Document,
        styles: &'a [Option<ComputedStyle>],
        images: &'a mut ImageStore,
        fallback: Option<Arc<FallbackFont>>,
        page: PageGeometry,
        paginate: bool,
    ) -> Self {
        Self {
            doc,
            styles,
            images,
            fallback,
            page,
            paginate,
            pages: vec![PageCanvas::new()],
            cursor: page.margin[TOP],
            fresh_page: true,
            truncate_margins: false,
            break_pending: false,
            pending_margin: CollapsedMargin::default(),
            open_boxes: Vec::new(),
            pending_anchors: Vec::new(),
            pending_headings: Vec::new(),
            markers: Vec::new(),
            counters: Vec::new(),
            link_targets: Vec::new(),
            destinations: Vec::new(),
            outline: Vec::new(),
            missing_glyphs: 0,
        }
    }

    fn finish(mut self) -> LayoutResult {
        self.resolve_pending_positions();
        LayoutResult {
            pages: self.pages,
            destinations: self.destinations,
            outline: self.outline,
            missing_glyphs: self.missing_glyphs,
        }
    }

    fn style(&self, node: NodeId) -> Option<&'a ComputedStyle> {
        self.styles.get(node).and_then(Option::as_ref)
    }

    fn content_top(&self) -> f32 {
        self.page.margin[TOP]
    }

    fn content_bottom(&self) -> f32 {
        self.page.height - self.page.margin[BOTTOM]
    }

    fn page_index(&self) -> usize {
        self.pages.len() - 1
    }

    fn current_page(&mut self) -> &mut PageCanvas {
        let index = self.page_index();
        &mut self.pages[index]
    }

    fn reserve_slot(&mut self) -> usize {
        let page = self.current_page();
        page.ops.push(DrawOp::Group(Vec::new()));
        page.ops.len() - 1
    }

    fn new_page(&mut self, forced: bool) {
        log::debug!("page {} starts ({})", self.pages.len() + 1, if forced { "forced" } else { "overflow" });
        self.pages.push(PageCanvas::new());
        let page = self.pages.len() - 1;
        for open in &mut self.open_boxes {
            let canvas = &mut self.pages[page];
            canvas.ops.push(DrawOp::Group(Vec::new()));
            open.slots.push((page, canvas.ops.len() - 1));
        }
        self.cursor = self.page.margin[TOP];
        self.fresh_page = true;
        self.truncate_margins = !forced;
    }

    /// Reserve `height` of vertical space for content, applying pending
    /// margins and breaks first. Returns the y of the reserved band.
    fn place(&mut self, height: f32) -> f32 {
        if self.break_pending {
            self.break_pending = false;
            if self.paginate && !self.fresh_page {
                self.new_page(true);
            }
        }
        let mut margin = self.pending_margin.resolve();
        if self.fresh_page && self.truncate_margins {
            margin = 0.0;
        }
        if self.paginate
            && !self.fresh_page
            && self.cursor + margin + height > self.content_bottom() + FIT_TOLERANCE
        {
            self.new_page(false);
            margin = 0.0;
        }
        self.pending_margin = CollapsedMargin::default();
        self.cursor += margin;
        self.fresh_page = false;
        self.resolve_pending_positions();
        let y = self.cursor;
        self.cursor += height;
        y
    }

    /// Pin down everything waiting for the next content position.
    fn resolve_pending_positions(&mut self) {
        let page = self.page_index();
        let y = self.cursor;
        for open in &mut self.open_boxes {
            open.top.get_or_insert((page, y));
        }
        for name in self.pending_anchors.drain(..) {
            self.destinations.push(Destination { name, page, y });
        }
        for (title, level) in self.pending_headings.drain(..) {
            self.outline.push(OutlineEntry { title, level, page, y });
        }
    }

    fn close_box(&mut self, open: OpenBox) {
        let Some((top_page, top_y)) = open.top else {
            return;
        };
        let last_page = self.page_index();
        let bottom_y = self.cursor;
        for &(page, slot) in &open.slots {
            if page < top_page {
                continue;
            }
            let y0 = if page == top_page { top_y } else { self.content_top() };
            let y1 = if page == last_page { bottom_y } else { self.content_bottom() };
            if y1 - y0 <= 0.0 {
                continue;
            }
            let ops = open.decoration.paint(open.x, y0, open.width, y1 - y0, page == top_page, page == last_page);
            self.pages[page].ops[slot] = DrawOp::Group(ops);
        }
    }

    fn box_metrics(&self, style: &ComputedStyle, avail: f32) -> BoxMetrics {
        let border = [TOP, RIGHT, BOTTOM, LEFT].map(|side| style.border_width(side));
        let padding = style.padding.map(|p| p.resolve(avail).max(0.0));
        let mut margin = style.margin.map(|m| m.resolve(avail));
        let inner = border[LEFT] + border[RIGHT] + padding[LEFT] + padding[RIGHT];
        let auto_width = (avail - margin[LEFT] - margin[RIGHT] - inner).max(0.0);

        let mut width = if style.width.is_auto() { auto_width } else { style.width.resolve(avail).max(0.0) };
        if !style.max_width.is_auto() {
            width = width.min(style.max_width.resolve(avail).max(0.0));
        }
        if width < auto_width {
            let free = avail - width - inner;
            match (style.margin[LEFT].is_auto(), style.margin[RIGHT].is_auto()) {
                (true, true) => {
                    margin[LEFT] = (free / 2.0).max(0.0);
                    margin[RIGHT] = margin[LEFT];
                }
                (true, false) => margin[LEFT] = (free - margin[RIGHT]).max(0.0),
                _ => {}
            }
        }
        BoxMetrics { margin, border, padding, content_width: width }
    }

    fn text_style(&self, style: &ComputedStyle, background: Option<SpanBackground>, link: Option<usize>) -> TextStyle {
        TextStyle {
            font: style.font(),
            size: style.font_size,
            color: style.color,
            line_height: style.line_height_pt(),
            underline: style.text_decoration.underline,
            line_through: style.text_decoration.line_through,
            background,
            link,
            fallback: self.fallback.clone(),
        }
    }

    fn is_block_child(&self, node: NodeId) -> bool {
        if self.doc.element(node).is_none() {
            return false;
        }
        match self.style(node) {
            Some(style) if style.display == Display::Inline => self.contains_block(node),
            Some(style) => style.display.is_block_level(),
            None => false,
        }
    }

    fn contains_block(&self, node: NodeId) -> bool {
        self.doc.element_children(node).any(|child| match self.style(child) {
            Some(style) if style.display == Display::None => false,
            Some(style) if style.display.is_block_level() => true,
            _ => self.contains_block(child),
        })
    }

    fn layout_children(&mut self, node: NodeId, x: f32, width: f32) {
        let doc = self.doc;
        let mut run: Vec<NodeId> = Vec::new();
        for &child in doc.children(node) {
            if self.is_block_child(child) {
                self.layout_inline_run(node, &run, x, width);
                run.clear();
                self.layout_block_level(child, x, width);
            } else {
                run.push(child);
            }
        }
        self.layout_inline_run(node, &run, x, width);
    }

    fn layout_block_level(&mut self, node: NodeId, x: f32, avail: f32) {
        match self.style(node).map(|s| s.display) {
            Some(Display::None) | None => {}
            Some(Display::Table) => self.layout_table(node, x, avail),
            Some(_) => self.layout_block(node, x, avail),
        }
    }

    /// Record the element's id and, for headings, its outline entry; both
    /// resolve at the next placed content.
    fn register_position(&mut self, node: NodeId) {
        let Some(element) = self.doc.element(node) else {
            return;
        };
        if let Some(id) = element.id().filter(|id| !id.is_empty()) {
            self.pending_anchors.push(id.to_string());
        }
        let level = match element.name.as_str() {
            "h1" => 1,
            "h2" => 2,
            "h3" => 3,
            "h4" => 4,
            "h5" => 5,
            "h6" => 6,
            _ => return,
        };
        let title = self.doc.text_content(node).split_whitespace().collect::<Vec<_>>().join(" ");
        if !title.is_empty() {
            self.pending_headings.push((title, level));
        }
    }

    fn open_decorated_box(&mut self, style: &ComputedStyle, x: f32, width: f32, top: Option<(usize, f32)>) -> bool {
        let Some(decoration) = Decoration::of(style) else {
            return false;
        };
        let page = self.page_index();
        let slot = self.reserve_slot();
        self.open_boxes.push(OpenBox { x, width, top, slots: vec![(page, slot)], decoration });
        true
    }

    fn close_decorated_box(&mut self, opened: bool) {
        if opened {
            if let Some(open) = self.open_boxes.pop() {
                self.close_box(open);
            }
        }
    }

    fn layout_block(&mut self, node: NodeId, x: f32, avail: f32) {
        let Some(style) = self.style(node) else {
            return;
        };
        if style.break_before {
            self.break_pending = true;
        }
        let metrics = self.box_metrics(style, avail);
        let box_x = x + metrics.margin[LEFT];
        let content_x = box_x + metrics.border[LEFT] + metrics.padding[LEFT];

        self.register_position(node);
        self.pending_margin.add(metrics.margin[TOP]);

        let top_inset = metrics.border[TOP] + metrics.padding[TOP];
        let mut top = None;
        if top_inset > 0.0 {
            let y = self.place(top_inset);
            top = Some((self.page_index(), y));
        }
        let decorated = self.open_decorated_box(style, box_x, metrics.border_box_width(), top);

        let element = self.doc.element(node);
        let is_list = element.is_some_and(|e| matches!(e.name.as_str(), "ul" | "ol" | "menu" | "dir"));
        if is_list {
            let start = element
                .filter(|e| e.name == "ol")
                .and_then(|e| e.attr("start"))
                .and_then(|s| s.trim().parse::<i32>().ok())
                .unwrap_or(1);
            self.counters.push(start);
        }
        if style.display == Display::ListItem {
            self.push_marker(node, style, content_x);
        }

        self.layout_children(node, content_x, metrics.content_width);

        if is_list {
            self.counters.pop();
        }
        if self.markers.iter().any(|m| m.node == node) {
            // An item without lines still shows its marker on an empty line.
            let strut = self.text_style(style, None, None);
            let top = self.place(strut.line_height);
            let baseline = top + (strut.line_height + strut.ascent() - strut.descent()) / 2.0;
            self.paint_markers(baseline);
        }

        let bottom_inset = metrics.padding[BOTTOM] + metrics.border[BOTTOM];
        if bottom_inset > 0.0 {
            self.place(bottom_inset);
        }
        self.close_decorated_box(decorated);
        self.pending_margin.add(metrics.margin[BOTTOM]);
        if style.break_after {
            self.break_pending = true;
        }
    }

    // --- Inline content ---

    fn layout_inline_run(&mut self, container: NodeId, nodes: &[NodeId], x: f32, width: f32) {
        if nodes.is_empty() {
            return;
        }
        let Some(style) = self.style(container) else {
            return;
        };
        let mut builder = InlineBuilder::new();
        for &node in nodes {
            self.collect_inline(node, &mut builder, None, None, width);
        }
        let content = builder.finish();
        if content.is_blank() {
            self.pending_anchors.extend(content.anchors().map(str::to_string));
            return;
        }

        let strut = self.text_style(style, None, None);
        let lines = break_lines(&content, width, Wrap::for_white_space(style.white_space));
        let count = lines.len();
        for (i, line) in lines.iter().enumerate() {
            if !line.has_content() && !line.ends_with_break {
                self.pending_anchors.extend(line.pieces.iter().filter_map(|piece| match &piece.kind {
                    PieceKind::Anchor(name) => Some(name.clone()),
                    _ => None,
                }));
                continue;
            }
            let metrics = line_metrics(line, &content.styles, &strut);
            let top = self.place(metrics.height());
            let baseline = top + metrics.above;
            let painted = paint_line(line, &content.styles, x, baseline, width, style.text_align, i + 1 == count);
            self.paint_markers(baseline);
            self.emit_painted(painted, top);
        }
    }

    fn emit_painted(&mut self, painted: PaintedLine, line_top: f32) {
        self.missing_glyphs += painted.missing_glyphs;
        let page = self.page_index();
        for name in painted.anchors {
            self.destinations.push(Destination { name, page, y: line_top });
        }
        let links: Vec<LinkAnnotation> = painted
            .links
            .into_iter()
            .filter_map(|(index, rect)| {
                self.link_targets.get(index).map(|target| LinkAnnotation { rect, target: target.clone() })
            })
            .collect();
        let canvas = self.current_page();
        canvas.ops.extend(painted.ops);
        canvas.links.extend(links);
    }

    fn register_link(&mut self, href: &str) -> Option<usize> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let target = match href.strip_prefix('#') {
            Some("") => return None,
            Some(fragment) => LinkTarget::Internal(fragment.to_string()),
            None => LinkTarget::Uri(href.to_string()),
        };
        self.link_targets.push(target);
        Some(self.link_targets.len() - 1)
    }

    fn collect_inline(
        &mut self,
        node: NodeId,
        builder: &mut InlineBuilder,
        background: Option<SpanBackground>,
        link: Option<usize>,
        avail: f32,
    ) {
        let doc = self.doc;
        match &doc.node(node).data {
            NodeData::Text(text) => {
                let Some(parent) = doc.parent(node).and_then(|p| self.style(p)) else {
                    return;
                };
                let style = builder.style(self.text_style(parent, background, link));
                builder.push_text(text, style, parent.white_space);
            }
            NodeData::Element(element) => {
                let Some(style) = self.style(node) else {
                    return;
                };
                if style.display == Display::None {
                    return;
                }
                match element.name.as_str() {
                    "br" => {
                        let s = builder.style(self.text_style(style, background, link));
                        builder.push_break(s);
                        return;
                    }
                    "img" => {
                        self.collect_image(element, style, builder, background, link, avail);
                        return;
                    }
                    _ => {}
                }

                let link = match element.attr("href") {
                    Some(href) if element.name == "a" => self.register_link(href).or(link),
                    _ => link,
                };
                let background = if style.background_color.is_transparent() {
                    background
                } else {
                    Some(SpanBackground {
                        color: style.background_color,
                        padding_y: style.padding[TOP].resolve(avail),
                        radius: style.border_radius,
                    })
                };
                let s = builder.style(self.text_style(style, background, link));
                if let Some(id) = element.id().filter(|id| !id.is_empty()) {
                    builder.push_anchor(id, s);
                }
                builder.push_glue(style.padding[LEFT].resolve(avail) + style.border_width(LEFT), s);
                for &child in doc.children(node) {
                    self.collect_inline(child, builder, background, link, avail);
                }
                builder.push_glue(style.padding[RIGHT].resolve(avail) + style.border_width(RIGHT), s);
            }
            NodeData::Document => {}
        }
    }

    fn collect_image(
        &mut self,
        element: &ElementData,
        style: &ComputedStyle,
        builder: &mut InlineBuilder,
        background: Option<SpanBackground>,
        link: Option<usize>,
        avail: f32,
    ) {
        let src = element.attr("src").unwrap_or_default();
        match self.images.load(src) {
            Ok(id) => {
                let (width, height) = self.image_size(id, element, style, avail);
                let s = builder.style(self.text_style(style, None, link));
                builder.push_image(id, width, height, s);
            }
            Err(e) => {
                log::debug!("falling back to alt text for '{}': {:#}", src, e);
                if let Some(alt) = element.attr("alt").filter(|alt| !alt.trim().is_empty()) {
                    let s = builder.style(self.text_style(style, background, link));
                    builder.push_text(alt, s, style.white_space);
                }
            }
        }
    }

    /// Used image size: CSS or attribute dimensions, aspect ratio kept when
    /// only one is given, scaled down to fit the line and the page.
    fn image_size(&self, id: usize, element: &ElementData, style: &ComputedStyle, avail: f32) -> (f32, f32) {
        let Some(image) = self.images.get(id) else {
            return (0.0, 0.0);
        };
        let (natural_w, natural_h) = image.natural_size();
        let attr = |name: &str| {
            element
                .attr(name)
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
                .map(|px| px * PT_PER_PX)
        };
        let width = match style.width {
            Length::Auto => attr("width"),
            w => Some(w.resolve(avail)),
        };
        let height = match style.height {
            Length::Auto | Length::Percent(_) => attr("height"),
            h => Some(h.resolve(0.0)),
        };
        let (w, h) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * natural_h / natural_w.max(f32::EPSILON)),
            (None, Some(h)) => (h * natural_w / natural_h.max(f32::EPSILON), h),
            (None, None) => (natural_w, natural_h),
        };
        let max_width = match style.max_width {
            Length::Auto => avail,
            m => m.resolve(avail).min(avail),
        };
        let max_height = if self.paginate { self.page.content_height() } else { UNBOUNDED };
        scale_to_fit(w, h, max_width, max_height)
    }

    // --- Lists ---

    fn push_marker(&mut self, node: NodeId, style: &ComputedStyle, content_x: f32) {
        let value = self
            .doc
            .element(node)
            .and_then(|e| e.attr("value"))
            .and_then(|v| v.trim().parse::<i32>().ok());
        let number = match self.counters.last_mut() {
            Some(counter) => {
                if let Some(value) = value {
                    *counter = value;
                }
                let n = *counter;
                *counter = counter.saturating_add(1);
                n
            }
            None => value.unwrap_or(1),
        };
        let kind = match style.list_style_type {
            ListStyleType::None => return,
            ListStyleType::Disc => MarkerKind::Disc,
            ListStyleType::Circle => MarkerKind::Circle,
            ListStyleType::Square => MarkerKind::Square,
            other => MarkerKind::Text(format!("{}.", format_counter(number, other))),
        };
        let style = self.text_style(style, None, None);
        let style = TextStyle { underline: false, line_through: false, ..style };
        self.markers.push(Marker { node, kind, style, content_x });
    }

    fn paint_markers(&mut self, baseline: f32) {
        if self.markers.is_empty() {
            return;
        }
        let markers = std::mem::take(&mut self.markers);
        for marker in markers {
            let size = marker.style.size;
            let color = marker.style.color;
            let cx = marker.content_x - size * 0.55;
            let cy = baseline - size * 0.3;
            let op = match &marker.kind {
                MarkerKind::Disc => DrawOp::Circle { cx, cy, r: size * 0.17, color, filled: true },
                MarkerKind::Circle => DrawOp::Circle { cx, cy, r: size * 0.17, color, filled: false },
                MarkerKind::Square => {
                    let half = size * 0.15;
                    let side = 2.0 * half;
                    DrawOp::Rect { x: cx - half, y: cy - half, width: side, height: side, color, radius: 0.0 }
                }
                MarkerKind::Text(text) => {
                    let (bytes, missing) = encode_winansi(text);
                    self.missing_glyphs += missing;
                    DrawOp::Text {
                        x: marker.content_x - marker.style.text_width(text) - size * 0.3,
                        y: baseline,
                        font: PdfFont::Standard(marker.style.font),
                        size,
                        color,
                        bytes,
                        word_spacing: 0.0,
                    }
                }
            };
            self.current_page().ops.push(op);
        }
    }

    // --- Tables ---

    /// Lay out `node`'s children on an unbounded page of width `width`.
    fn layout_sub(&mut self, node: NodeId, width: f32) -> SubLayout {
        let geometry = PageGeometry { width, height: UNBOUNDED, margin: [0.0; 4] };
        let fallback = self.fallback.clone();
        let mut sub = Engine::new(self.doc, self.styles, &mut *self.images, fallback, geometry, false);
        sub.layout_children(node, 0.0, width);
        let height = sub.cursor + sub.pending_margin.resolve().max(0.0);
        let result = sub.finish();
        self.missing_glyphs += result.missing_glyphs;

        let mut layout = SubLayout { height, ..SubLayout::default() };
        for page in result.pages {
            layout.ops.extend(page.ops);
            layout.links.extend(page.links);
        }
        layout.destinations = result.destinations.into_iter().map(|d| (d.name, d.y)).collect();
        layout.outline = result.outline.into_iter().map(|o| (o.title, o.level, o.y)).collect();
        layout
    }

    /// Min- and max-content width of everything inside `node`.
    fn measure(&mut self, node: NodeId) -> (f32, f32) {
        let mut builder = InlineBuilder::new();
        self.collect_measure(node, &mut builder);
        let content: InlineContent = builder.finish();
        (min_content_width(&content), max_content_width(&content))
    }

    fn collect_measure(&mut self, node: NodeId, builder: &mut InlineBuilder) {
        let doc = self.doc;
        let avail = self.page.content_width();
        for &child in doc.children(node) {
            if self.is_block_child(child) {
                let Some(style) = self.style(child) else {
                    continue;
                };
                let s = builder.style(self.text_style(style, None, None));
                builder.push_break(s);
                self.collect_measure(child, builder);
                builder.push_break(s);
            } else {
                self.collect_inline(child, builder, None, None, avail);
            }
        }
    }

    fn table_rows(&self, table: NodeId) -> (Vec<NodeId>, Vec<(NodeId, bool)>) {
        let mut captions = Vec::new();
        let mut header = Vec::new();
        let mut body = Vec::new();
        let mut footer = Vec::new();
        let rows_of = |group: NodeId| -> Vec<NodeId> {
            self.doc
                .element_children(group)
                .filter(|&row| self.style(row).is_some_and(|s| s.display == Display::TableRow))
                .collect()
        };
        for child in self.doc.element_children(table) {
            let Some(style) = self.style(child) else {
                continue;
            };
            match style.display {
                Display::TableHeaderGroup => header.extend(rows_of(child)),
                Display::TableRowGroup => body.extend(rows_of(child)),
                Display::TableFooterGroup => footer.extend(rows_of(child)),
                Display::TableRow => body.push(child),
                Display::None => {}
                _ if self.doc.tag_name(child) == Some("caption") => captions.push(child),
                _ => {}
            }
        }
        let rows = header
            .into_iter()
            .map(|r| (r, true))
            .chain(body.into_iter().chain(footer).map(|r| (r, false)))
            .collect();
        (captions, rows)
    }

    fn row_cells(&self, row: NodeId) -> Vec<NodeId> {
        self.doc
            .element_children(row)
            .filter(|&cell| self.style(cell).is_some_and(|s| s.display == Display::TableCell))
            .collect()
    }

    fn cell_inset(style: &ComputedStyle, width: f32, collapse: bool) -> [f32; 4] {
        let share = if collapse { 0.5 } else { 1.0 };
        [TOP, RIGHT, BOTTOM, LEFT].map(|side| style.border_width(side) * share + style.padding[side].resolve(width))
    }

    fn layout_table(&mut self, node: NodeId, x: f32, avail: f32) {
        let Some(style) = self.style(node) else {
            return;
        };
        if style.break_before {
            self.break_pending = true;
        }
        let collapse = style.border_collapse == BorderCollapse::Collapse;
        let spacing = if collapse { 0.0 } else { style.border_spacing };
        let border = [TOP, RIGHT, BOTTOM, LEFT].map(|side| style.border_width(side));
        let padding = if collapse { [0.0; 4] } else { style.padding.map(|p| p.resolve(avail)) };
        let margin = style.margin.map(|m| m.resolve(avail));
        let inset_x = border[LEFT] + padding[LEFT] + padding[RIGHT] + border[RIGHT];
        let room = (avail - margin[LEFT] - margin[RIGHT]).max(0.0);

        let (captions, rows) = self.table_rows(node);
        let grid: Vec<Vec<NodeId>> = rows.iter().map(|&(row, _)| self.row_cells(row)).collect();
        let num_cols = grid.iter().map(Vec::len).max().unwrap_or(0);

        let mut columns = vec![ColumnContent::default(); num_cols];
        for cells in &grid {
            for (column, &cell) in cells.iter().enumerate() {
                let Some(cell_style) = self.style(cell) else {
                    continue;
                };
                let inset = Self::cell_inset(cell_style, 0.0, collapse);
                let extra = inset[LEFT] + inset[RIGHT];
                let (min, max) = self.measure(cell);
                columns[column].include(min + extra, max + extra);
            }
        }
        let specified = match style.width {
            Length::Auto => None,
            width => Some((width.resolve(avail) - inset_x).max(0.0)),
        };
        let dims: TableDimensions =
            DefaultTableRenderer.calculate_dimensions(&columns, room - inset_x, specified, spacing);
        let table_width = dims.total_width + inset_x;

        let mut box_x = x + margin[LEFT];
        if style.margin[LEFT].is_auto() && style.margin[RIGHT].is_auto() {
            box_x = x + ((avail - table_width) / 2.0).max(0.0);
        }
        let content_x = box_x + border[LEFT] + padding[LEFT];
        let mut column_x = Vec::with_capacity(num_cols);
        let mut cx = content_x + spacing;
        for width in &dims.column_widths {
            column_x.push(cx);
            cx += width + spacing;
        }

        let renderer = DefaultTableRenderer;
        let mut laid_out = Vec::with_capacity(rows.len());
        for (&(row, header), cells) in rows.iter().zip(&grid) {
            let mut row_layout = RowLayout { node: row, header, height: 0.0, cells: Vec::new() };
            for (column, &cell) in cells.iter().enumerate() {
                let Some(cell_style) = self.style(cell) else {
                    continue;
                };
                let width = dims.column_widths[column];
                let inset = Self::cell_inset(cell_style, width, collapse);
                let content_width = (width - inset[LEFT] - inset[RIGHT]).max(1.0);
                let content = self.layout_sub(cell, content_width);
                row_layout.height = row_layout.height.max(content.height + inset[TOP] + inset[BOTTOM]);
                row_layout.cells.push(CellLayout { node: cell, column, inset, content });
            }
            laid_out.push(row_layout);
        }

        self.register_position(node);
        self.pending_margin.add(margin[TOP]);
        for caption in captions {
            self.layout_block(caption, box_x, table_width);
        }
        let top_inset = border[TOP] + padding[TOP];
        let mut top = None;
        if top_inset > 0.0 {
            let y = self.place(top_inset);
            top = Some((self.page_index(), y));
        }
        let decorated = self.open_decorated_box(style, box_x, table_width, top);

        let header_rows: Vec<usize> = laid_out.iter().enumerate().filter(|(_, r)| r.header).map(|(i, _)| i).collect();
        for row in &laid_out {
            let needed = self.pending_margin.resolve() + spacing + row.height;
            if self.paginate && !self.fresh_page && self.cursor + needed > self.content_bottom() + FIT_TOLERANCE {
                self.new_page(false);
                if !row.header {
                    for &h in &header_rows {
                        self.emit_row(&laid_out[h], &column_x, &dims, spacing, collapse, false, &renderer);
                    }
                }
            }
            self.emit_row(row, &column_x, &dims, spacing, collapse, true, &renderer);
        }
        if spacing > 0.0 && !laid_out.is_empty() {
            self.place(spacing);
        }

        let bottom_inset = padding[BOTTOM] + border[BOTTOM];
        if bottom_inset > 0.0 {
            self.place(bottom_inset);
        }
        self.close_decorated_box(decorated);
        self.pending_margin.add(margin[BOTTOM]);
        if style.break_after {
            self.break_pending = true;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_row(
        &mut self,
        row: &RowLayout,
        column_x: &[f32],
        dims: &TableDimensions,
        spacing: f32,
        collapse: bool,
        first_time: bool,
        renderer: &dyn TableRenderer,
    ) {
        if spacing > 0.0 {
            self.place(spacing);
        }
        let y = self.place(row.height);
        let page = self.page_index();
        let mut ops = Vec::new();
        let mut links = Vec::new();

        if let (Some(style), Some(first), Some(last)) = (self.style(row.node), row.cells.first(), row.cells.last()) {
            if !style.background_color.is_transparent() {
                let x0 = column_x[first.column];
                let x1 = column_x[last.column] + dims.column_widths[last.column];
                let color = style.background_color;
                ops.push(DrawOp::Rect { x: x0, y, width: x1 - x0, height: row.height, color, radius: 0.0 });
            }
        }
        if first_time {
            if let Some(id) = self.doc.element(row.node).and_then(|e| e.id()) {
                self.destinations.push(Destination { name: id.to_string(), page, y });
            }
        }

        for cell in &row.cells {
            let Some(style) = self.style(cell.node) else {
                continue;
            };
            let x = column_x[cell.column];
            let width = dims.column_widths[cell.column];
            if !style.background_color.is_transparent() {
                ops.push(DrawOp::Rect { x, y, width, height: row.height, color: style.background_color, radius: 0.0 });
            }
            let half = |side: usize| if collapse { style.border_width(side) / 2.0 } else { 0.0 };
            ops.extend(border_ops(
                &style.border,
                x - half(LEFT),
                y - half(TOP),
                width + half(LEFT) + half(RIGHT),
                row.height + half(TOP) + half(BOTTOM),
                0.0,
                true,
                true,
            ));

            let inner_height = row.height - cell.inset[TOP] - cell.inset[BOTTOM];
            let dx = x + cell.inset[LEFT];
            let dy = y + cell.inset[TOP] + renderer.cell_offset(inner_height, cell.content.height);
            for op in &cell.content.ops {
                let mut op = op.clone();
                op.translate(dx, dy);
                ops.push(op);
            }
            for link in &cell.content.links {
                let mut link = link.clone();
                link.translate(dx, dy);
                links.push(link);
            }
            if first_time {
                if let Some(id) = self.doc.element(cell.node).and_then(|e| e.id()) {
                    self.destinations.push(Destination { name: id.to_string(), page, y });
                }
                for (name, dest_y) in &cell.content.destinations {
                    self.destinations.push(Destination { name: name.clone(), page, y: dest_y + dy });
                }
                for (title, level, entry_y) in &cell.content.outline {
                    self.outline.push(OutlineEntry { title: title.clone(), level: *level, page, y: entry_y + dy });
                }
            }
        }

        let canvas = self.current_page();
        canvas.ops.extend(ops);
        canvas.links.extend(links);
    }
}

/// Marker text for `number` in the given numbering style.
pub fn format_counter(number: i32, style: ListStyleType) -> String {
    match style {
        ListStyleType::DecimalLeadingZero if (0..10).contains(&number) => format!("0{}", number),
        ListStyleType::LowerAlpha if number > 0 => alphabetic(number),
        ListStyleType::UpperAlpha if number > 0 => alphabetic(number).to_ascii_uppercase(),
        ListStyleType::LowerRoman if (1..4000).contains(&number) => roman(number),
        ListStyleType::UpperRoman if (1..4000).contains(&number) => roman(number).to_ascii_uppercase(),
        _ => number.to_string(),
    }
}

fn alphabetic(mut n: i32) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn roman(mut n: i32) -> String {
    const NUMERALS: [(i32, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{Cascade, Origin, UA_STYLESHEET};
    use crate::css::Stylesheet;

    const BASE_CSS: &str = "body { margin: 0; font: 10pt/12pt Helvetica, sans-serif } p { margin: 0 }";

    fn lay_out(body: &str, css: &str) -> (LayoutResult, PageGeometry) {
        let doc = Document::parse(&format!("<html><body>{}</body></html>", body));
        let mut cascade = Cascade::new();
        cascade.add_stylesheet(&Stylesheet::parse(UA_STYLESHEET), Origin::UserAgent);
        let mut page = PageGeometry::a4();
        for text in [BASE_CSS, css] {
            let sheet = Stylesheet::parse(text);
            page.apply(&sheet.page_declarations);
            cascade.add_stylesheet(&sheet, Origin::Author);
        }
        let styles = cascade.compute(&doc);
        let mut images = ImageStore::new(".");
        (layout_document(&doc, &styles, page, &mut images, None), page)
    }

    fn flatten(ops: &[DrawOp]) -> Vec<&DrawOp> {
        let mut out = Vec::new();
        for op in ops {
            match op {
                DrawOp::Group(inner) => out.extend(flatten(inner)),
                op => out.push(op),
            }
        }
        out
    }

    /// Text runs on a page with their baselines.
    fn texts(result: &LayoutResult, page: usize) -> Vec<(String, f32)> {
        flatten(&result.pages[page].ops)
            .into_iter()
            .filter_map(|op| match op {
                DrawOp::Text { bytes, y, .. } => Some((String::from_utf8_lossy(bytes).into_owned(), *y)),
                _ => None,
            })
            .collect()
    }

    fn all_text(result: &LayoutResult) -> Vec<String> {
        (0..result.pages.len()).flat_map(|p| texts(result, p)).map(|(t, _)| t).collect()
    }

    #[test]
    fn test_single_paragraph() {
        let (result, page) = lay_out("<p>Hello world</p>", "");
        assert_eq!(result.pages.len(), 1);
        let found = texts(&result, 0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "Hello world");
        // 12pt line box, 10pt Helvetica: baseline sits at half-leading plus ascent.
        let expected = page.margin[TOP] + (12.0 - 9.25) / 2.0 + 7.18;
        assert!((found[0].1 - expected).abs() < 0.01);
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let (result, _) = lay_out("", "");
        assert_eq!(result.pages.len(), 1);
        assert!(all_text(&result).is_empty());
    }

    #[test]
    fn test_sibling_margins_collapse() {
        let (result, _) = lay_out("<p>a</p><p>b</p>", "p { margin: 10pt 0 }");
        let found = texts(&result, 0);
        assert!((found[1].1 - found[0].1 - 22.0).abs() < 0.01);
    }

    #[test]
    fn test_long_document_paginates_within_content_area() {
        let body: String = (0..200).map(|i| format!("<p>Paragraph number {}</p>", i)).collect();
        let (result, page) = lay_out(&body, "");
        assert!(result.pages.len() > 1);
        let bottom = page.height - page.margin[BOTTOM];
        for index in 0..result.pages.len() {
            for (_, y) in texts(&result, index) {
                assert!(y <= bottom && y >= page.margin[TOP]);
            }
        }
        assert_eq!(all_text(&result).len(), 200);
        // Continuation pages start at the top margin without a leading gap.
        let first_on_second = texts(&result, 1)[0].1;
        assert!(first_on_second < page.margin[TOP] + 12.0);
    }

    #[test]
    fn test_forced_page_break() {
        let (result, _) = lay_out("<p>a</p><p style=\"page-break-before: always\">b</p><p>c</p>", "");
        assert_eq!(result.pages.len(), 2);
        assert_eq!(texts(&result, 1).iter().map(|t| t.0.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);

        let (result, _) = lay_out("<p style=\"break-after: page\">a</p><p>b</p>", "");
        assert_eq!(result.pages.len(), 2);
        // A break after the last block does not add a blank page.
        let (result, _) = lay_out("<p>a</p><p style=\"break-after: page\">b</p>", "");
        assert_eq!(result.pages.len(), 1);
    }

    #[test]
    fn test_text_wraps_to_content_width() {
        let words = "lorem ipsum dolor sit amet ".repeat(40);
        let (result, page) = lay_out(&format!("<p>{}</p>", words), "");
        let lines = texts(&result, 0);
        assert!(lines.len() > 3);
        for op in flatten(&result.pages[0].ops) {
            if let DrawOp::Text { x, font: PdfFont::Standard(font), size, bytes, .. } = op {
                let width = font.text_width(&String::from_utf8_lossy(bytes), *size);
                assert!(x + width <= page.width - page.margin[RIGHT] + 0.1);
            }
        }
    }

    #[test]
    fn test_background_and_border_beneath_content() {
        let (result, _) = lay_out("<div style=\"background: #eee; border: 1pt solid red; padding: 4pt\">x</div>", "");
        let ops = &result.pages[0].ops;
        assert!(matches!(&ops[0], DrawOp::Group(inner) if !inner.is_empty()));
        let flat = flatten(ops);
        let rect_index = flat.iter().position(|op| matches!(op, DrawOp::Rect { .. })).unwrap();
        let text_index = flat.iter().position(|op| matches!(op, DrawOp::Text { .. })).unwrap();
        assert!(rect_index < text_index);
        match flat[rect_index] {
            DrawOp::Rect { height, .. } => assert!((height - (12.0 + 8.0 + 2.0)).abs() < 0.01),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_box_decoration_sliced_across_pages() {
        let code: String = (0..120).map(|i| format!("line {}\n", i)).collect();
        let html = format!("<pre style=\"background: #f6f8fa\">{}</pre>", code);
        let (result, _) = lay_out(&html, "");
        assert!(result.pages.len() >= 2);
        for page in &result.pages {
            let has_background = flatten(&page.ops).iter().any(
                |op| matches!(op, DrawOp::Rect { color, .. } if *color == Color::rgb(0xf6, 0xf8, 0xfa)),
            );
            assert!(has_background);
        }
    }

    #[test]
    fn test_auto_margins_center_block() {
        let (result, page) = lay_out("<div style=\"width: 100pt; margin: 0 auto; background: red\">x</div>", "");
        let flat = flatten(&result.pages[0].ops);
        let rect = flat.iter().find_map(|op| match op {
            DrawOp::Rect { x, width, .. } => Some((*x, *width)),
            _ => None,
        });
        let (x, width) = rect.unwrap();
        assert!((width - 100.0).abs() < 0.01);
        let expected = page.margin[LEFT] + (page.content_width() - 100.0) / 2.0;
        assert!((x - expected).abs() < 0.01);
    }

    #[test]
    fn test_unordered_list_markers() {
        let (result, _) = lay_out("<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul>", "");
        let flat = flatten(&result.pages[0].ops);
        let filled = flat.iter().filter(|op| matches!(op, DrawOp::Circle { filled: true, .. })).count();
        let hollow = flat.iter().filter(|op| matches!(op, DrawOp::Circle { filled: false, .. })).count();
        assert_eq!((filled, hollow), (2, 1));
    }

    #[test]
    fn test_ordered_list_start_and_value() {
        let (result, _) = lay_out("<ol start=\"3\"><li>a</li><li>b</li><li value=\"10\">c</li><li>d</li></ol>", "");
        let markers: Vec<String> =
            all_text(&result).into_iter().filter(|t| t.ends_with('.')).collect();
        assert_eq!(markers, vec!["3.", "4.", "10.", "11."]);
    }

    #[test]
    fn test_list_counter_saturates_at_max() {
        let (result, _) = lay_out("<ol start=\"2147483647\"><li>a</li><li>b</li></ol>", "");
        let markers: Vec<String> = all_text(&result).into_iter().filter(|t| t.ends_with('.')).collect();
        assert_eq!(markers, vec!["2147483647.", "2147483647."]);

        let (result, _) = lay_out("<ol><li value=\"2147483647\">a</li><li>b</li></ol>", "");
        let markers: Vec<String> = all_text(&result).into_iter().filter(|t| t.ends_with('.')).collect();
        assert_eq!(markers, vec!["2147483647.", "2147483647."]);
    }

    #[test]
    fn test_list_style_types() {
        let (result, _) = lay_out("<ol style=\"list-style-type: upper-roman\"><li>a</li><li>b</li></ol>", "");
        assert!(all_text(&result).contains(&"II.".to_string()));
        let (result, _) = lay_out("<ul style=\"list-style: none\"><li>a</li></ul>", "");
        assert!(!flatten(&result.pages[0].ops).iter().any(|op| matches!(op, DrawOp::Circle { .. })));
    }

    #[test]
    fn test_format_counter() {
        assert_eq!(format_counter(4, ListStyleType::LowerRoman), "iv");
        assert_eq!(format_counter(1994, ListStyleType::UpperRoman), "MCMXCIV");
        assert_eq!(format_counter(28, ListStyleType::LowerAlpha), "ab");
        assert_eq!(format_counter(3, ListStyleType::DecimalLeadingZero), "03");
        assert_eq!(format_counter(-2, ListStyleType::LowerAlpha), "-2");
    }

    #[test]
    fn test_links_destinations_and_outline() {
        let html = "<p><a href=\"https://example.com\">ext</a> <a href=\"#part\">int</a></p>\
                    <h2 id=\"part\">Part  Two</h2><p id=\"\">x</p>";
        let (result, _) = lay_out(html, "");
        let links = &result.pages[0].links;
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, LinkTarget::Uri("https://example.com".to_string()));
        assert_eq!(links[1].target, LinkTarget::Internal("part".to_string()));
        assert!(result.destinations.iter().any(|d| d.name == "part"));
        assert_eq!(result.outline.len(), 1);
        assert_eq!(result.outline[0].title, "Part Two");
        assert_eq!(result.outline[0].level, 2);
    }

    #[test]
    fn test_inline_code_background() {
        let (result, _) = lay_out(
            "<p>use <code>cargo</code> now</p>",
            "code { background-color: #f6f8fa; padding: 0.2em 0.4em; border-radius: 3px }",
        );
        let flat = flatten(&result.pages[0].ops);
        assert!(flat.iter().any(|op| matches!(op, DrawOp::Rect { radius, .. } if *radius > 0.0)));
        let runs: Vec<String> = texts(&result, 0).into_iter().map(|t| t.0).collect();
        assert!(runs.contains(&"cargo".to_string()));
    }

    #[test]
    fn test_missing_image_renders_alt_text() {
        let (result, _) = lay_out("<p><img src=\"does-not-exist.png\" alt=\"A diagram\"></p>", "");
        assert!(all_text(&result).contains(&"A diagram".to_string()));
    }

    #[test]
    fn test_unencodable_characters_counted() {
        let (result, _) = lay_out("<p>日本</p>", "");
        assert_eq!(result.missing_glyphs, 2);
    }

    #[test]
    fn test_table_rows_and_zebra() {
        let html = "<table><thead><tr><th>Name</th><th>Value</th></tr></thead>\
                    <tbody><tr><td>a</td><td>1</td></tr><tr><td>b</td><td>2</td></tr></tbody></table>";
        let css = "table { border-collapse: collapse; width: 100% } td, th { border: 1px solid #ccc; padding: 2pt }\
                   tr:nth-child(2n) { background-color: #eee }";
        let (result, page) = lay_out(html, css);
        let found = texts(&result, 0);
        let names: Vec<&str> = found.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(names, vec!["Name", "Value", "a", "1", "b", "2"]);
        // Rows stack downwards and cells of a row share a baseline.
        assert_eq!(found[0].1, found[1].1);
        assert!(found[2].1 > found[0].1 && found[4].1 > found[2].1);
        let flat = flatten(&result.pages[0].ops);
        let zebra: Vec<(f32, f32)> = flat
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect { x, width, color, .. } if *color == Color::rgb(0xee, 0xee, 0xee) => Some((*x, *width)),
                _ => None,
            })
            .collect();
        assert_eq!(zebra.len(), 1);
        assert!((zebra[0].0 - page.margin[LEFT]).abs() < 0.01);
        assert!((zebra[0].1 - page.content_width()).abs() < 0.01);
    }

    #[test]
    fn test_table_header_repeats_after_page_break() {
        let rows: String = (0..150).map(|i| format!("<tr><td>row {}</td></tr>", i)).collect();
        let html = format!("<table><thead><tr><th>Heading</th></tr></thead><tbody>{}</tbody></table>", rows);
        let (result, _) = lay_out(&html, "");
        assert!(result.pages.len() >= 2);
        for index in 0..result.pages.len() {
            let page_texts = texts(&result, index);
            assert_eq!(page_texts[0].0, "Heading");
        }
        let body_rows = all_text(&result).iter().filter(|t| t.starts_with("row")).count();
        assert_eq!(body_rows, 150);
    }

    #[test]
    fn test_table_cell_alignment() {
        let html = "<table style=\"width: 200pt; border-spacing: 0\"><tr>\
                    <td style=\"text-align: right; padding: 0\">r</td></tr></table>";
        let (result, page) = lay_out(html, "");
        let op = flatten(&result.pages[0].ops)
            .into_iter()
            .find(|op| matches!(op, DrawOp::Text { .. }))
            .cloned();
        match op {
            Some(DrawOp::Text { x, font: PdfFont::Standard(font), size, .. }) => {
                let right = x + font.text_width("r", size);
                assert!((right - (page.margin[LEFT] + 200.0)).abs() < 0.01);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_justified_lines_fill_width() {
        let words = "aa bbb cccc d ".repeat(30);
        let (result, _) = lay_out(&format!("<p style=\"text-align: justify\">{}</p>", words), "");
        let flat = flatten(&result.pages[0].ops);
        let spacings: Vec<f32> = flat
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { word_spacing, .. } => Some(*word_spacing),
                _ => None,
            })
            .collect();
        assert!(spacings.len() > 2);
        assert!(spacings[..spacings.len() - 1].iter().all(|s| *s >= 0.0));
        assert_eq!(*spacings.last().unwrap(), 0.0);
    }

    #[test]
    fn test_display_none_is_skipped() {
        let (result, _) = lay_out("<p>shown</p><p style=\"display: none\">hidden</p><script>x()</script>", "");
        assert_eq!(all_text(&result), vec!["shown".to_string()]);
    }
}
