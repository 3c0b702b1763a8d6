//! PDF serialization: the object table, page content streams, fonts,
//! images, link annotations, named destinations and the outline.
//!
//! Layout hands over pages as lists of [`DrawOp`]s in a top-down coordinate
//! system (origin at the top-left corner of the page, y growing downwards);
//! everything here flips to PDF user space.
//!
//! Text in the standard fonts is WinAnsi bytes. Text in the fallback face
//! is two-byte glyph ids under `Identity-H`, with a `ToUnicode` map so it
//! can still be searched and copied.

use crate::cascade::PageGeometry;
use crate::compression::{compress_deflate, encode_hex_string};
use crate::fallback_font::FallbackFont;
use crate::fonts::{PdfFont, pdf_literal};
use crate::image::{ImageStore, create_image_content_stream};
use crate::units::{BorderStyle, Color};
use std::collections::{BTreeMap, BTreeSet};

pub const PRODUCER: &str = concat!("md2pdf ", env!("CARGO_PKG_VERSION"));

/// Bezier control distance for a quarter circle of radius 1.
const KAPPA: f32 = 0.552_284_8;

/// One painting operation. Coordinates are points from the top-left corner
/// of the page; `Rect::y` is the top edge and `Text::y` the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
        radius: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Color,
        style: BorderStyle,
    },
    /// Stroked rounded rectangle, centered on the given edges.
    RoundedOutline {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
        line_width: f32,
        color: Color,
    },
    Circle {
        cx: f32,
        cy: f32,
        r: f32,
        color: Color,
        filled: bool,
    },
    Text {
        x: f32,
        y: f32,
        font: PdfFont,
        size: f32,
        color: Color,
        bytes: Vec<u8>,
        word_spacing: f32,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image: usize,
    },
    /// Ops painted together; also used as a placeholder that is filled in
    /// once a box's extent is known.
    Group(Vec<DrawOp>),
}

impl DrawOp {
    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            DrawOp::Rect { x, y, .. }
            | DrawOp::RoundedOutline { x, y, .. }
            | DrawOp::Text { x, y, .. }
            | DrawOp::Image { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
            DrawOp::Line { x1, y1, x2, y2, .. } => {
                *x1 += dx;
                *x2 += dx;
                *y1 += dy;
                *y2 += dy;
            }
            DrawOp::Circle { cx, cy, .. } => {
                *cx += dx;
                *cy += dy;
            }
            DrawOp::Group(ops) => ops.iter_mut().for_each(|op| op.translate(dx, dy)),
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a DrawOp)) {
        match self {
            DrawOp::Group(ops) => {
                for op in ops {
                    op.visit(&mut *f);
                }
            }
            op => f(op),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Uri(String),
    /// Fragment link to an element id in the same document.
    Internal(String),
}

/// A clickable area; `rect` is `[x, y_top, width, height]` in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkAnnotation {
    pub rect: [f32; 4],
    pub target: LinkTarget,
}

impl LinkAnnotation {
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.rect[0] += dx;
        self.rect[1] += dy;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageCanvas {
    pub ops: Vec<DrawOp>,
    pub links: Vec<LinkAnnotation>,
}

impl PageCanvas {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Position of an element id.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub name: String,
    pub page: usize,
    pub y: f32,
}

/// A heading in the document outline.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    pub level: u8,
    pub page: usize,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
}

// --- Low-level PDF object model ---

pub struct PdfGenerator {
    pub objects: Vec<Option<PdfObj>>,
    pub next_id: u32,
}

#[derive(Debug)]
pub struct PdfObj {
    pub id: u32,
    pub generation: u32,
    pub content: String,
    pub is_stream: bool,
    pub stream_data: Option<Vec<u8>>,
}

impl Default for PdfGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfGenerator {
    pub fn new() -> Self {
        PdfGenerator {
            objects: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate an object number to be filled in later with [`set_object`].
    ///
    /// [`set_object`]: PdfGenerator::set_object
    pub fn reserve(&mut self) -> u32 {
        let id = self.next_id;
        self.objects.push(None);
        self.next_id += 1;
        id
    }

    pub fn set_object(&mut self, id: u32, content: String) {
        self.put(id, content, None);
    }

    pub fn add_object(&mut self, content: String) -> u32 {
        let id = self.reserve();
        self.put(id, content, None);
        id
    }

    pub fn add_stream_object(&mut self, dictionary: String, data: Vec<u8>) -> u32 {
        let id = self.reserve();
        self.put(id, dictionary, Some(data));
        id
    }

    fn put(&mut self, id: u32, content: String, stream_data: Option<Vec<u8>>) {
        if let Some(slot) = (id as usize).checked_sub(1).and_then(|i| self.objects.get_mut(i)) {
            *slot = Some(PdfObj {
                id,
                generation: 0,
                content,
                is_stream: stream_data.is_some(),
                stream_data,
            });
        }
    }

    pub fn generate(&self, root: u32, info: Option<u32>) -> Vec<u8> {
        let mut pdf = Vec::new();

        // PDF header
        pdf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let mut offsets = Vec::with_capacity(self.objects.len());
        for (index, obj) in self.objects.iter().enumerate() {
            offsets.push(pdf.len());
            let id = index as u32 + 1;
            pdf.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            match obj {
                Some(obj) => {
                    pdf.extend_from_slice(obj.content.as_bytes());
                    if obj.is_stream {
                        if let Some(data) = &obj.stream_data {
                            pdf.extend_from_slice(b"stream\n");
                            pdf.extend_from_slice(data);
                            pdf.extend_from_slice(b"\nendstream\n");
                        }
                    }
                }
                // Reserved but never written.
                None => pdf.extend_from_slice(b"null\n"),
            }
            pdf.extend_from_slice(b"endobj\n");
        }

        // xref table
        let xref_offset = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", self.objects.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }

        // trailer
        pdf.extend_from_slice(b"trailer\n<<\n");
        pdf.extend_from_slice(format!("/Size {}\n/Root {} 0 R\n", self.objects.len() + 1, root).as_bytes());
        if let Some(info) = info {
            pdf.extend_from_slice(format!("/Info {} 0 R\n", info).as_bytes());
        }
        pdf.extend_from_slice(b">>\nstartxref\n");
        pdf.extend_from_slice(format!("{}\n", xref_offset).as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");

        pdf
    }
}

/// Compact number formatting for content streams.
pub fn fmt_num(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" { "0".to_string() } else { s.to_string() }
}

fn rgb(color: Color) -> String {
    let (r, g, b) = color.to_pdf_rgb();
    format!("{} {} {}", fmt_num(r), fmt_num(g), fmt_num(b))
}

/// A PDF text string: literal for printable ASCII, UTF-16BE otherwise.
pub fn pdf_text_string(text: &str) -> String {
    if text.chars().all(|c| (' '..='~').contains(&c)) {
        return pdf_literal(text.as_bytes());
    }
    let mut hex = String::from("<FEFF");
    for unit in text.encode_utf16() {
        hex.push_str(&format!("{:04X}", unit));
    }
    hex.push('>');
    hex
}

fn rounded_rect_path(out: &mut String, x: f32, y: f32, w: f32, h: f32, r: f32) {
    let r = r.min(w / 2.0).min(h / 2.0).max(0.0);
    let k = r * KAPPA;
    let (x2, y2) = (x + w, y + h);
    let n = fmt_num;
    out.push_str(&format!("{} {} m\n", n(x + r), n(y)));
    out.push_str(&format!("{} {} l\n", n(x2 - r), n(y)));
    out.push_str(&format!("{} {} {} {} {} {} c\n", n(x2 - r + k), n(y), n(x2), n(y + r - k), n(x2), n(y + r)));
    out.push_str(&format!("{} {} l\n", n(x2), n(y2 - r)));
    out.push_str(&format!("{} {} {} {} {} {} c\n", n(x2), n(y2 - r + k), n(x2 - r + k), n(y2), n(x2 - r), n(y2)));
    out.push_str(&format!("{} {} l\n", n(x + r), n(y2)));
    out.push_str(&format!("{} {} {} {} {} {} c\n", n(x + r - k), n(y2), n(x), n(y2 - r + k), n(x), n(y2 - r)));
    out.push_str(&format!("{} {} l\n", n(x), n(y + r)));
    out.push_str(&format!("{} {} {} {} {} {} c\n", n(x), n(y + r - k), n(x + r - k), n(y), n(x + r), n(y)));
    out.push_str("h\n");
}

fn circle_path(out: &mut String, cx: f32, cy: f32, r: f32) {
    rounded_rect_path(out, cx - r, cy - r, 2.0 * r, 2.0 * r, r);
}

/// Serialize one page's ops into content stream text.
pub fn render_content(ops: &[DrawOp], page_height: f32) -> String {
    let mut out = String::new();
    let mut word_spacing = 0.0f32;
    for op in ops {
        op.visit(&mut |op| render_op(&mut out, op, page_height, &mut word_spacing));
    }
    out
}

fn render_op(out: &mut String, op: &DrawOp, page_height: f32, word_spacing: &mut f32) {
    let n = fmt_num;
    match op {
        DrawOp::Rect { x, y, width, height, color, radius } => {
            if color.is_transparent() || *width <= 0.0 || *height <= 0.0 {
                return;
            }
            let bottom = page_height - y - height;
            out.push_str(&format!("{} rg\n", rgb(*color)));
            if *radius > 0.0 {
                rounded_rect_path(out, *x, bottom, *width, *height, *radius);
                out.push_str("f\n");
            } else {
                out.push_str(&format!("{} {} {} {} re f\n", n(*x), n(bottom), n(*width), n(*height)));
            }
        }
        DrawOp::Line { x1, y1, x2, y2, width, color, style } => {
            if *width <= 0.0 || color.is_transparent() {
                return;
            }
            out.push_str("q\n");
            out.push_str(&format!("{} w {} RG\n", n(*width), rgb(*color)));
            match style {
                BorderStyle::Dashed => {
                    let dash = (width * 3.0).max(2.0);
                    out.push_str(&format!("[{} {}] 0 d\n", n(dash), n(dash)));
                }
                BorderStyle::Dotted => {
                    out.push_str(&format!("1 J [0 {}] 0 d\n", n(width * 2.0)));
                }
                _ => {}
            }
            out.push_str(&format!(
                "{} {} m {} {} l S\nQ\n",
                n(*x1),
                n(page_height - y1),
                n(*x2),
                n(page_height - y2)
            ));
        }
        DrawOp::RoundedOutline { x, y, width, height, radius, line_width, color } => {
            if *line_width <= 0.0 || color.is_transparent() {
                return;
            }
            out.push_str("q\n");
            out.push_str(&format!("{} w {} RG\n", n(*line_width), rgb(*color)));
            rounded_rect_path(out, *x, page_height - y - height, *width, *height, *radius);
            out.push_str("S\nQ\n");
        }
        DrawOp::Circle { cx, cy, r, color, filled } => {
            if *filled {
                out.push_str(&format!("{} rg\n", rgb(*color)));
                circle_path(out, *cx, page_height - cy, *r);
                out.push_str("f\n");
            } else {
                out.push_str("q\n");
                out.push_str(&format!("{} w {} RG\n", n(r * 0.35), rgb(*color)));
                circle_path(out, *cx, page_height - cy, *r);
                out.push_str("S\nQ\n");
            }
        }
        DrawOp::Text { x, y, font, size, color, bytes, word_spacing: ws } => {
            if bytes.is_empty() {
                return;
            }
            out.push_str("BT\n");
            out.push_str(&format!("/{} {} Tf {} rg\n", font.resource_name(), n(*size), rgb(*color)));
            if (*ws - *word_spacing).abs() > 0.001 {
                out.push_str(&format!("{} Tw\n", n(*ws)));
                *word_spacing = *ws;
            }
            let operand = match font {
                PdfFont::Standard(_) => pdf_literal(bytes),
                PdfFont::Fallback => format!("<{}>", encode_hex_string(bytes)),
            };
            out.push_str(&format!("{} {} Td {} Tj\n", n(*x), n(page_height - y), operand));
            out.push_str("ET\n");
        }
        DrawOp::Image { x, y, width, height, image } => {
            out.push_str(&create_image_content_stream(
                *x,
                page_height - y - height,
                *width,
                *height,
                &format!("Im{}", image + 1),
            ));
        }
        DrawOp::Group(_) => {}
    }
}

fn pdf_rect(rect: &[f32; 4], page_height: f32) -> String {
    let [x, y, w, h] = *rect;
    format!(
        "[{} {} {} {}]",
        fmt_num(x),
        fmt_num(page_height - y - h),
        fmt_num(x + w),
        fmt_num(page_height - y)
    )
}

fn explicit_dest(page_ref: u32, y: f32, page_height: f32) -> String {
    format!("[{} 0 R /XYZ 0 {} null]", page_ref, fmt_num(page_height - y))
}

/// Everything the writer needs about a laid-out document.
pub struct PdfDocument<'a> {
    pub pages: &'a [PageCanvas],
    pub geometry: PageGeometry,
    pub destinations: &'a [Destination],
    pub outline: &'a [OutlineEntry],
    pub info: &'a DocumentInfo,
    /// Face behind [`PdfFont::Fallback`] runs.
    pub fallback: Option<&'a FallbackFont>,
}

/// Serialize a laid-out document to PDF bytes.
pub fn write_pdf(document: &PdfDocument<'_>, images: &ImageStore) -> Vec<u8> {
    let page_height = document.geometry.height;
    let mut generator = PdfGenerator::new();
    let catalog_id = generator.reserve();
    let pages_id = generator.reserve();
    let page_ids: Vec<u32> = document.pages.iter().map(|_| generator.reserve()).collect();

    // First destination wins for duplicate ids.
    let mut dests: BTreeMap<&str, (u32, f32)> = BTreeMap::new();
    for dest in document.destinations {
        if let Some(&page_ref) = page_ids.get(dest.page) {
            dests.entry(dest.name.as_str()).or_insert((page_ref, dest.y));
        }
    }

    // Shared resources: only fonts and images that are painted somewhere.
    let mut fonts = BTreeSet::new();
    let mut used_glyphs = BTreeSet::new();
    let mut used_images = BTreeSet::new();
    for page in document.pages {
        for op in &page.ops {
            op.visit(&mut |op| match op {
                DrawOp::Text { font, bytes, .. } => {
                    fonts.insert(*font);
                    if *font == PdfFont::Fallback {
                        used_glyphs.extend(bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])));
                    }
                }
                DrawOp::Image { image, .. } => {
                    used_images.insert(*image);
                }
                _ => {}
            });
        }
    }
    let mut resources = String::from("<< /ProcSet [/PDF /Text /ImageB /ImageC /ImageI]\n");
    if !fonts.is_empty() {
        resources.push_str("/Font <<");
        for font in &fonts {
            let id = match (font, document.fallback) {
                (PdfFont::Standard(font), _) => generator.add_object(format!(
                    "<< /Type /Font\n/Subtype /Type1\n/BaseFont /{}\n/Encoding /WinAnsiEncoding\n>>\n",
                    font.base_font()
                )),
                (PdfFont::Fallback, Some(face)) => write_fallback_font(&mut generator, face, &used_glyphs),
                (PdfFont::Fallback, None) => {
                    log::debug!("glyph runs without a fallback face were dropped");
                    continue;
                }
            };
            resources.push_str(&format!(" /{} {} 0 R", font.resource_name(), id));
        }
        resources.push_str(" >>\n");
    }
    if !used_images.is_empty() {
        resources.push_str("/XObject <<");
        for &image in &used_images {
            if let Some(id) = images.write_xobject(image, &mut generator) {
                resources.push_str(&format!(" /Im{} {} 0 R", image + 1, id));
            }
        }
        resources.push_str(" >>\n");
    }
    resources.push_str(">>\n");
    let resources_id = generator.add_object(resources);

    for (page, &page_id) in document.pages.iter().zip(&page_ids) {
        let content = compress_deflate(render_content(&page.ops, page_height).as_bytes());
        let content_id = generator.add_stream_object(
            format!("<< /Length {} /Filter /FlateDecode >>\n", content.len()),
            content,
        );

        let mut annots = Vec::new();
        for link in &page.links {
            let action = match &link.target {
                LinkTarget::Uri(uri) => format!("/A << /Type /Action /S /URI /URI {} >>", pdf_literal(uri.as_bytes())),
                LinkTarget::Internal(name) => match dests.get(name.as_str()) {
                    Some(&(page_ref, y)) => format!("/Dest {}", explicit_dest(page_ref, y, page_height)),
                    None => {
                        log::debug!("link to unknown anchor #{}", name);
                        continue;
                    }
                },
            };
            annots.push(generator.add_object(format!(
                "<< /Type /Annot\n/Subtype /Link\n/Rect {}\n/Border [0 0 0]\n{}\n>>\n",
                pdf_rect(&link.rect, page_height),
                action
            )));
        }

        let mut page_dict = format!(
            "<< /Type /Page\n/Parent {} 0 R\n/MediaBox [0 0 {} {}]\n/Contents {} 0 R\n/Resources {} 0 R\n",
            pages_id,
            fmt_num(document.geometry.width),
            fmt_num(page_height),
            content_id,
            resources_id
        );
        if !annots.is_empty() {
            let refs: Vec<String> = annots.iter().map(|id| format!("{} 0 R", id)).collect();
            page_dict.push_str(&format!("/Annots [{}]\n", refs.join(" ")));
        }
        page_dict.push_str(">>\n");
        generator.set_object(page_id, page_dict);
    }

    let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();
    generator.set_object(
        pages_id,
        format!("<< /Type /Pages\n/Kids [{}]\n/Count {}\n>>\n", kids.join(" "), page_ids.len()),
    );

    let outlines_id = write_outline(&mut generator, document.outline, &page_ids, page_height);

    let mut catalog = format!("<< /Type /Catalog\n/Pages {} 0 R\n", pages_id);
    if let Some(id) = outlines_id {
        catalog.push_str(&format!("/Outlines {} 0 R\n/PageMode /UseOutlines\n", id));
    }
    if !dests.is_empty() {
        // Name trees need their keys sorted, which BTreeMap provides.
        let names: Vec<String> = dests
            .iter()
            .map(|(name, &(page_ref, y))| {
                format!("{} {}", pdf_literal(name.as_bytes()), explicit_dest(page_ref, y, page_height))
            })
            .collect();
        catalog.push_str(&format!("/Names << /Dests << /Names [{}] >> >>\n", names.join(" ")));
    }
    catalog.push_str(">>\n");
    generator.set_object(catalog_id, catalog);

    let mut info = format!("<< /Producer {}\n", pdf_literal(PRODUCER.as_bytes()));
    if let Some(title) = document.info.title.as_deref().filter(|t| !t.is_empty()) {
        info.push_str(&format!("/Title {}\n", pdf_text_string(title)));
    }
    info.push_str(">>\n");
    let info_id = generator.add_object(info);

    generator.generate(catalog_id, Some(info_id))
}

/// Embed `face` as a `Type0` font over a `CIDFontType2` descendant.
/// Widths and the `ToUnicode` map cover only `used` glyph ids.
fn write_fallback_font(generator: &mut PdfGenerator, face: &FallbackFont, used: &BTreeSet<u16>) -> u32 {
    let data = face.data();
    let compressed = compress_deflate(data);
    let file_id = generator.add_stream_object(
        format!(
            "<< /Length {} /Length1 {} /Filter /FlateDecode >>\n",
            compressed.len(),
            data.len()
        ),
        compressed,
    );

    let [x_min, y_min, x_max, y_max] = face.bbox();
    let descriptor_id = generator.add_object(format!(
        "<< /Type /FontDescriptor\n/FontName /{}\n/Flags 4\n/FontBBox [{} {} {} {}]\n/ItalicAngle {}\n/Ascent {}\n/Descent {}\n/CapHeight {}\n/StemV 80\n/FontFile2 {} 0 R\n>>\n",
        face.name(),
        fmt_num(x_min),
        fmt_num(y_min),
        fmt_num(x_max),
        fmt_num(y_max),
        fmt_num(face.italic_angle()),
        fmt_num(face.ascent()),
        fmt_num(face.descent()),
        fmt_num(face.cap_height()),
        file_id
    ));

    // Lowest character per glyph keeps the map stable across runs.
    let mut by_glyph: BTreeMap<u16, (char, u16)> = BTreeMap::new();
    for (c, glyph) in face.glyphs().filter(|(_, g)| used.contains(&g.id)) {
        let entry = by_glyph.entry(glyph.id).or_insert((c, glyph.advance));
        if c < entry.0 {
            entry.0 = c;
        }
    }

    let widths: Vec<String> = by_glyph
        .iter()
        .map(|(id, (_, advance))| format!("{} [{}]", id, fmt_num(face.to_thousandths(*advance as f32))))
        .collect();
    let cid_font_id = generator.add_object(format!(
        "<< /Type /Font\n/Subtype /CIDFontType2\n/BaseFont /{}\n/CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >>\n/FontDescriptor {} 0 R\n/CIDToGIDMap /Identity\n/DW 1000\n/W [{}]\n>>\n",
        face.name(),
        descriptor_id,
        widths.join(" ")
    ));

    let cmap = to_unicode_cmap(by_glyph.iter().map(|(id, (c, _))| (*id, *c)));
    let cmap = compress_deflate(cmap.as_bytes());
    let cmap_id = generator.add_stream_object(
        format!("<< /Length {} /Filter /FlateDecode >>\n", cmap.len()),
        cmap,
    );

    generator.add_object(format!(
        "<< /Type /Font\n/Subtype /Type0\n/BaseFont /{}\n/Encoding /Identity-H\n/DescendantFonts [{} 0 R]\n/ToUnicode {} 0 R\n>>\n",
        face.name(),
        cid_font_id,
        cmap_id
    ))
}

/// A `ToUnicode` CMap from two-byte glyph ids to UTF-16BE.
fn to_unicode_cmap(mapping: impl Iterator<Item = (u16, char)>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<String> = mapping
        .map(|(id, c)| {
            let mut units = [0u16; 2];
            let utf16: String = c.encode_utf16(&mut units).iter().map(|u| format!("{:04X}", u)).collect();
            format!("<{:04X}> <{}>", id, utf16)
        })
        .collect();
    // At most 100 entries per bfchar block.
    for chunk in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n{}\nendbfchar\n", chunk.len(), chunk.join("\n")));
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMapResource defineresource pop\nend\nend\n");
    cmap
}

/// Write the outline tree; headings nest under the nearest preceding
/// heading of a lower level.
fn write_outline(
    generator: &mut PdfGenerator,
    entries: &[OutlineEntry],
    page_ids: &[u32],
    page_height: f32,
) -> Option<u32> {
    let entries: Vec<&OutlineEntry> = entries.iter().filter(|e| e.page < page_ids.len()).collect();
    if entries.is_empty() {
        return None;
    }

    let mut parent: Vec<Option<usize>> = Vec::with_capacity(entries.len());
    let mut stack: Vec<usize> = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        while stack.last().is_some_and(|&top| entries[top].level >= entry.level) {
            stack.pop();
        }
        parent.push(stack.last().copied());
        stack.push(i);
    }
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
    let mut top_level = Vec::new();
    for (i, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(i),
            None => top_level.push(i),
        }
    }
    // Descendant counts, children always follow their parent.
    let mut descendants = vec![0usize; entries.len()];
    for i in (0..entries.len()).rev() {
        if let Some(p) = parent[i] {
            descendants[p] += descendants[i] + 1;
        }
    }

    let root_id = generator.reserve();
    let ids: Vec<u32> = entries.iter().map(|_| generator.reserve()).collect();
    for (i, entry) in entries.iter().enumerate() {
        let mut dict = format!("<< /Title {}\n", pdf_text_string(&entry.title));
        let parent_id = parent[i].map(|p| ids[p]).unwrap_or(root_id);
        dict.push_str(&format!("/Parent {} 0 R\n", parent_id));
        let siblings = match parent[i] {
            Some(p) => &children[p],
            None => &top_level,
        };
        let pos = siblings.iter().position(|&s| s == i).unwrap_or(0);
        if pos > 0 {
            dict.push_str(&format!("/Prev {} 0 R\n", ids[siblings[pos - 1]]));
        }
        if let Some(&next) = siblings.get(pos + 1) {
            dict.push_str(&format!("/Next {} 0 R\n", ids[next]));
        }
        if let (Some(first), Some(last)) = (children[i].first(), children[i].last()) {
            dict.push_str(&format!("/First {} 0 R\n/Last {} 0 R\n/Count {}\n", ids[*first], ids[*last], descendants[i]));
        }
        dict.push_str(&format!("/Dest {}\n", explicit_dest(page_ids[entry.page], entry.y, page_height)));
        dict.push_str(">>\n");
        generator.set_object(ids[i], dict);
    }

    let first = ids[top_level[0]];
    let last = ids[top_level[top_level.len() - 1]];
    generator.set_object(
        root_id,
        format!("<< /Type /Outlines\n/First {} 0 R\n/Last {} 0 R\n/Count {}\n>>\n", first, last, entries.len()),
    );
    Some(root_id)
}
