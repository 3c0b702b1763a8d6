//! Renders a [`DocumentEnvelope`] with its style sources into PDF bytes.

use crate::cascade::{Cascade, Origin, PageGeometry, UA_STYLESHEET};
use crate::css::Stylesheet;
use crate::dom::Document;
use crate::envelope::DocumentEnvelope;
use crate::fallback_font::{FallbackFont, uncovered_characters};
use crate::image::ImageStore;
use crate::layout::layout_document;
use crate::pdf_generator::{DocumentInfo, PdfDocument, write_pdf};
use crate::style::StyleRuleList;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::Path;
use std::sync::Arc;

/// A finished PDF and its page count.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Render `envelope` styled by `styles`. Relative image sources resolve
/// against `base_dir`.
pub fn render_pdf(envelope: &DocumentEnvelope, styles: &StyleRuleList, base_dir: &Path) -> Result<RenderedDocument> {
    let doc = Document::parse(envelope.as_str());
    debug!("parsed {} DOM nodes", doc.len());

    let mut cascade = Cascade::new();
    cascade.add_stylesheet(&Stylesheet::parse(UA_STYLESHEET), Origin::UserAgent);
    let mut page = PageGeometry::a4();

    // Embedded <style> elements come before the style list.
    for text in embedded_styles(&doc) {
        let sheet = Stylesheet::parse(&text);
        page.apply(&sheet.page_declarations);
        cascade.add_stylesheet(&sheet, Origin::Author);
    }
    for source in styles {
        let text = source
            .load()
            .with_context(|| format!("failed to load {}", source.describe()))?;
        let sheet = Stylesheet::parse(&text);
        debug!("{}: {} rules", source.describe(), sheet.rules.len());
        page.apply(&sheet.page_declarations);
        cascade.add_stylesheet(&sheet, Origin::Author);
    }

    if page.content_width() <= 0.0 || page.content_height() <= 0.0 {
        bail!(
            "page margins leave no room for content on a {}x{}pt page",
            page.width,
            page.height
        );
    }
    debug!(
        "page {}x{}pt, content area {}x{}pt",
        page.width,
        page.height,
        page.content_width(),
        page.content_height()
    );

    let computed = cascade.compute(&doc);
    let mut images = ImageStore::new(base_dir);
    let fallback = fallback_font(&doc);
    let layout = layout_document(&doc, &computed, page, &mut images, fallback.clone());
    if layout.missing_glyphs > 0 {
        warn!(
            "{} character(s) cannot be shown with the standard PDF fonts or any installed font and were replaced by '?'",
            layout.missing_glyphs
        );
    }
    debug!(
        "laid out {} page(s), {} destination(s), {} outline entries, {} image(s)",
        layout.pages.len(),
        layout.destinations.len(),
        layout.outline.len(),
        images.len()
    );

    let info = DocumentInfo { title: document_title(&doc) };
    let bytes = write_pdf(
        &PdfDocument {
            pages: &layout.pages,
            geometry: page,
            destinations: &layout.destinations,
            outline: &layout.outline,
            info: &info,
            fallback: fallback.as_deref(),
        },
        &images,
    );
    Ok(RenderedDocument { bytes, page_count: layout.pages.len() })
}

/// An installed face for the characters the standard fonts lack, if the
/// document has any.
fn fallback_font(doc: &Document) -> Option<Arc<FallbackFont>> {
    let needed = uncovered_characters(&doc.text_content(Document::ROOT));
    if needed.is_empty() {
        return None;
    }
    let font = FallbackFont::find_system(&needed);
    match &font {
        Some(font) => debug!(
            "embedding {} for {} of {} character(s) outside the standard fonts",
            font.name(),
            font.glyphs().count(),
            needed.len()
        ),
        None => debug!("no installed font covers {} character(s)", needed.len()),
    }
    font.map(Arc::new)
}

fn embedded_styles(doc: &Document) -> Vec<String> {
    (0..doc.len())
        .filter(|&id| doc.tag_name(id) == Some("style"))
        .filter(|&id| doc.element(id).and_then(|e| e.attr("media")).is_none_or(crate::css::media_applies))
        .map(|id| doc.text_content(id))
        .collect()
}

fn document_title(doc: &Document) -> Option<String> {
    let title = doc.find_first("title")?;
    let text = doc.text_content(title).split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::resolve_styles;

    fn render(body: &str, css: Option<&str>) -> Result<RenderedDocument> {
        render_pdf(&DocumentEnvelope::wrap(body), &resolve_styles(css), Path::new("."))
    }

    fn text_of(doc: &RenderedDocument) -> String {
        String::from_utf8_lossy(&doc.bytes).into_owned()
    }

    #[test]
    fn test_render_minimal_document() {
        let doc = render("<h1>Title</h1><p>Hello <strong>world</strong></p>", None).unwrap();
        assert_eq!(doc.page_count, 1);
        assert!(doc.bytes.starts_with(b"%PDF-"));
        let pdf = text_of(&doc);
        assert!(pdf.trim_end().ends_with("%%EOF"));
        // Default stylesheet: A4.
        assert!(pdf.contains("/MediaBox [0 0 595.28 841.89]"));
        assert!(pdf.contains("/Title (Converted PDF)"));
        assert!(pdf.contains("/Outlines"));
    }

    #[test]
    fn test_page_size_override() {
        let doc = render("<p>x</p>", Some("@page { size: letter }")).unwrap();
        assert!(text_of(&doc).contains("/MediaBox [0 0 612 792]"));
    }

    #[test]
    fn test_embedded_style_element_applies() {
        let doc = render("<style>h1 { display: none }</style><h1>Gone</h1><p>x</p>", None).unwrap();
        assert!(!text_of(&doc).contains("/Outlines"));
    }

    #[test]
    fn test_style_list_overrides_embedded_page_rule() {
        // The default stylesheet's `@page { size: A4 }` comes after embedded styles.
        let doc = render("<style>@page { size: 300pt 400pt }</style><p>x</p>", None).unwrap();
        let pdf = text_of(&doc);
        assert!(pdf.contains("/MediaBox [0 0 595.28 841.89]"));
        assert!(!pdf.contains("/MediaBox [0 0 300 400]"));
    }

    #[test]
    fn test_margins_without_content_area_fail() {
        let err = render("<p>x</p>", Some("@page { size: 100pt 100pt; margin: 60pt }")).unwrap_err();
        assert!(format!("{:#}", err).contains("no room for content"));
    }

    #[test]
    fn test_unreadable_style_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.css");
        std::fs::write(&path, "p { color: red }").unwrap();
        let styles = resolve_styles(path.to_str());
        std::fs::remove_file(&path).unwrap();
        let err = render_pdf(&DocumentEnvelope::wrap("<p>x</p>"), &styles, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to load stylesheet file"));
    }

    #[test]
    fn test_malformed_css_is_not_fatal() {
        let doc = render("<p>x</p>", Some("p { color: ; font-size: banana } }} h1 {")).unwrap();
        assert_eq!(doc.page_count, 1);
    }

    #[test]
    fn test_long_document_spans_pages() {
        let body: String = (0..300).map(|i| format!("<p>Paragraph {}</p>", i)).collect();
        let doc = render(&body, None).unwrap();
        assert!(doc.page_count > 1);
        assert_eq!(text_of(&doc).matches("/Type /Page\n").count(), doc.page_count);
    }

    #[test]
    fn test_internal_links_resolve_to_named_destinations() {
        let doc = render("<p><a href=\"#target\">jump</a></p><h2 id=\"target\">Target</h2>", None).unwrap();
        let pdf = text_of(&doc);
        assert!(pdf.contains("/Subtype /Link"));
        assert!(pdf.contains("/Dests"));
        assert!(pdf.contains("(target)"));
    }

    #[test]
    fn test_characters_outside_standard_fonts_use_installed_face() {
        let doc = render("<p>Ωμέγα</p>", None).unwrap();
        let pdf = text_of(&doc);
        if FallbackFont::find_system(&uncovered_characters("Ωμέγα")).is_some() {
            assert!(pdf.contains("/Subtype /Type0"));
            assert!(pdf.contains("/Encoding /Identity-H"));
            assert!(pdf.contains("/FontFile2"));
        } else {
            assert!(!pdf.contains("/Subtype /Type0"));
        }
    }

    #[test]
    fn test_latin_text_embeds_no_font() {
        let pdf = text_of(&render("<p>Café naïve</p>", None).unwrap());
        assert!(!pdf.contains("/Type0"));
        assert!(!pdf.contains("/FontFile2"));
    }
}
