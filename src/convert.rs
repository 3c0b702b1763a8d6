//! The conversion pipeline: Load, Translate, Resolve styles, Wrap, Render, Write.

use crate::emitter::{RenderedDocument, render_pdf};
use crate::envelope::DocumentEnvelope;
use crate::error::{ConvertError, Result};
use crate::markdown;
use crate::source::load_source;
use crate::style::{StyleRuleList, resolve_styles};
use crate::writer::write_output;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Inputs of one conversion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOptions {
    pub input: PathBuf,
    /// Destination; derived from `input` when absent.
    pub output: Option<PathBuf>,
    /// Style override: a stylesheet path or literal CSS.
    pub css: Option<String>,
}

impl ConvertOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self { input: input.into(), ..Self::default() }
    }

    /// The path the PDF will be written to.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| default_output_path(&self.input))
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub styles: StyleRuleList,
    pub bytes_written: usize,
    pub page_count: usize,
}

/// `input` with its extension replaced by `pdf`.
///
/// ```
/// use md2pdf::convert::default_output_path;
/// use std::path::Path;
///
/// assert_eq!(default_output_path(Path::new("report.md")), Path::new("report.pdf"));
/// assert_eq!(default_output_path(Path::new("README")), Path::new("README.pdf"));
/// ```
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// Run every stage up to and including rendering, without writing anything.
pub(crate) fn render_document(options: &ConvertOptions) -> Result<(StyleRuleList, RenderedDocument)> {
    let source = load_source(&options.input)?;
    let body = markdown::translate(&source);
    debug!("translated {} bytes of Markdown into {} bytes of HTML", source.len(), body.len());

    let styles = resolve_styles(options.css.as_deref());
    debug!("style sources: {}", styles.iter().map(|s| s.describe()).collect::<Vec<_>>().join(", "));

    let envelope = DocumentEnvelope::wrap(&body);
    let base_dir = match options.input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let rendered = render_pdf(&envelope, &styles, &base_dir).map_err(ConvertError::render)?;
    Ok((styles, rendered))
}

/// Convert `options.input` to a PDF. Nothing is written unless rendering
/// succeeded.
pub fn convert(options: &ConvertOptions) -> Result<ConversionReport> {
    let output = options.output_path();
    let (styles, rendered) = render_document(options)?;
    write_output(&output, &rendered.bytes)?;
    info!(
        "wrote {} page(s), {} bytes to {}",
        rendered.page_count,
        rendered.bytes.len(),
        output.display()
    );
    Ok(ConversionReport {
        input: options.input.clone(),
        output,
        styles,
        bytes_written: rendered.bytes.len(),
        page_count: rendered.page_count,
    })
}
