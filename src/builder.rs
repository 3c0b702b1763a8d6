use crate::convert::{ConversionReport, ConvertOptions, convert, render_document};
use crate::emitter::RenderedDocument;
use crate::error::Result;
use std::path::PathBuf;

/// Fluent builder for converting a Markdown file with a clean, ergonomic API
///
/// # Example
/// ```rust,no_run
/// use md2pdf::builder::Converter;
///
/// let report = Converter::new("notes.md")
///     .output("build/notes.pdf")
///     .css("body { font-size: 10pt }")
///     .convert()
///     .expect("conversion failed");
/// println!("{} pages", report.page_count);
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    /// Create a converter for the Markdown file at `input`
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self { options: ConvertOptions::new(input) }
    }

    /// Set the PDF destination (defaults to the input with a `.pdf` extension)
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.output = Some(path.into());
        self
    }

    /// Set the style override: a stylesheet path or literal CSS rules
    pub fn css(mut self, css: impl Into<String>) -> Self {
        self.options.css = Some(css.into());
        self
    }

    /// Options collected so far
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Where [`Converter::convert`] will write the PDF
    pub fn output_path(&self) -> PathBuf {
        self.options.output_path()
    }

    /// Render the PDF in memory without writing it
    pub fn render(&self) -> Result<RenderedDocument> {
        render_document(&self.options).map(|(_, rendered)| rendered)
    }

    /// Render and write the PDF
    pub fn convert(self) -> Result<ConversionReport> {
        convert(&self.options)
    }
}

impl From<ConvertOptions> for Converter {
    fn from(options: ConvertOptions) -> Self {
        Self { options }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;

    #[test]
    fn test_converter_defaults() {
        let converter = Converter::new("dir/report.md");
        assert_eq!(converter.output_path(), PathBuf::from("dir/report.pdf"));
        assert_eq!(converter.options().css, None);
    }

    #[test]
    fn test_converter_chaining() {
        let converter = Converter::new("a.md").output("b.pdf").css("h1 { color: red }");
        assert_eq!(converter.output_path(), PathBuf::from("b.pdf"));
        assert_eq!(converter.options().css.as_deref(), Some("h1 { color: red }"));
    }

    #[test]
    fn test_converter_render_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "# Heading\n\n- one\n- two\n").unwrap();

        let rendered = Converter::new(&input).render().unwrap();
        assert!(rendered.bytes.starts_with(b"%PDF-"));
        assert_eq!(rendered.page_count, 1);
        assert!(!dir.path().join("doc.pdf").exists());
    }

    #[test]
    fn test_converter_convert_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        fs::write(&input, "Plain paragraph.").unwrap();
        let output = dir.path().join("out.pdf");

        let report = Converter::new(&input).output(&output).convert().unwrap();
        assert_eq!(report.output, output);
        assert_eq!(fs::metadata(&output).unwrap().len() as usize, report.bytes_written);
    }

    #[test]
    fn test_converter_missing_input() {
        let err = Converter::new("/definitely/not/here.md").render().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
