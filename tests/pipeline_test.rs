use md2pdf::style::{StyleSource, resolve_styles};
use md2pdf::{ConvertOptions, Converter, ErrorKind, convert};
use std::fs;
use std::path::Path;

fn pdf_text(path: &Path) -> String {
    String::from_utf8_lossy(&fs::read(path).unwrap()).into_owned()
}

#[test]
fn test_no_override_uses_default_only() {
    let styles = resolve_styles(None);
    assert_eq!(styles.len(), 1);
    assert_eq!(styles.get(0), Some(&StyleSource::Default));
}

#[test]
fn test_override_naming_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let css = dir.path().join("style.css");
    fs::write(&css, "h1 { color: red }").unwrap();

    let styles = resolve_styles(css.to_str());
    assert_eq!(styles.len(), 2);
    assert_eq!(styles.get(1), Some(&StyleSource::File(css.clone())));
    assert_eq!(styles.get(1).unwrap().load().unwrap(), "h1 { color: red }");
}

#[test]
fn test_override_not_naming_a_path_is_literal() {
    let styles = resolve_styles(Some("h1 { color: blue }"));
    assert_eq!(styles.len(), 2);
    assert_eq!(styles.get(1), Some(&StyleSource::Inline("h1 { color: blue }".to_string())));
}

#[test]
fn test_literal_equal_to_file_name_loads_file() {
    let dir = tempfile::tempdir().unwrap();
    let css = dir.path().join("p { color: red }");
    fs::write(&css, "p { color: green }").unwrap();

    let styles = resolve_styles(css.to_str());
    assert!(matches!(styles.get(1), Some(StyleSource::File(_))));
}

#[test]
fn test_missing_input_produces_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let err = convert(&ConvertOptions::new(dir.path().join("missing.md"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_long_document_is_multi_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("long.md");
    let markdown: String = (1..=80)
        .map(|i| format!("## Section {}\n\nBody text for section number {} of the document.\n\n", i, i))
        .collect();
    fs::write(&input, markdown).unwrap();

    let report = Converter::new(&input).convert().unwrap();
    assert!(report.page_count > 1);
    let pdf = pdf_text(&report.output);
    assert_eq!(pdf.matches("/Type /Page\n").count(), report.page_count);
    assert!(pdf.contains(&format!("/Count {}", report.page_count)));
}

#[test]
fn test_rich_document_converts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("rich.md");
    let markdown = "\
# Guide

[TOC]

## Install {#install}

Run `cargo install md2pdf` and read the [docs](https://docs.rs).

> Quoted text
> over two lines.

1. first
2. second
   - nested

| Key | Value |
|:----|------:|
| a   | 1     |
| b   | 2     |

```rust
fn main() {}
```

Term
: Definition

Footnote reference[^1].

[^1]: The footnote.

---

![missing picture](nowhere.png)
";
    fs::write(&input, markdown).unwrap();

    let report = convert(&ConvertOptions::new(&input)).unwrap();
    assert_eq!(report.page_count, 1);
    let pdf = pdf_text(&report.output);
    assert!(pdf.contains("/URI (https://docs.rs)"));
    assert!(pdf.contains("(install)"));
    assert!(pdf.contains("/Title (Guide)"));
    assert!(pdf.ends_with("%%EOF\n"));
}

#[test]
fn test_inline_css_override_applies_page_size() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.md");
    fs::write(&input, "Hello").unwrap();

    let report = Converter::new(&input).css("@page { size: A5 landscape }").convert().unwrap();
    assert!(matches!(report.styles.override_source(), Some(StyleSource::Inline(_))));
    assert!(pdf_text(&report.output).contains("/MediaBox [0 0 595.28 419.53]"));
}
