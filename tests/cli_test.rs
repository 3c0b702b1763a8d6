use std::fs;
use std::path::Path;
use std::process::Command;

/// Run the md2pdf binary inside `dir`, returning (stdout, stderr, exit code).
fn run_md2pdf(dir: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let bin = std::path::PathBuf::from(env!("CARGO_BIN_EXE_md2pdf"));

    let output = Command::new(&bin)
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute md2pdf");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code())
}

fn write_doc(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn test_converts_to_default_output() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "report.md", "# Title\n\nHello **world**\n");

    let (stdout, stderr, code) = run_md2pdf(dir.path(), &["report.md"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(stdout.contains("✅ Successfully converted 'report.md' to 'report.pdf'"));

    let pdf = fs::read(dir.path().join("report.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
    assert!(String::from_utf8_lossy(&pdf).trim_end().ends_with("%%EOF"));
}

#[test]
fn test_markdown_extension_replaced() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "notes.markdown", "Some notes.\n");

    let (_, _, code) = run_md2pdf(dir.path(), &["notes.markdown"]);
    assert_eq!(code, Some(0));
    assert!(dir.path().join("notes.pdf").exists());
}

#[test]
fn test_explicit_output_and_verbose() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "doc.md", "Text.\n");

    let (stdout, _, code) = run_md2pdf(
        dir.path(),
        &["doc.md", "-o", "custom.pdf", "--css", "body { color: navy }", "-v"],
    );
    assert_eq!(code, Some(0));
    assert!(stdout.contains("Input file: doc.md"));
    assert!(stdout.contains("Output file: custom.pdf"));
    assert!(stdout.contains("Custom CSS: body { color: navy }"));
    assert!(dir.path().join("custom.pdf").exists());
    assert!(!dir.path().join("doc.pdf").exists());
}

#[test]
fn test_verbose_without_css_omits_css_line() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "doc.md", "Text.\n");

    let (stdout, _, code) = run_md2pdf(dir.path(), &["--verbose", "doc.md"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("Output file: doc.pdf"));
    assert!(!stdout.contains("Custom CSS:"));
}

#[test]
fn test_css_file_sets_page_size() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "doc.md", "Letter paper.\n");
    write_doc(dir.path(), "letter.css", "@page { size: letter; margin: 1in }\n");

    let (_, stderr, code) = run_md2pdf(dir.path(), &["doc.md", "-c", "letter.css"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    let pdf = fs::read(dir.path().join("doc.pdf")).unwrap();
    assert!(String::from_utf8_lossy(&pdf).contains("/MediaBox [0 0 612 792]"));
}

#[test]
fn test_missing_input_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();

    let (_, stderr, code) = run_md2pdf(dir.path(), &["absent.md"]);
    assert_eq!(code, Some(2));
    assert!(stderr.contains("absent.md"));
    assert!(!dir.path().join("absent.pdf").exists());
}

#[test]
fn test_directory_input_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("folder.md")).unwrap();

    let (_, stderr, code) = run_md2pdf(dir.path(), &["folder.md", "-o", "out.pdf"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("Error reading file:"));
    assert!(!dir.path().join("out.pdf").exists());
}

#[test]
fn test_unwritable_output_is_write_error() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "doc.md", "Text.\n");

    let (_, stderr, code) = run_md2pdf(dir.path(), &["doc.md", "-o", "missing-dir/out.pdf"]);
    assert_eq!(code, Some(1));
    assert!(stderr.contains("Error writing PDF:"));
}

#[test]
fn test_impossible_page_is_render_error() {
    let dir = tempfile::tempdir().unwrap();
    write_doc(dir.path(), "doc.md", "Text.\n");

    let (_, stderr, code) = run_md2pdf(
        dir.path(),
        &["doc.md", "--css", "@page { size: 40pt 40pt; margin: 30pt }"],
    );
    assert_eq!(code, Some(1));
    assert!(stderr.contains("Error converting to PDF:"));
    assert!(!dir.path().join("doc.pdf").exists());
}

#[test]
fn test_help_lists_options() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_md2pdf(dir.path(), &["--help"]);
    assert_eq!(code, Some(0));
    for option in ["--output", "--css", "--verbose", "INPUT"] {
        assert!(stdout.contains(option), "help is missing {}", option);
    }
}
