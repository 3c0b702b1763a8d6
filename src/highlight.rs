//! Code block highlighting.
//!
//! Fenced code is turned into class-annotated spans so that a stylesheet can
//! color tokens (`.hl-keyword { color: ... }`). Nothing is colored by default.

use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Prefix applied to every scope class emitted for highlighted code.
pub const CLASS_PREFIX: &str = "hl-";

pub struct CodeHighlighter {
    syntax_set: SyntaxSet,
}

impl CodeHighlighter {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    fn find_syntax(&self, language: &str) -> &SyntaxReference {
        let token = language.split_whitespace().next().unwrap_or("");
        if token.is_empty() {
            return self.syntax_set.find_syntax_plain_text();
        }
        self.syntax_set
            .find_syntax_by_token(token)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
    }

    /// Render `code` as a complete `<pre class="codehilite">` block.
    pub fn highlight_block(&self, code: &str, language: &str) -> String {
        let lang = language.split_whitespace().next().unwrap_or("");
        let body = self.highlight_spans(code, lang);
        if lang.is_empty() {
            format!("<pre class=\"codehilite\"><code>{}</code></pre>\n", body)
        } else {
            format!(
                "<pre class=\"codehilite\"><code class=\"language-{}\">{}</code></pre>\n",
                escape_html(lang),
                body
            )
        }
    }

    /// Highlighted inner HTML for `code`; falls back to escaped text if the
    /// syntax definition fails on this input.
    fn highlight_spans(&self, code: &str, language: &str) -> String {
        let syntax = self.find_syntax(language);
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::SpacedPrefixed { prefix: CLASS_PREFIX },
        );
        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                log::warn!("highlighting '{}' failed, emitting plain code: {}", language, e);
                return escape_html(code);
            }
        }
        generator.finalize()
    }
}

impl Default for CodeHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_language_gets_classes() {
        let hl = CodeHighlighter::new();
        let html = hl.highlight_block("fn main() {}\n", "rust");
        assert!(html.starts_with("<pre class=\"codehilite\"><code class=\"language-rust\">"));
        assert!(html.contains("hl-"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_unknown_language_is_escaped_plain_text() {
        let hl = CodeHighlighter::new();
        let html = hl.highlight_block("a < b && c\n", "no-such-lang");
        assert!(html.contains("a &lt; b &amp;&amp; c"));
    }

    #[test]
    fn test_no_language_omits_class() {
        let hl = CodeHighlighter::new();
        let html = hl.highlight_block("plain\n", "");
        assert!(html.starts_with("<pre class=\"codehilite\"><code>"));
    }
}
