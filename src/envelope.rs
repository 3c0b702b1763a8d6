//! The minimal HTML document wrapped around translated Markdown.

/// Placeholder document title.
pub const DEFAULT_TITLE: &str = "Converted PDF";

const HEADER: &str = "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<title>Converted PDF</title>\n\
</head>\n\
<body>\n";

const FOOTER: &str = "\n</body>\n</html>\n";

/// A complete HTML document built around a body fragment. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEnvelope {
    html: String,
}

impl DocumentEnvelope {
    pub fn wrap(body: &str) -> Self {
        let mut html = String::with_capacity(HEADER.len() + body.len() + FOOTER.len());
        html.push_str(HEADER);
        html.push_str(body);
        html.push_str(FOOTER);
        Self { html }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}
