//! Style resolution: the built-in stylesheet plus an optional override.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Built-in stylesheet, always first in the cascade.
pub const DEFAULT_STYLESHEET: &str = include_str!("../assets/default.css");

/// One entry of a [`StyleRuleList`].
#[derive(Debug, Clone, PartialEq)]
pub enum StyleSource {
    /// [`DEFAULT_STYLESHEET`].
    Default,
    /// A stylesheet file named by the override; read when rendering.
    File(PathBuf),
    /// Literal style-rule text given as the override.
    Inline(String),
}

impl StyleSource {
    /// The rule text of this source.
    pub fn load(&self) -> io::Result<Cow<'_, str>> {
        match self {
            StyleSource::Default => Ok(Cow::Borrowed(DEFAULT_STYLESHEET)),
            StyleSource::File(path) => fs::read_to_string(path).map(Cow::Owned),
            StyleSource::Inline(text) => Ok(Cow::Borrowed(text.as_str())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StyleSource::Default => "default stylesheet".to_string(),
            StyleSource::File(path) => format!("stylesheet file '{}'", path.display()),
            StyleSource::Inline(_) => "inline stylesheet".to_string(),
        }
    }
}

/// Ordered style sources; later entries take precedence in the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRuleList {
    sources: Vec<StyleSource>,
}

impl StyleRuleList {
    fn with_default() -> Self {
        Self { sources: vec![StyleSource::Default] }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StyleSource> {
        self.sources.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StyleSource> {
        self.sources.iter()
    }

    /// The override entry, if one was appended.
    pub fn override_source(&self) -> Option<&StyleSource> {
        self.sources.get(1)
    }
}

impl<'a> IntoIterator for &'a StyleRuleList {
    type Item = &'a StyleSource;
    type IntoIter = std::slice::Iter<'a, StyleSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Build the style list for a run.
///
/// The override is tried as a path first: an existing regular file is used as
/// a stylesheet file. Anything else, including a path that does not exist, is
/// taken verbatim as stylesheet text. A snippet that happens to name an
/// existing file therefore loads that file. An empty override is ignored.
pub fn resolve_styles(override_spec: Option<&str>) -> StyleRuleList {
    let mut list = StyleRuleList::with_default();
    let Some(spec) = override_spec.filter(|s| !s.is_empty()) else {
        return list;
    };

    let path = Path::new(spec);
    if path.is_file() {
        log::debug!("style override is a file: {}", path.display());
        list.sources.push(StyleSource::File(path.to_path_buf()));
    } else {
        log::debug!("style override is literal text ({} bytes)", spec.len());
        list.sources.push(StyleSource::Inline(spec.to_string()));
    }
    list
}
