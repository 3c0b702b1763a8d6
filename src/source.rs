//! Reads the Markdown source document.

use crate::error::{ConvertError, Result};
use log::debug;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read the document at `path` as UTF-8 text.
///
/// A missing path is reported as [`ConvertError::NotFound`]; every other
/// failure (permissions, a directory, invalid UTF-8) as [`ConvertError::Read`].
pub fn load_source(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| classify(path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| classify(path, e))?;
    debug!("loaded {} bytes from {}", content.len(), path.display());
    Ok(content)
}

fn classify(path: &Path, err: io::Error) -> ConvertError {
    if err.kind() == io::ErrorKind::NotFound {
        ConvertError::NotFound { path: path.to_path_buf() }
    } else {
        ConvertError::Read { path: path.to_path_buf(), source: err }
    }
}
