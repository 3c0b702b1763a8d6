//! Error types for the conversion pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Terminal failures of a conversion run. None of them are retried.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The input document does not exist.
    #[error("File '{}' not found.", path.display())]
    NotFound { path: PathBuf },

    /// The input exists but could not be read or is not valid UTF-8.
    #[error("Error reading file: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Translation, style loading, layout or PDF serialization failed.
    #[error("Error converting to PDF: {0}")]
    Render(String),

    /// The PDF could not be written to the destination.
    #[error("Error writing PDF: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Discriminant of [`ConvertError`], handy for tests and exit-status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Read,
    Render,
    Write,
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::NotFound { .. } => ErrorKind::NotFound,
            ConvertError::Read { .. } => ErrorKind::Read,
            ConvertError::Render(_) => ErrorKind::Render,
            ConvertError::Write { .. } => ErrorKind::Write,
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Wrap an emitter failure, keeping its whole context chain in the message.
    pub fn render(err: anyhow::Error) -> Self {
        ConvertError::Render(format!("{:#}", err))
    }
}
