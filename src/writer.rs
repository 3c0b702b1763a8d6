//! Writes the finished PDF to its destination.
//!
//! The bytes are staged in a temporary file next to the destination and
//! renamed over it once complete, so a failed write never leaves a
//! truncated PDF behind.

use crate::error::{ConvertError, Result};
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `bytes` to `path` verbatim, replacing any existing file.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let write_error = |source: io::Error| ConvertError::Write { path: path.to_path_buf(), source };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(write_error)?;
    staged.write_all(bytes).map_err(write_error)?;
    staged.as_file().sync_all().map_err(write_error)?;
    if let Some(permissions) = output_permissions(path) {
        staged.as_file().set_permissions(permissions).map_err(write_error)?;
    }
    staged.persist(path).map_err(|e| write_error(e.error))?;

    debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Keep the permissions of a file being replaced; new files get the usual
/// `rw-r--r--` instead of the owner-only mode of a temporary file.
fn output_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Some(meta.permissions()),
        _ => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.pdf");
        write_output(&path, b"first").unwrap();
        write_output(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(entries(dir.path()), vec!["out.pdf".to_string()]);
    }

    #[test]
    fn test_missing_directory_is_write_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.pdf");
        let err = write_output(&path, b"%PDF").unwrap_err();
        assert!(matches!(err, ConvertError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        // Renaming a file over a non-empty directory fails after the bytes are staged.
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), b"keep").unwrap();

        let err = write_output(&path, b"%PDF-1.4 partial").unwrap_err();
        assert!(matches!(err, ConvertError::Write { .. }));
        assert!(path.is_dir());
        assert_eq!(entries(dir.path()), vec!["taken".to_string()]);
        assert_eq!(fs::read(path.join("keep.txt")).unwrap(), b"keep");
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.pdf");
        write_output(&path, b"%PDF").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
