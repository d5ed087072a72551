//! Startup validation of the one file this server delivers.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::mime::MimeTable;

/// The validated file every connection receives.
///
/// Created once before the dispatcher starts and shared read-only by all
/// workers afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServableFile {
    /// Canonical absolute path
    pub path: PathBuf,
    /// Size in bytes at validation time; every transfer must send exactly this many
    pub size: u64,
    /// Extension as matched against the MIME table (no leading dot)
    pub extension: String,
}

impl ServableFile {
    /// Checks, in order: existence, read permission, presence of an
    /// extension, and membership of that extension in `table`. Stops at the
    /// first failure.
    pub fn validate(path: impl AsRef<Path>, table: &MimeTable) -> Result<Self, ValidationError> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|source| ValidationError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;

        if !metadata.is_file() {
            return Err(ValidationError::NotReadable {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, "not a regular file"),
            });
        }

        File::open(path).map_err(|source| ValidationError::NotReadable {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = extension_of(path).ok_or_else(|| ValidationError::NoExtension {
            path: path.to_path_buf(),
        })?;

        if !table.contains(extension) {
            return Err(ValidationError::ExtensionNotAllowed {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            });
        }

        let canonical = std::fs::canonicalize(path).map_err(|source| ValidationError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: canonical,
            size: metadata.len(),
            extension: extension.to_string(),
        })
    }
}

/// Text after the last `.` of the file name. Leading-dot names count
/// (`.profile` yields `profile`), a trailing dot does not.
fn extension_of(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() { None } else { Some(ext) }
}
