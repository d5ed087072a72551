//! MIME table: the allow-list of extensions the server agrees to serve.
//!
//! The source is a text file whose first line is a decimal record count
//! (advisory) followed by one record per line. The first whitespace token of
//! a record is the extension; an optional second token is its content type.
//!
//! ```text
//! 3
//! html    text/html
//! txt     text/plain
//! jpg     image/jpeg
//! ```
//!
//! Matching is exact and case-sensitive: `html` does not admit `HTML`.

use std::collections::HashMap;
use std::path::Path;

use crate::error::MimeLoadError;

/// Default table location, relative to the working directory.
pub const DEFAULT_MIME_TABLE: &str = "mime-types.tsv";

/// Immutable set of permitted extensions, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct MimeTable {
    entries: HashMap<String, Option<String>>,
}

impl MimeTable {
    /// Reads and parses the table at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MimeLoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MimeLoadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), extensions = table.len(), "MIME table loaded");
        Ok(table)
    }

    /// Parses table text already in memory.
    pub fn parse(text: &str) -> Result<Self, MimeLoadError> {
        let mut lines = text.lines();

        let count_line = lines.next().ok_or(MimeLoadError::MissingCount)?;
        let declared: usize = count_line
            .trim()
            .parse()
            .map_err(|_| MimeLoadError::InvalidCount {
                line: count_line.to_string(),
            })?;

        let mut entries = HashMap::new();
        let mut records = 0;

        for (idx, line) in lines.enumerate() {
            let mut tokens = line.split_whitespace();
            let extension = tokens
                .next()
                .ok_or(MimeLoadError::MissingExtension { line_no: idx + 2 })?;
            let content_type = tokens.next().map(str::to_string);

            // Duplicates are harmless; the first content type wins.
            entries
                .entry(extension.to_string())
                .or_insert(content_type);
            records += 1;
        }

        if records != declared {
            tracing::debug!(declared, records, "MIME table count does not match records");
        }

        Ok(Self { entries })
    }

    /// Exact, case-sensitive membership test.
    pub fn contains(&self, extension: &str) -> bool {
        self.entries.contains_key(extension)
    }

    /// Content type recorded for `extension`, if the table carries one.
    pub fn content_type(&self, extension: &str) -> Option<&str> {
        self.entries.get(extension).and_then(|ct| ct.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for MimeTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|ext| (ext.into(), None)).collect(),
        }
    }
}
