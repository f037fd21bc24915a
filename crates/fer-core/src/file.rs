//! Source file representation and position bookkeeping.
//!
//! A [`SourceFile`] pairs a canonical module path with its raw text. The
//! text is kept around (not just the path) so diagnostics can render a
//! source snippet via `miette`, and so line/column lookups (needed by the
//! "declared before used" checks in the resolver and type checker) don't
//! require re-reading anything from disk.

use std::{fmt::Display, sync::Arc};

use miette::NamedSource;
use serde::{Deserialize, Serialize};

/// A source file as seen by the semantic analysis core.
///
/// `path` is the dotted/slashed module path (not a filesystem path) used
/// for diagnostics; it is the same string used to key the module in the
/// [`crate::registry::ModuleRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: Arc<Vec<String>>,
    pub code: Arc<String>,
}

impl SourceFile {
    pub fn new(path: Vec<String>, code: String) -> Self {
        Self {
            path: Arc::new(path),
            code: Arc::new(code),
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn code(&self) -> &str {
        self.code.as_ref()
    }

    pub fn display_name(&self) -> String {
        self.path.join("/")
    }

    /// Maps a byte offset into `code` to a 1-based (line, column) pair.
    ///
    /// Used for the "use before declaration" comparisons in spec: those are
    /// defined in terms of line then column, not raw byte offsets, so two
    /// positions on the same line compare by column even if earlier
    /// multi-byte characters shift the raw offsets.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 1usize;
        let mut col = 1usize;
        for ch in self.code.as_str().chars().take(offset) {
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// Compares two byte offsets within this file by (line, column), the
    /// ordering spec.md mandates for forward-reference checks.
    pub fn position_order(&self, a: usize, b: usize) -> std::cmp::Ordering {
        self.line_col(a).cmp(&self.line_col(b))
    }
}

impl Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl From<SourceFile> for NamedSource<String> {
    fn from(file: SourceFile) -> Self {
        NamedSource::new(file.display_name(), file.code.to_string())
    }
}

impl From<&SourceFile> for NamedSource<String> {
    fn from(file: &SourceFile) -> Self {
        NamedSource::new(file.display_name(), file.code.to_string())
    }
}
