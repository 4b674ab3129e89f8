//! Reference extraction contract
//!
//! [`ReferenceProvider`] is the seam to the external symbol indexer: given
//! one file and its content, it reports what the file imports, what it
//! exports, and which imported symbols it consumes. The engine never
//! parses source itself beyond this contract - and a missing indexer is
//! impossible by construction, since the graph builder requires one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// What one file references, extracted from its content
///
/// `imports` are raw specifiers as written in the source; the graph
/// resolves them against the working set's path universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReferences {
    /// Import specifiers as written (`./a`, `../util/b.ts`, ...)
    pub imports: BTreeSet<PathBuf>,

    /// Symbols this file defines for others
    pub exported_symbols: BTreeSet<String>,

    /// Imported symbols this file consumes
    pub used_symbols: BTreeSet<String>,
}

impl FileReferences {
    /// References of a file that imports and exports nothing
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the extraction found anything at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.exported_symbols.is_empty() && self.used_symbols.is_empty()
    }
}

/// A use of one file's exported symbol by another file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolUsage {
    /// The exported symbol being consumed
    pub symbol: String,
    /// The file consuming it
    pub referencing_path: PathBuf,
}

/// External indexer seam
///
/// Implementations wrap a real symbol index; [`crate::RegexReferenceExtractor`]
/// is the bundled fallback for sources the index does not cover.
pub trait ReferenceProvider: Send + Sync + std::fmt::Debug {
    /// Extract references from one file's content
    ///
    /// # Errors
    /// Returns error if the content cannot be analyzed at all. Content
    /// with no recognizable references yields [`FileReferences::empty`],
    /// never an error.
    fn references(&self, path: &Path, content: &str) -> Result<FileReferences, ReferenceError>;
}

/// Errors from reference extraction
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// Indexer rejected the file
    #[error("indexer failed on {path:?}: {reason}")]
    IndexerFailed { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_references_empty() {
        let refs = FileReferences::empty();
        assert!(refs.is_empty());
        assert!(refs.imports.is_empty());
    }

    #[test]
    fn symbol_usage_ordering_is_stable() {
        let a = SymbolUsage {
            symbol: "alpha".into(),
            referencing_path: "b.ts".into(),
        };
        let b = SymbolUsage {
            symbol: "beta".into(),
            referencing_path: "a.ts".into(),
        };
        assert!(a < b);
    }
}
