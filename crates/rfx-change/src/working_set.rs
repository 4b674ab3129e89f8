//! Working set capture
//!
//! The set of files a session operates over, each with its content and
//! hash as observed at session start. Immutable once captured; a new
//! session re-captures.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A file's content and fingerprint at capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Content at capture time
    pub content: String,
    /// Blake3 hash of `content`
    pub hash: ContentHash,
}

impl FileEntry {
    /// Build an entry from content, computing the hash
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let hash = ContentHash::of_content(&content);
        Self { content, hash }
    }
}

/// The files a session operates over, captured at session start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingSet {
    files: BTreeMap<PathBuf, FileEntry>,
    captured_at: chrono::DateTime<chrono::Utc>,
}

impl WorkingSet {
    /// Capture the given paths from disk
    ///
    /// # Errors
    /// - [`WorkingSetError::Empty`] if no paths are given
    /// - [`WorkingSetError::MissingPath`] if any path does not exist
    /// - [`WorkingSetError::Io`] on read failure
    pub async fn capture(
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Result<Self, WorkingSetError> {
        let mut files = BTreeMap::new();
        for path in paths {
            if !tokio::fs::try_exists(&path)
                .await
                .map_err(|source| WorkingSetError::Io {
                    path: path.clone(),
                    source,
                })?
            {
                return Err(WorkingSetError::MissingPath(path));
            }
            let content =
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| WorkingSetError::Io {
                        path: path.clone(),
                        source,
                    })?;
            files.insert(path, FileEntry::new(content));
        }
        if files.is_empty() {
            return Err(WorkingSetError::Empty);
        }
        Ok(Self {
            files,
            captured_at: chrono::Utc::now(),
        })
    }

    /// Build a working set from in-memory entries (used by tests and
    /// callers that already hold content)
    ///
    /// # Errors
    /// Returns [`WorkingSetError::Empty`] if no entries are given.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (PathBuf, String)>,
    ) -> Result<Self, WorkingSetError> {
        let files: BTreeMap<_, _> = entries
            .into_iter()
            .map(|(path, content)| (path, FileEntry::new(content)))
            .collect();
        if files.is_empty() {
            return Err(WorkingSetError::Empty);
        }
        Ok(Self {
            files,
            captured_at: chrono::Utc::now(),
        })
    }

    /// Whether the working set contains a path
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Entry for a path, if present
    #[inline]
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileEntry> {
        self.files.get(path)
    }

    /// Iterate paths in deterministic (lexicographic) order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Iterate entries in deterministic order
    pub fn entries(&self) -> impl Iterator<Item = (&Path, &FileEntry)> {
        self.files.iter().map(|(p, e)| (p.as_path(), e))
    }

    /// Number of files in the set
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set is empty (never true for a captured set)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Capture timestamp
    #[inline]
    #[must_use]
    pub fn captured_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.captured_at
    }
}

/// Errors capturing a working set
#[derive(Debug, thiserror::Error)]
pub enum WorkingSetError {
    /// No files supplied
    #[error("working set is empty")]
    Empty,

    /// A supplied path does not exist
    #[error("working set path does not exist: {0:?}")]
    MissingPath(PathBuf),

    /// Read failure
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
