//! Pre-apply snapshots for rollback
//!
//! Captured immediately before the executor writes a batch, discarded
//! after a successful commit, consumed on rollback.

use crate::session_id::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Pre-apply content of every path a batch touches
///
/// `None` marks a path that did not exist before the apply (a file the
/// batch creates); rollback removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    session_id: SessionId,
    files: BTreeMap<PathBuf, Option<String>>,
    taken_at: chrono::DateTime<chrono::Utc>,
}

impl Snapshot {
    /// Create an empty snapshot for a session
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            files: BTreeMap::new(),
            taken_at: chrono::Utc::now(),
        }
    }

    /// Record a path's pre-apply content (`None` if it did not exist)
    pub fn record(&mut self, path: impl Into<PathBuf>, content: Option<String>) {
        self.files.insert(path.into(), content);
    }

    /// Owning session
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Pre-apply content for a path, if recorded
    #[inline]
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&Option<String>> {
        self.files.get(path)
    }

    /// Paths in reverse lexicographic order - the restore order
    pub fn restore_order(&self) -> impl Iterator<Item = (&Path, &Option<String>)> {
        self.files.iter().rev().map(|(p, c)| (p.as_path(), c))
    }

    /// Number of recorded paths
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_records_absence() {
        let mut snap = Snapshot::new(SessionId::new());
        snap.record("created.ts", None);
        snap.record("existing.ts", Some("old".to_string()));

        assert_eq!(snap.get(Path::new("created.ts")), Some(&None));
        assert_eq!(
            snap.get(Path::new("existing.ts")),
            Some(&Some("old".to_string()))
        );
    }

    #[test]
    fn snapshot_restore_order_is_reversed() {
        let mut snap = Snapshot::new(SessionId::new());
        snap.record("a.ts", None);
        snap.record("b.ts", None);
        snap.record("c.ts", None);

        let order: Vec<_> = snap.restore_order().map(|(p, _)| p).collect();
        assert_eq!(
            order,
            vec![Path::new("c.ts"), Path::new("b.ts"), Path::new("a.ts")]
        );
    }
}
