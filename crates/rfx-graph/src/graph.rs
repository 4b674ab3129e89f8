//! File dependency graph
//!
//! Bidirectional file-to-file reference edges derived from per-file
//! extraction. Built once per session from the working set; modify/delete
//! of an existing file re-derives only that file's own edges, while a
//! create/rename (a change to the path universe) triggers a rebuild.

use crate::reference::{FileReferences, ReferenceError, ReferenceProvider, SymbolUsage};
use rfx_change::WorkingSet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

/// Extensions tried when resolving an extensionless import specifier
const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "rs", "py"];

/// Bidirectional file dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Raw extraction result per file
    refs: BTreeMap<PathBuf, FileReferences>,
    /// file -> files it references (resolved imports)
    forward: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// file -> files referencing it
    reverse: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DependencyGraph {
    /// Build the graph for a working set
    ///
    /// # Errors
    /// Returns error if the provider fails on any file.
    pub fn build(
        working_set: &WorkingSet,
        provider: &dyn ReferenceProvider,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::default();
        for (path, entry) in working_set.entries() {
            let refs = provider.references(path, &entry.content)?;
            graph.refs.insert(path.to_path_buf(), refs);
        }
        graph.relink_all();
        tracing::debug!(
            files = graph.refs.len(),
            edges = graph.edge_count(),
            "dependency graph built"
        );
        Ok(graph)
    }

    /// Re-derive a single file's own edges from new content
    ///
    /// Edges *into* the file (who references it) are untouched; only the
    /// file's outgoing imports are recomputed. This is the incremental
    /// path for `modify` descriptors.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownFile`] if the file is not in the
    /// graph, or the provider's error.
    pub fn update_file(
        &mut self,
        path: &Path,
        content: &str,
        provider: &dyn ReferenceProvider,
    ) -> Result<(), GraphError> {
        if !self.refs.contains_key(path) {
            return Err(GraphError::UnknownFile(path.to_path_buf()));
        }
        let refs = provider.references(path, content)?;
        self.unlink_outgoing(path);
        self.refs.insert(path.to_path_buf(), refs);
        self.link_outgoing(path);
        Ok(())
    }

    /// Add a file that entered scope and derive its outgoing edges
    ///
    /// Existing files that previously failed to resolve an import to
    /// this path are not re-linked; a change to the path universe is a
    /// rebuild trigger for callers that need importer re-resolution.
    ///
    /// # Errors
    /// Returns the provider's error.
    pub fn add_file(
        &mut self,
        path: &Path,
        content: &str,
        provider: &dyn ReferenceProvider,
    ) -> Result<(), GraphError> {
        let refs = provider.references(path, content)?;
        self.refs.insert(path.to_path_buf(), refs);
        self.link_outgoing(path);
        Ok(())
    }

    /// Remove a file and both edge directions touching it
    pub fn remove_file(&mut self, path: &Path) {
        self.unlink_outgoing(path);
        self.refs.remove(path);
        self.forward.remove(path);
        // Dangling imports of the removed file stay in the importers'
        // forward sets; the reverse entry is dropped with the node.
        if let Some(dependents) = self.reverse.remove(path) {
            for dep in dependents {
                if let Some(fwd) = self.forward.get_mut(&dep) {
                    fwd.remove(path);
                }
            }
        }
    }

    /// Files that `path` references
    #[must_use]
    pub fn dependencies(&self, path: &Path) -> BTreeSet<PathBuf> {
        self.forward.get(path).cloned().unwrap_or_default()
    }

    /// Files that reference `path`
    #[must_use]
    pub fn dependents(&self, path: &Path) -> BTreeSet<PathBuf> {
        self.reverse.get(path).cloned().unwrap_or_default()
    }

    /// Symbols `path` exports, as extracted
    #[must_use]
    pub fn exported_symbols(&self, path: &Path) -> BTreeSet<String> {
        self.refs
            .get(path)
            .map(|r| r.exported_symbols.clone())
            .unwrap_or_default()
    }

    /// Symbols `path` consumes from its imports
    #[must_use]
    pub fn used_symbols(&self, path: &Path) -> BTreeSet<String> {
        self.refs
            .get(path)
            .map(|r| r.used_symbols.clone())
            .unwrap_or_default()
    }

    /// Uses of `path`'s exported symbols by its dependents
    #[must_use]
    pub fn usages_of(&self, path: &Path) -> Vec<SymbolUsage> {
        let Some(exports) = self.refs.get(path).map(|r| &r.exported_symbols) else {
            return Vec::new();
        };
        let mut usages = Vec::new();
        for dep in self.dependents(path) {
            if let Some(dep_refs) = self.refs.get(&dep) {
                for symbol in dep_refs.used_symbols.intersection(exports) {
                    usages.push(SymbolUsage {
                        symbol: symbol.clone(),
                        referencing_path: dep.clone(),
                    });
                }
            }
        }
        usages
    }

    /// Resolve an import specifier against this graph's path universe
    #[must_use]
    pub fn resolve_import(&self, importer: &Path, spec: &Path) -> Option<PathBuf> {
        let universe: BTreeSet<&Path> = self.refs.keys().map(PathBuf::as_path).collect();
        resolve_against(importer, spec, &universe)
    }

    /// Whether the graph holds a node for `path`
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.refs.contains_key(path)
    }

    /// Node count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether the graph is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Total resolved edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    fn relink_all(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        let paths: Vec<PathBuf> = self.refs.keys().cloned().collect();
        for path in paths {
            self.link_outgoing(&path);
        }
    }

    fn link_outgoing(&mut self, path: &Path) {
        let universe: BTreeSet<&Path> = self.refs.keys().map(PathBuf::as_path).collect();
        let Some(refs) = self.refs.get(path) else {
            return;
        };
        let resolved: BTreeSet<PathBuf> = refs
            .imports
            .iter()
            .filter_map(|spec| resolve_against(path, spec, &universe))
            .filter(|target| target != path)
            .collect();
        for target in &resolved {
            self.reverse
                .entry(target.clone())
                .or_default()
                .insert(path.to_path_buf());
        }
        self.forward.insert(path.to_path_buf(), resolved);
    }

    fn unlink_outgoing(&mut self, path: &Path) {
        if let Some(old) = self.forward.remove(path) {
            for target in old {
                if let Some(rev) = self.reverse.get_mut(&target) {
                    rev.remove(path);
                }
            }
        }
    }
}

/// Resolve a specifier relative to its importer against a path universe
///
/// Tries the specifier as written, then relative to the importer's
/// directory, then both with common extensions appended.
#[must_use]
pub fn resolve_against(importer: &Path, spec: &Path, universe: &BTreeSet<&Path>) -> Option<PathBuf> {
    let relative = importer
        .parent()
        .map(|dir| normalize(&dir.join(spec)))
        .unwrap_or_else(|| normalize(spec));
    let candidates = [normalize(spec), relative];

    for candidate in &candidates {
        if universe.contains(candidate.as_path()) {
            return Some(candidate.clone());
        }
        if candidate.extension().is_none() {
            for ext in RESOLVE_EXTENSIONS {
                let with_ext = candidate.with_extension(ext);
                if universe.contains(with_ext.as_path()) {
                    return Some(with_ext);
                }
            }
        }
    }
    None
}

/// Collapse `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Errors building or updating the graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Incremental update on a file the graph does not hold
    #[error("file not in dependency graph: {0:?}")]
    UnknownFile(PathBuf),

    /// Extraction failure
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}
