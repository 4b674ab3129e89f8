//! Cross-file consistency validation
//!
//! Given the live change set and the session's dependency graph,
//! determines which additional files must co-change and whether the
//! proposed batch leaves references resolvable. Pure evaluation over a
//! session snapshot - never mutates, recomputed per validation pass.

use crate::graph::{resolve_against, DependencyGraph, GraphError};
use crate::reference::{FileReferences, ReferenceProvider};
use rfx_change::{ChangeDescriptor, ChangeKind, WorkingSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A reference that would no longer resolve after the batch
///
/// `symbol` is `"*"` when a whole-file import breaks (the target is
/// deleted or renamed away) rather than one named symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrokenReference {
    /// File holding the dangling reference
    pub from: PathBuf,
    /// File the reference points at
    pub to: PathBuf,
    /// Symbol that fails to resolve
    pub symbol: String,
}

/// Result of one consistency pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Whether the batch is internally consistent
    pub consistent: bool,
    /// Files that must also change but carry no live descriptor
    pub missing_co_changes: Vec<PathBuf>,
    /// References left dangling by the batch
    pub broken_references: Vec<BrokenReference>,
}

impl ConsistencyReport {
    /// Report for a trivially consistent batch
    #[must_use]
    pub fn consistent() -> Self {
        Self {
            consistent: true,
            ..Self::default()
        }
    }
}

/// Validate a change batch against the dependency graph
///
/// Deletes (and renames, which are delete-old + create-new) demand a
/// co-change descriptor from every dependent of the removed path.
/// Modifications that drop exported symbols demand co-changes from the
/// dependents using those symbols. Files that do carry a descriptor get
/// a structural re-check of their proposed content instead.
///
/// # Errors
/// Returns error if the provider fails extracting any proposed content.
pub fn validate(
    changes: &[ChangeDescriptor],
    graph: &DependencyGraph,
    working_set: &WorkingSet,
    provider: &dyn ReferenceProvider,
) -> Result<ConsistencyReport, GraphError> {
    let by_path: BTreeMap<&Path, &ChangeDescriptor> =
        changes.iter().map(|d| (d.path.as_path(), d)).collect();

    let old_universe: BTreeSet<&Path> = working_set.paths().collect();
    let effective_universe = effective_paths(changes, working_set);
    let effective_refs = extract_effective(changes, working_set, provider)?;

    let mut missing: BTreeSet<PathBuf> = BTreeSet::new();
    let mut broken: BTreeSet<BrokenReference> = BTreeSet::new();

    for descriptor in changes {
        let path = descriptor.path.as_path();
        match descriptor.kind {
            ChangeKind::Delete | ChangeKind::Rename => {
                // Every dependent of the removed path must co-change.
                for dep in graph.dependents(path) {
                    if dep.as_path() != path && !by_path.contains_key(dep.as_path()) {
                        missing.insert(dep);
                    }
                }
            }
            ChangeKind::Modify => {
                let new_exports = effective_refs
                    .get(path)
                    .map(|(_, refs)| refs.exported_symbols.clone())
                    .unwrap_or_default();
                let removed: BTreeSet<String> = graph
                    .exported_symbols(path)
                    .difference(&new_exports)
                    .cloned()
                    .collect();
                if removed.is_empty() {
                    continue;
                }
                for usage in graph.usages_of(path) {
                    if !removed.contains(&usage.symbol) {
                        continue;
                    }
                    let dep = usage.referencing_path.as_path();
                    match by_path.get(dep) {
                        None => {
                            missing.insert(dep.to_path_buf());
                        }
                        Some(_) => {
                            // Dependent carries a descriptor: its proposed
                            // content must no longer consume the symbol.
                            if let Some((_, dep_refs)) = effective_refs.get(dep) {
                                if dep_refs.used_symbols.contains(&usage.symbol) {
                                    broken.insert(BrokenReference {
                                        from: dep.to_path_buf(),
                                        to: path.to_path_buf(),
                                        symbol: usage.symbol.clone(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
            ChangeKind::Create => {}
        }
    }

    // Imports in proposed content that used to resolve inside the working
    // set must still resolve after the batch. Specifiers that never
    // resolved (external packages) are not ours to judge.
    for (original_path, (effective_path, refs)) in &effective_refs {
        for spec in &refs.imports {
            let Some(old_target) = resolve_against(effective_path, spec, &old_universe)
                .or_else(|| resolve_against(original_path, spec, &old_universe))
            else {
                continue;
            };
            let survives = effective_universe.contains(&old_target);
            if !survives {
                broken.insert(BrokenReference {
                    from: effective_path.clone(),
                    to: old_target,
                    symbol: "*".to_string(),
                });
            }
        }
    }

    let report = ConsistencyReport {
        consistent: missing.is_empty() && broken.is_empty(),
        missing_co_changes: missing.into_iter().collect(),
        broken_references: broken.into_iter().collect(),
    };
    if !report.consistent {
        tracing::debug!(
            missing = report.missing_co_changes.len(),
            broken = report.broken_references.len(),
            "consistency pass found gaps"
        );
    }
    Ok(report)
}

/// Path universe after the batch is applied
fn effective_paths(changes: &[ChangeDescriptor], working_set: &WorkingSet) -> BTreeSet<PathBuf> {
    let mut paths: BTreeSet<PathBuf> = working_set.paths().map(Path::to_path_buf).collect();
    for descriptor in changes {
        match descriptor.kind {
            ChangeKind::Delete => {
                paths.remove(&descriptor.path);
            }
            ChangeKind::Rename => {
                paths.remove(&descriptor.path);
                if let Some(target) = &descriptor.target_path {
                    paths.insert(target.clone());
                }
            }
            ChangeKind::Create => {
                paths.insert(descriptor.path.clone());
            }
            ChangeKind::Modify => {}
        }
    }
    paths
}

/// Extract references from every descriptor's proposed content
///
/// Keyed by the descriptor's (source) path; the value carries the
/// effective post-batch path (the rename target where applicable) plus
/// the extraction result. Renames without replacement content keep the
/// original content at the new location.
fn extract_effective(
    changes: &[ChangeDescriptor],
    working_set: &WorkingSet,
    provider: &dyn ReferenceProvider,
) -> Result<BTreeMap<PathBuf, (PathBuf, FileReferences)>, GraphError> {
    let mut out = BTreeMap::new();
    for descriptor in changes {
        if descriptor.kind == ChangeKind::Delete {
            continue;
        }
        let effective_path = match (&descriptor.kind, &descriptor.target_path) {
            (ChangeKind::Rename, Some(target)) => target.clone(),
            _ => descriptor.path.clone(),
        };
        let carried_over;
        let content = match &descriptor.new_content {
            Some(content) => content.as_str(),
            None => {
                let Some(entry) = working_set.get(&descriptor.path) else {
                    continue;
                };
                carried_over = entry.content.clone();
                carried_over.as_str()
            }
        };
        let refs = provider.references(&effective_path, content)?;
        out.insert(descriptor.path.clone(), (effective_path, refs));
    }
    Ok(out)
}
