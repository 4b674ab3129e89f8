//! RFX Dependency Graph
//!
//! Derives a bidirectional file-reference graph for a session's working
//! set and validates change batches against it.
//!
//! # Core Concepts
//!
//! - [`ReferenceProvider`]: the external indexer seam
//! - [`DependencyGraph`]: bidirectional edges with incremental updates
//! - [`consistency::validate`]: co-change and broken-reference detection
//! - [`RegexReferenceExtractor`]: bundled lightweight provider

pub mod consistency;
mod extract;
mod graph;
mod reference;

pub use consistency::{BrokenReference, ConsistencyReport};
pub use extract::RegexReferenceExtractor;
pub use graph::{resolve_against, DependencyGraph, GraphError};
pub use reference::{FileReferences, ReferenceError, ReferenceProvider, SymbolUsage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
