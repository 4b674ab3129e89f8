//! RFX Change Data Model
//!
//! Typed building blocks for multi-file refactoring transactions.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: 32-byte Blake3 hash for content fingerprinting
//! - [`ChangeDescriptor`]: one proposed edit to one file
//! - [`WorkingSet`]: the files a session operates over, captured at start
//! - [`Snapshot`]: pre-apply contents backing rollback
//! - [`SessionId`]: the key every other component addresses by

mod descriptor;
mod hash;
mod session_id;
mod snapshot;
mod working_set;

pub use descriptor::{ChangeDescriptor, ChangeError, ChangeKind, RefactorKind};
pub use hash::{ContentHash, HashError};
pub use session_id::SessionId;
pub use snapshot::Snapshot;
pub use working_set::{FileEntry, WorkingSet, WorkingSetError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
