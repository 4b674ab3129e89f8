//! RFX Atomic Apply/Rollback Executor
//!
//! Durably snapshots pre-change contents, applies a full batch under
//! ordered per-path locks, verifies every write, and restores the
//! snapshot on any failure.
//!
//! # Core Concepts
//!
//! - [`PathLockTable`]: lexicographic-order lock acquisition, no deadlock
//! - [`ApplyExecutor`]: snapshot -> write -> verify -> commit | rollback
//! - [`CancelFlag`]: supervening cancellation observed before commit

mod executor;
mod locks;

pub use executor::{
    ApplyExecutor, ApplyOutcome, ApplySummary, CancelFlag, ExecutionError, ExecutorConfig,
};
pub use locks::{LockSet, PathLockTable};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
