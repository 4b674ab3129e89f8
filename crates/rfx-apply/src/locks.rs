//! Per-path lock table
//!
//! The sole serialization point between sessions whose batches overlap.
//! Locks are acquired in lexicographic path order under one deadline, so
//! two sessions touching files A and B in different orders cannot
//! deadlock; a timeout fails the whole acquisition before any file is
//! touched.

use crate::executor::ExecutionError;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per path, created on first use
#[derive(Debug, Default)]
pub struct PathLockTable {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl PathLockTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Acquire every path in sorted order under one deadline
    ///
    /// The returned [`LockSet`] releases all locks on drop. Already-held
    /// guards are dropped on timeout, so a failed acquisition leaves
    /// nothing held.
    ///
    /// # Errors
    /// Returns [`ExecutionError::LockTimeout`] naming the path that
    /// could not be acquired before the deadline.
    pub async fn acquire(
        &self,
        paths: &BTreeSet<PathBuf>,
        timeout: Duration,
    ) -> Result<LockSet, ExecutionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut guards = Vec::with_capacity(paths.len());
        for path in paths {
            let lock = self.lock_for(path);
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    tracing::warn!(?path, "lock acquisition timed out");
                    return Err(ExecutionError::LockTimeout { path: path.clone() });
                }
            }
        }
        Ok(LockSet { _guards: guards })
    }

    /// Whether some holder currently has `path` locked
    ///
    /// A probe, not an acquisition: used by the rollback-readiness
    /// preflight without blocking the caller.
    #[must_use]
    pub fn is_locked(&self, path: &Path) -> bool {
        match self.locks.get(path) {
            Some(lock) => lock.try_lock().is_err(),
            None => false,
        }
    }
}

/// Held locks for one apply; releasing is dropping
#[derive(Debug)]
pub struct LockSet {
    _guards: Vec<OwnedMutexGuard<()>>,
}
