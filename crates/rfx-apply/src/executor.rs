//! Atomic apply with rollback
//!
//! Lock -> snapshot -> write -> verify -> commit. Any failure after the
//! snapshot restores every touched path in reverse order; a failure
//! *during* restore is fatal and escalated, because a partially-restored
//! batch is worse than either extreme.

use crate::locks::{LockSet, PathLockTable};
use rfx_change::{ChangeDescriptor, ChangeKind, ContentHash, SessionId, Snapshot};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between a session and its in-flight apply
///
/// The executor checks the flag before its first write and again before
/// declaring commit; a supervening cancel turns the apply into a rollback
/// instead of committing into a cancelled session.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Fresh, uncancelled flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executor tuning
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Deadline for acquiring the whole lock set
    pub lock_timeout: Duration,
    /// Transient I/O retries per file before triggering rollback
    pub max_write_retries: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            max_write_retries: 2,
        }
    }
}

/// Failures during apply or rollback
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Could not acquire the lock set before the deadline
    #[error("lock acquisition timed out for {path:?}")]
    LockTimeout { path: PathBuf },

    /// I/O failure after retries
    #[error("i/o failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Permission errors are never retried
    #[error("permission denied on {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Re-read after write did not match the intended content
    #[error("write verification failed for {path:?}")]
    VerificationFailed { path: PathBuf },

    /// Supervening cancellation observed before commit
    #[error("apply aborted by cancellation")]
    Cancelled,

    /// Restore failed mid-rollback - the filesystem is suspect
    #[error("rollback failed restoring {path:?}: {source}")]
    RollbackFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutionError {
    /// Whether this failure left the filesystem in a suspect state
    #[inline]
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

/// Commit statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    /// Paths written or removed
    pub files_written: usize,
    /// Wall time of the locked section
    pub duration_ms: u64,
}

/// Result of a completed apply attempt
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Every write verified; locks released
    Committed(ApplySummary),
    /// A failure occurred and every file was restored
    RolledBack { cause: ExecutionError },
}

/// The one component that touches the filesystem
///
/// Governance has already passed by the time [`ApplyExecutor::apply_locked`]
/// runs; the executor performs no policy checks, only mechanical
/// snapshot/write/verify/restore work.
#[derive(Debug, Default)]
pub struct ApplyExecutor {
    locks: PathLockTable,
    config: ExecutorConfig,
}

impl ApplyExecutor {
    /// Executor with default tuning
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor with explicit tuning
    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            locks: PathLockTable::new(),
            config,
        }
    }

    /// Every on-disk path a batch touches, in lock order
    #[must_use]
    pub fn touched_paths(changes: &[ChangeDescriptor]) -> BTreeSet<PathBuf> {
        changes
            .iter()
            .flat_map(|d| d.touched_paths())
            .map(Path::to_path_buf)
            .collect()
    }

    /// Preflight for the `require_rollback_ready` governance rule
    ///
    /// A snapshot can be taken when no other session holds a lock on any
    /// touched path and every existing file is writable.
    pub async fn rollback_ready(&self, changes: &[ChangeDescriptor]) -> bool {
        for path in Self::touched_paths(changes) {
            if self.locks.is_locked(&path) {
                return false;
            }
            match tokio::fs::metadata(&path).await {
                Ok(meta) => {
                    if meta.permissions().readonly() {
                        return false;
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(_) => return false,
            }
        }
        true
    }

    /// Acquire the batch's lock set in sorted order
    ///
    /// # Errors
    /// [`ExecutionError::LockTimeout`] if the deadline passes; no file
    /// has been touched and nothing is held.
    pub async fn acquire(
        &self,
        changes: &[ChangeDescriptor],
        timeout: Option<Duration>,
    ) -> Result<LockSet, ExecutionError> {
        let paths = Self::touched_paths(changes);
        self.locks
            .acquire(&paths, timeout.unwrap_or(self.config.lock_timeout))
            .await
    }

    /// Acquire locks and run the full apply
    ///
    /// # Errors
    /// [`ExecutionError::LockTimeout`] before anything is touched, or
    /// [`ExecutionError::RollbackFailed`] if a restore failed.
    pub async fn apply(
        &self,
        session_id: SessionId,
        changes: &[ChangeDescriptor],
        cancel: &CancelFlag,
    ) -> Result<ApplyOutcome, ExecutionError> {
        let locks = self.acquire(changes, None).await?;
        self.apply_locked(locks, session_id, changes, cancel).await
    }

    /// Run snapshot -> write -> verify -> commit under already-held locks
    ///
    /// # Errors
    /// Only [`ExecutionError::RollbackFailed`] surfaces as `Err`; every
    /// other failure is handled by restoring the snapshot and returning
    /// [`ApplyOutcome::RolledBack`].
    pub async fn apply_locked(
        &self,
        locks: LockSet,
        session_id: SessionId,
        changes: &[ChangeDescriptor],
        cancel: &CancelFlag,
    ) -> Result<ApplyOutcome, ExecutionError> {
        let started = Instant::now();
        let _locks = locks;

        if cancel.is_cancelled() {
            return Ok(ApplyOutcome::RolledBack {
                cause: ExecutionError::Cancelled,
            });
        }

        // Snapshot every touched path before the first write.
        let mut snapshot = Snapshot::new(session_id);
        for path in Self::touched_paths(changes) {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => snapshot.record(path, Some(content)),
                Err(e) if e.kind() == ErrorKind::NotFound => snapshot.record(path, None),
                Err(source) => {
                    // Nothing written yet; the restore is a no-op.
                    return Ok(ApplyOutcome::RolledBack {
                        cause: ExecutionError::Io { path, source },
                    });
                }
            }
        }

        // Write phase.
        for descriptor in changes {
            if let Err(cause) = self.write_with_retry(descriptor, &snapshot).await {
                self.restore(&snapshot).await?;
                tracing::warn!(session = %session_id, %cause, "apply rolled back during write");
                return Ok(ApplyOutcome::RolledBack { cause });
            }
        }

        // Verify phase: re-read and compare.
        for descriptor in changes {
            if let Err(cause) = verify_change(descriptor, &snapshot).await {
                self.restore(&snapshot).await?;
                tracing::warn!(session = %session_id, %cause, "apply rolled back during verify");
                return Ok(ApplyOutcome::RolledBack { cause });
            }
        }

        // A cancel that raced the write phase must not commit.
        if cancel.is_cancelled() {
            self.restore(&snapshot).await?;
            return Ok(ApplyOutcome::RolledBack {
                cause: ExecutionError::Cancelled,
            });
        }

        let summary = ApplySummary {
            files_written: snapshot.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            session = %session_id,
            files = summary.files_written,
            "batch committed"
        );
        Ok(ApplyOutcome::Committed(summary))
    }

    async fn write_with_retry(
        &self,
        descriptor: &ChangeDescriptor,
        snapshot: &Snapshot,
    ) -> Result<(), ExecutionError> {
        let mut attempt = 0;
        loop {
            match write_change(descriptor, snapshot).await {
                Ok(()) => return Ok(()),
                Err((path, source)) if source.kind() == ErrorKind::PermissionDenied => {
                    return Err(ExecutionError::PermissionDenied { path });
                }
                Err((path, source)) => {
                    if attempt >= self.config.max_write_retries {
                        return Err(ExecutionError::Io { path, source });
                    }
                    attempt += 1;
                    tracing::debug!(?path, attempt, "transient write failure, retrying");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Restore every snapshotted path in reverse order
    ///
    /// Paths whose current state already matches the snapshot are left
    /// alone, so a batch that failed before touching a file never
    /// re-writes (or fails on) that file during restore.
    async fn restore(&self, snapshot: &Snapshot) -> Result<(), ExecutionError> {
        for (path, original) in snapshot.restore_order() {
            let current = match tokio::fs::read_to_string(path).await {
                Ok(content) => Some(content),
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(_) => None,
            };
            if current.as_deref() == original.as_deref() {
                continue;
            }
            let result = match original {
                Some(content) => {
                    if let Some(parent) = path.parent() {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                    tokio::fs::write(path, content).await
                }
                None => match tokio::fs::remove_file(path).await {
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(source) = result {
                tracing::error!(?path, %source, "rollback restore failed; filesystem suspect");
                return Err(ExecutionError::RollbackFailed {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
        Ok(())
    }
}

async fn write_change(
    descriptor: &ChangeDescriptor,
    snapshot: &Snapshot,
) -> Result<(), (PathBuf, std::io::Error)> {
    let path = descriptor.path.as_path();
    match descriptor.kind {
        ChangeKind::Create | ChangeKind::Modify => {
            let content = descriptor.new_content.as_deref().unwrap_or_default();
            write_file(path, content).await
        }
        ChangeKind::Delete => remove_file(path).await,
        ChangeKind::Rename => {
            let Some(target) = descriptor.target_path.as_deref() else {
                return Err((
                    path.to_path_buf(),
                    std::io::Error::new(ErrorKind::InvalidInput, "rename without target"),
                ));
            };
            let content = rename_content(descriptor, snapshot);
            write_file(target, &content).await?;
            remove_file(path).await
        }
    }
}

async fn verify_change(
    descriptor: &ChangeDescriptor,
    snapshot: &Snapshot,
) -> Result<(), ExecutionError> {
    match descriptor.kind {
        ChangeKind::Create | ChangeKind::Modify => {
            let expected = descriptor.new_content.as_deref().unwrap_or_default();
            verify_content(&descriptor.path, expected).await
        }
        ChangeKind::Delete => verify_absent(&descriptor.path).await,
        ChangeKind::Rename => {
            let Some(target) = descriptor.target_path.as_deref() else {
                return Err(ExecutionError::VerificationFailed {
                    path: descriptor.path.clone(),
                });
            };
            let expected = rename_content(descriptor, snapshot);
            verify_content(target, &expected).await?;
            verify_absent(&descriptor.path).await
        }
    }
}

fn rename_content(descriptor: &ChangeDescriptor, snapshot: &Snapshot) -> String {
    match &descriptor.new_content {
        Some(content) => content.clone(),
        None => snapshot
            .get(&descriptor.path)
            .and_then(|original| original.clone())
            .unwrap_or_default(),
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), (PathBuf, std::io::Error)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| (path.to_path_buf(), e))?;
        }
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| (path.to_path_buf(), e))
}

async fn remove_file(path: &Path) -> Result<(), (PathBuf, std::io::Error)> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err((path.to_path_buf(), e)),
    }
}

async fn verify_content(path: &Path, expected: &str) -> Result<(), ExecutionError> {
    let written = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| ExecutionError::VerificationFailed {
            path: path.to_path_buf(),
        })?;
    if ContentHash::of_content(&written) != ContentHash::of_content(expected) {
        return Err(ExecutionError::VerificationFailed {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

async fn verify_absent(path: &Path) -> Result<(), ExecutionError> {
    match tokio::fs::try_exists(path).await {
        Ok(false) => Ok(()),
        _ => Err(ExecutionError::VerificationFailed {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfx_change::RefactorKind;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[tokio::test]
    async fn apply_commits_full_batch() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.ts", "old a");
        let b = write(&dir, "b.ts", "old b");
        let c = dir.path().join("c.ts");

        let changes = vec![
            ChangeDescriptor::modify(&a, "new a", RefactorKind::LogicRewrite),
            ChangeDescriptor::delete(&b, RefactorKind::LogicRewrite),
            ChangeDescriptor::create(&c, "new c", RefactorKind::ExtractFunction),
        ];

        let executor = ApplyExecutor::new();
        let outcome = executor
            .apply(SessionId::new(), &changes, &CancelFlag::new())
            .await
            .unwrap();

        assert!(matches!(outcome, ApplyOutcome::Committed(_)));
        assert_eq!(read(&a), "new a");
        assert!(!b.exists());
        assert_eq!(read(&c), "new c");
    }

    #[tokio::test]
    async fn apply_rename_moves_content() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(&dir, "old.ts", "export const x = 1;");
        let new = dir.path().join("new.ts");

        let changes = vec![ChangeDescriptor::rename(
            &old,
            &new,
            None,
            RefactorKind::RenameSymbol,
        )];

        let executor = ApplyExecutor::new();
        let outcome = executor
            .apply(SessionId::new(), &changes, &CancelFlag::new())
            .await
            .unwrap();

        assert!(matches!(outcome, ApplyOutcome::Committed(_)));
        assert!(!old.exists());
        assert_eq!(read(&new), "export const x = 1;");
    }

    #[tokio::test]
    async fn pre_cancelled_apply_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.ts", "untouched");
        let changes = vec![ChangeDescriptor::modify(&a, "changed", RefactorKind::LogicRewrite)];

        let cancel = CancelFlag::new();
        cancel.cancel();

        let executor = ApplyExecutor::new();
        let outcome = executor
            .apply(SessionId::new(), &changes, &cancel)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ApplyOutcome::RolledBack {
                cause: ExecutionError::Cancelled
            }
        ));
        assert_eq!(read(&a), "untouched");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn permission_failure_rolls_back_whole_batch() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.ts", "old a");
        let locked = write(&dir, "locked.ts", "old locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o444)).unwrap();

        let changes = vec![
            ChangeDescriptor::modify(&a, "new a", RefactorKind::LogicRewrite),
            ChangeDescriptor::modify(&locked, "new locked", RefactorKind::LogicRewrite),
        ];

        let executor = ApplyExecutor::new();
        let outcome = executor
            .apply(SessionId::new(), &changes, &CancelFlag::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ApplyOutcome::RolledBack {
                cause: ExecutionError::PermissionDenied { .. }
            }
        ));
        // a.ts was written before the failure and must be restored
        assert_eq!(read(&a), "old a");
        assert_eq!(read(&locked), "old locked");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn readonly_file_fails_rollback_readiness() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = write(&dir, "locked.ts", "x");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o444)).unwrap();

        let changes = vec![ChangeDescriptor::modify(&locked, "y", RefactorKind::FormatOnly)];
        let executor = ApplyExecutor::new();
        assert!(!executor.rollback_ready(&changes).await);
    }

    #[tokio::test]
    async fn held_lock_fails_rollback_readiness() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.ts", "x");
        let changes = vec![ChangeDescriptor::modify(&a, "y", RefactorKind::FormatOnly)];

        let executor = ApplyExecutor::new();
        let _held = executor.acquire(&changes, None).await.unwrap();
        assert!(!executor.rollback_ready(&changes).await);
    }

    #[tokio::test]
    async fn contended_apply_times_out_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let shared = write(&dir, "shared.ts", "original");
        let changes = vec![ChangeDescriptor::modify(
            &shared,
            "contender",
            RefactorKind::LogicRewrite,
        )];

        let executor = ApplyExecutor::with_config(ExecutorConfig {
            lock_timeout: Duration::from_millis(50),
            ..ExecutorConfig::default()
        });
        let _held = executor.acquire(&changes, None).await.unwrap();

        let result = executor
            .apply(SessionId::new(), &changes, &CancelFlag::new())
            .await;
        assert!(matches!(result, Err(ExecutionError::LockTimeout { .. })));
        assert_eq!(read(&shared), "original");
    }
}
