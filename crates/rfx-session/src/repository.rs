//! Session repository
//!
//! The explicit registry replacing ambient global state: creation, read,
//! and terminal-state archival all flow through this narrow interface,
//! owned by the session manager. Each entry pairs the session (behind an
//! async mutex, linearizing same-session operations) with a cancel flag
//! readable outside that mutex, so cancellation can reach an in-flight
//! apply.

use crate::session::Session;
use rfx_apply::CancelFlag;
use rfx_change::SessionId;
use std::sync::Arc;

/// Registry entry: the session plus its out-of-band cancel flag
#[derive(Debug)]
pub struct SessionEntry {
    /// The aggregate, linearized per session
    pub session: tokio::sync::Mutex<Session>,
    /// Settable without the session lock; the executor checks it
    /// before committing
    pub cancel: CancelFlag,
}

/// Shared handle to one registry entry
pub type SessionHandle = Arc<SessionEntry>;

/// Narrow persistence seam for sessions
///
/// The in-memory implementation backs tests and single-process use; a
/// durable backend implements the same trait.
#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync + std::fmt::Debug {
    /// Register a new session, returning its handle
    async fn insert(&self, session: Session) -> SessionHandle;

    /// Look up a session by id
    async fn get(&self, id: SessionId) -> Option<SessionHandle>;

    /// Every registered session id
    async fn ids(&self) -> Vec<SessionId>;
}

/// DashMap-backed repository for single-process deployments
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: dashmap::DashMap<SessionId, SessionHandle>,
}

impl InMemorySessionRepository {
    /// Empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id;
        let handle = Arc::new(SessionEntry {
            session: tokio::sync::Mutex::new(session),
            cancel: CancelFlag::new(),
        });
        self.sessions.insert(id, handle.clone());
        handle
    }

    async fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    async fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfx_change::WorkingSet;
    use rfx_policy::PolicyConfig;
    use std::path::PathBuf;

    fn session() -> Session {
        let ws = WorkingSet::from_entries([(PathBuf::from("a.ts"), "x".to_string())]).unwrap();
        Session::new(ws, PolicyConfig::permissive())
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let repo = InMemorySessionRepository::new();
        let s = session();
        let id = s.id;
        repo.insert(s).await;

        let handle = repo.get(id).await.unwrap();
        assert_eq!(handle.session.lock().await.id, id);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let repo = InMemorySessionRepository::new();
        assert!(repo.get(SessionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn cancel_flag_reachable_without_session_lock() {
        let repo = InMemorySessionRepository::new();
        let s = session();
        let id = s.id;
        repo.insert(s).await;

        let handle = repo.get(id).await.unwrap();
        let _guard = handle.session.lock().await;
        // The flag is outside the mutex: no deadlock while held.
        handle.cancel.cancel();
        assert!(handle.cancel.is_cancelled());
    }
}
