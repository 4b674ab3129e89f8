//! Engine error taxonomy
//!
//! Bad input surfaces synchronously as [`ValidationError`]. Consistency
//! gaps and governance denials are ordinary outcomes, not errors - the
//! session lands in a revisable state and the caller gets structured
//! reasons. Execution failures resolve to a rolled-back session. Only a
//! failed rollback propagates as a hard failure, because the filesystem
//! can no longer be trusted.

use crate::state::{SessionState, TransitionError};
use rfx_apply::ExecutionError;
use rfx_change::{ChangeError, SessionId, WorkingSetError};
use rfx_graph::GraphError;
use rfx_policy::PolicyConfigError;
use std::path::PathBuf;

/// Synchronous bad-input failures; never retried
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Working set empty or unreadable
    #[error("invalid working set: {0}")]
    WorkingSet(#[from] WorkingSetError),

    /// Contradictory policy configuration
    #[error("invalid policy config: {0}")]
    PolicyConfig(#[from] PolicyConfigError),

    /// Unknown session id
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Mutation attempted on a terminal session
    #[error("session {id} is terminal ({state})")]
    SessionTerminal { id: SessionId, state: SessionState },

    /// Operation not valid in the session's current state
    #[error("session {id} cannot {operation} from state {state}")]
    InvalidState {
        id: SessionId,
        state: SessionState,
        operation: &'static str,
    },

    /// Apply requested with no live descriptors
    #[error("session {0} has no live changes to apply")]
    NoLiveChanges(SessionId),

    /// Malformed change descriptor
    #[error("invalid change descriptor: {0}")]
    ChangeShape(#[from] ChangeError),

    /// Non-create descriptor for a path the working set does not hold
    #[error("path {path:?} outside working set (only create may add paths)")]
    OutsideWorkingSet { path: PathBuf },
}

/// Umbrella error crossing the engine boundary
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad input
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Indexer/graph failure
    #[error("dependency graph error: {0}")]
    Graph(#[from] GraphError),

    /// State machine misuse (engine bug if it ever surfaces)
    #[error("state machine error: {0}")]
    Transition(#[from] TransitionError),

    /// Rollback failed: the session is flagged and an operator must act
    #[error("rollback failure in session {session}: {source}")]
    RollbackFailure {
        session: SessionId,
        #[source]
        source: ExecutionError,
    },
}

impl EngineError {
    /// Whether the caller can recover by adjusting input and retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::RollbackFailure { .. })
    }

    /// Whether an operator must inspect the filesystem before anything
    /// else touches the affected paths
    #[inline]
    #[must_use]
    pub fn requires_operator(&self) -> bool {
        matches!(self, Self::RollbackFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_failure_is_not_recoverable() {
        let err = EngineError::RollbackFailure {
            session: SessionId::new(),
            source: ExecutionError::RollbackFailed {
                path: "a.ts".into(),
                source: std::io::Error::other("disk gone"),
            },
        };
        assert!(!err.is_recoverable());
        assert!(err.requires_operator());
    }

    #[test]
    fn validation_errors_are_recoverable() {
        let err = EngineError::Validation(ValidationError::SessionNotFound(SessionId::new()));
        assert!(err.is_recoverable());
        assert!(!err.requires_operator());
    }
}
