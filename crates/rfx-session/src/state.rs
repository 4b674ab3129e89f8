//! Session lifecycle state machine
//!
//! `Created -> Editing -> Validating -> (Blocked | AwaitingReview |
//! Applying) -> (Committed | RolledBack)`, with `Cancelled` reachable
//! from any non-terminal state and `CorruptionSuspected` entered only
//! when a rollback itself fails. `Blocked` and `AwaitingReview` re-enter
//! `Editing` when the caller supplies revised descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Freshly started, not yet accepting edits
    Created,
    /// Accumulating change descriptors
    Editing,
    /// Consistency/confidence/governance evaluation in progress
    Validating,
    /// Refused by consistency or governance; revisable
    Blocked,
    /// Governance requires a human decision; revisable
    AwaitingReview,
    /// Executor is writing the batch
    Applying,
    /// Batch durably applied - terminal
    Committed,
    /// Batch restored after a failure - terminal
    RolledBack,
    /// Caller abandoned the session - terminal
    Cancelled,
    /// A rollback failed; manual intervention required - terminal
    CorruptionSuspected,
}

impl SessionState {
    /// Whether the state admits no further transitions
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Committed | Self::RolledBack | Self::Cancelled | Self::CorruptionSuspected
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Editing => write!(f, "editing"),
            Self::Validating => write!(f, "validating"),
            Self::Blocked => write!(f, "blocked"),
            Self::AwaitingReview => write!(f, "awaiting-review"),
            Self::Applying => write!(f, "applying"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled-back"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::CorruptionSuspected => write!(f, "corruption-suspected"),
        }
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SessionState) -> Vec<SessionState> {
    use SessionState::*;
    match from {
        Created => vec![Editing, Cancelled],
        Editing => vec![Validating, Cancelled],
        // Validating -> Editing is the lock-timeout path: a lock
        // conflict is not a governance denial.
        Validating => vec![Blocked, AwaitingReview, Applying, Editing, Cancelled],
        Blocked => vec![Editing, Cancelled],
        AwaitingReview => vec![Editing, Cancelled],
        Applying => vec![Committed, RolledBack, CorruptionSuspected, Cancelled],
        Committed | RolledBack | Cancelled | CorruptionSuspected => vec![],
    }
}

/// Validate a state transition
///
/// # Errors
/// Returns [`TransitionError::Illegal`] if the transition is not in the
/// table.
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError::Illegal { from, to })
    }
}

/// Illegal state machine use
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The transition is not in the table
    #[error("illegal session transition: {from} -> {to}")]
    Illegal { from: SessionState, to: SessionState },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_reaches_validating() {
        assert!(validate_transition(SessionState::Editing, SessionState::Validating).is_ok());
        assert!(validate_transition(SessionState::Editing, SessionState::Applying).is_err());
    }

    #[test]
    fn blocked_reenters_editing() {
        assert!(validate_transition(SessionState::Blocked, SessionState::Editing).is_ok());
        assert!(validate_transition(SessionState::AwaitingReview, SessionState::Editing).is_ok());
    }

    #[test]
    fn cancelled_from_every_non_terminal() {
        use SessionState::*;
        for from in [Created, Editing, Validating, Blocked, AwaitingReview, Applying] {
            assert!(
                validate_transition(from, Cancelled).is_ok(),
                "cancel must be reachable from {from}"
            );
        }
    }

    #[test]
    fn terminal_states_admit_nothing() {
        use SessionState::*;
        for from in [Committed, RolledBack, Cancelled, CorruptionSuspected] {
            assert!(from.is_terminal());
            assert!(allowed_transitions(from).is_empty());
        }
    }

    #[test]
    fn corruption_only_from_applying() {
        use SessionState::*;
        for from in [Created, Editing, Validating, Blocked, AwaitingReview] {
            assert!(validate_transition(from, CorruptionSuspected).is_err());
        }
        assert!(validate_transition(Applying, CorruptionSuspected).is_ok());
    }
}
