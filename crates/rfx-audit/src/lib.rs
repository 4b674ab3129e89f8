//! RFX Audit Log
//!
//! Immutable, append-only record of every governance decision and every
//! apply/rollback, keyed by session id with a monotonically increasing
//! per-session sequence number. Entries are hash-chained so tampering
//! is detectable after the fact.

use parking_lot::Mutex;
use rfx_change::SessionId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What an audit entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Session state transition
    Transition,
    /// Governance policy decision
    Decision,
    /// Batch committed to disk
    Apply,
    /// Batch rolled back
    Rollback,
}

/// One immutable audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Owning session
    pub session_id: SessionId,
    /// Monotone per-session sequence number, starting at 1
    pub sequence: u64,
    /// Append timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Entry classification
    pub kind: AuditKind,
    /// What happened (e.g. `editing -> validating`)
    pub action: String,
    /// Outcome or detail (e.g. `deny: min_confidence`)
    pub result: String,
    /// Hash of the previous entry in the global chain
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

/// Append-only, hash-chained audit log
///
/// Safe for concurrent writers from multiple sessions; each append is a
/// single short critical section.
#[derive(Debug, Default)]
pub struct AuditLog {
    inner: Mutex<Vec<AuditEvent>>,
    sequences: dashmap::DashMap<SessionId, u64>,
}

impl AuditLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry, returning its per-session sequence number
    pub fn append(
        &self,
        session_id: SessionId,
        kind: AuditKind,
        action: impl Into<String>,
        result: impl Into<String>,
    ) -> u64 {
        let sequence = {
            let mut entry = self.sequences.entry(session_id).or_insert(0);
            *entry += 1;
            *entry
        };
        let mut event = AuditEvent {
            session_id,
            sequence,
            timestamp: chrono::Utc::now(),
            kind,
            action: action.into(),
            result: result.into(),
            prev_hash: [0u8; 32],
            hash: [0u8; 32],
        };
        let mut guard = self.inner.lock();
        event.prev_hash = guard.last().map(|e| e.hash).unwrap_or([0u8; 32]);
        event.hash = compute_hash(&event);
        guard.push(event);
        sequence
    }

    /// All entries, in append order
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().clone()
    }

    /// Entries for one session, in sequence order
    #[must_use]
    pub fn events_for_session(&self, session_id: SessionId) -> Vec<AuditEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Highest sequence number appended for a session (0 if none)
    #[must_use]
    pub fn sequence_high_water(&self, session_id: SessionId) -> u64 {
        self.sequences.get(&session_id).map(|s| *s).unwrap_or(0)
    }

    /// Walk the chain and verify every link and entry hash
    ///
    /// # Errors
    /// Returns [`AuditError::IntegrityViolation`] at the first bad link.
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for event in guard.iter() {
            if event.prev_hash != prev {
                return Err(AuditError::IntegrityViolation {
                    sequence: event.sequence,
                });
            }
            if event.hash != compute_hash(event) {
                return Err(AuditError::IntegrityViolation {
                    sequence: event.sequence,
                });
            }
            prev = event.hash;
        }
        Ok(())
    }

    /// Total entry count
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

fn compute_hash(event: &AuditEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.session_id.as_uuid().as_bytes());
    hasher.update(event.sequence.to_le_bytes());
    hasher.update(event.timestamp.timestamp_micros().to_le_bytes());
    hasher.update([match event.kind {
        AuditKind::Transition => 0u8,
        AuditKind::Decision => 1,
        AuditKind::Apply => 2,
        AuditKind::Rollback => 3,
    }]);
    hasher.update(event.action.as_bytes());
    hasher.update([0]);
    hasher.update(event.result.as_bytes());
    hasher.update([0]);
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}

/// Audit log failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// A chain link or entry hash does not verify
    #[error("audit chain integrity violation at sequence {sequence}")]
    IntegrityViolation { sequence: u64 },
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_per_session_sequences() {
        let log = AuditLog::new();
        let a = SessionId::new();
        let b = SessionId::new();

        assert_eq!(log.append(a, AuditKind::Transition, "created -> editing", "ok"), 1);
        assert_eq!(log.append(b, AuditKind::Transition, "created -> editing", "ok"), 1);
        assert_eq!(log.append(a, AuditKind::Decision, "apply", "allow"), 2);

        assert_eq!(log.sequence_high_water(a), 2);
        assert_eq!(log.sequence_high_water(b), 1);
    }

    #[test]
    fn events_for_session_filters() {
        let log = AuditLog::new();
        let a = SessionId::new();
        let b = SessionId::new();
        log.append(a, AuditKind::Transition, "t", "ok");
        log.append(b, AuditKind::Transition, "t", "ok");
        log.append(a, AuditKind::Apply, "apply", "committed");

        let events = log.events_for_session(a);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.session_id == a));
    }

    #[test]
    fn chain_verifies_when_untouched() {
        let log = AuditLog::new();
        let id = SessionId::new();
        for i in 0..10 {
            log.append(id, AuditKind::Transition, format!("step {i}"), "ok");
        }
        assert!(log.verify_integrity().is_ok());
    }

    #[test]
    fn chain_links_consecutive_entries() {
        let log = AuditLog::new();
        let id = SessionId::new();
        log.append(id, AuditKind::Transition, "a", "ok");
        log.append(id, AuditKind::Transition, "b", "ok");

        let events = log.events();
        assert_eq!(events[1].prev_hash, events[0].hash);
        assert_ne!(events[0].hash, events[1].hash);
    }

    #[test]
    fn concurrent_appends_keep_chain_intact() {
        let log = std::sync::Arc::new(AuditLog::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                let id = SessionId::new();
                for i in 0..50 {
                    log.append(id, AuditKind::Decision, format!("d{i}"), "allow");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 200);
        assert!(log.verify_integrity().is_ok());
    }
}
