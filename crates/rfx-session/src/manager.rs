//! Session manager
//!
//! Owns the session lifecycle: start, accumulate descriptors, validate,
//! gate, apply or block, cancel. Every transition and every governance
//! decision is appended to the audit log. Operations against different
//! sessions run concurrently; operations against one session are
//! linearized by its entry mutex, and cancellation reaches an in-flight
//! apply through the out-of-band flag.

use crate::error::{EngineError, ValidationError};
use crate::repository::{InMemorySessionRepository, SessionHandle, SessionRepository};
use crate::session::Session;
use crate::state::SessionState;
use rfx_apply::{ApplyExecutor, ApplyOutcome, ApplySummary, ExecutionError};
use rfx_audit::{AuditKind, AuditLog};
use rfx_change::{ChangeDescriptor, SessionId, WorkingSet};
use rfx_graph::{consistency, ConsistencyReport, ReferenceProvider};
use rfx_policy::{
    confidence, engine as governance, ConfidenceScore, GovernanceContext, PolicyConfig,
    PolicyDecision, PolicyOutcome, PolicyScanner, TestSignalProvider,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Options for one apply attempt
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Block on an inconsistent report before governance runs
    pub require_consistency: bool,
    /// Override the executor's lock acquisition deadline
    pub lock_timeout: Option<Duration>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            require_consistency: true,
            lock_timeout: None,
        }
    }
}

/// Result of `start_session`
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct StartResult {
    /// The new session's id
    pub session_id: SessionId,
    /// Always `Editing` on success
    pub state: SessionState,
}

/// Result of `update_file`
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct UpdateResult {
    /// State after the upsert (always `Editing`)
    pub state: SessionState,
    /// Whether a prior descriptor for the path was superseded
    pub superseded: bool,
}

/// Result of `cancel_session`
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct CancelResult {
    /// Always `Cancelled`
    pub state: SessionState,
}

/// Read-only session snapshot
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionStatus {
    /// Current lifecycle state
    pub state: SessionState,
    /// Live descriptor count
    pub live_change_count: usize,
    /// Descriptors accepted over the session's lifetime
    pub accepted_changes: usize,
    /// Most recent governance decision
    pub last_decision: Option<PolicyDecision>,
    /// Audit sequence high-water mark for the session
    pub audit_sequence: u64,
}

/// Outcome of one `apply_changes` call
///
/// Consistency gaps and governance refusals are outcomes, not errors:
/// the session lands in a revisable state and the caller gets the full
/// structured reasons.
#[derive(Debug)]
pub enum ApplyResult {
    /// Batch written and verified; session terminal
    Committed {
        decision: PolicyDecision,
        score: ConfidenceScore,
        summary: ApplySummary,
    },
    /// Missing co-changes or broken references; session `Blocked`
    Blocked { report: ConsistencyReport },
    /// Governance denied; session `Blocked`
    Denied { decision: PolicyDecision },
    /// Human decision required; session `AwaitingReview`
    NeedsReview { decision: PolicyDecision },
    /// A failure during apply; every file restored, session terminal
    RolledBack { cause: ExecutionError },
    /// Lock conflict, not a governance denial; session back to `Editing`
    LockTimeout,
}

/// The engine's aggregate root owner
#[derive(Debug)]
pub struct SessionManager {
    repo: Arc<dyn SessionRepository>,
    audit: Arc<AuditLog>,
    executor: Arc<ApplyExecutor>,
    indexer: Arc<dyn ReferenceProvider>,
    tests: Arc<dyn TestSignalProvider>,
    scanner: Arc<dyn PolicyScanner>,
}

impl SessionManager {
    /// Manager with in-memory repository and default executor tuning
    #[must_use]
    pub fn new(
        indexer: Arc<dyn ReferenceProvider>,
        tests: Arc<dyn TestSignalProvider>,
        scanner: Arc<dyn PolicyScanner>,
    ) -> Self {
        Self {
            repo: Arc::new(InMemorySessionRepository::new()),
            audit: Arc::new(AuditLog::new()),
            executor: Arc::new(ApplyExecutor::new()),
            indexer,
            tests,
            scanner,
        }
    }

    /// Manager with explicit collaborators
    #[must_use]
    pub fn with_parts(
        repo: Arc<dyn SessionRepository>,
        audit: Arc<AuditLog>,
        executor: Arc<ApplyExecutor>,
        indexer: Arc<dyn ReferenceProvider>,
        tests: Arc<dyn TestSignalProvider>,
        scanner: Arc<dyn PolicyScanner>,
    ) -> Self {
        Self {
            repo,
            audit,
            executor,
            indexer,
            tests,
            scanner,
        }
    }

    /// Shared audit log
    #[inline]
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Shared executor (its lock table is the cross-session serialization point)
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &ApplyExecutor {
        &self.executor
    }

    /// Open a session over a working set
    ///
    /// # Errors
    /// `ValidationError` for a contradictory policy, an empty working
    /// set, or a path that does not exist.
    pub async fn start_session(
        &self,
        paths: Vec<PathBuf>,
        policy: PolicyConfig,
    ) -> Result<StartResult, EngineError> {
        policy.validate().map_err(ValidationError::from)?;
        let working_set = WorkingSet::capture(paths)
            .await
            .map_err(ValidationError::from)?;

        let mut session = Session::new(working_set, policy);
        let edge = session.transition(SessionState::Editing)?;
        let id = session.id;
        self.audit_transition(id, edge);
        self.repo.insert(session).await;

        tracing::info!(session = %id, "session started");
        Ok(StartResult {
            session_id: id,
            state: SessionState::Editing,
        })
    }

    /// Upsert a change descriptor, superseding any prior one for the path
    ///
    /// Re-enters `Editing` from `Blocked` or `AwaitingReview`.
    ///
    /// # Errors
    /// `SessionNotFound`, `SessionTerminal`, or a descriptor shape error.
    pub async fn update_file(
        &self,
        id: SessionId,
        descriptor: ChangeDescriptor,
    ) -> Result<UpdateResult, EngineError> {
        let entry = self.entry(id).await?;
        let mut session = entry.session.lock().await;

        if session.state.is_terminal() {
            return Err(ValidationError::SessionTerminal {
                id,
                state: session.state,
            }
            .into());
        }
        if matches!(
            session.state,
            SessionState::Blocked | SessionState::AwaitingReview
        ) {
            let edge = session.transition(SessionState::Editing)?;
            self.audit_transition(id, edge);
        }
        if session.state != SessionState::Editing {
            return Err(ValidationError::InvalidState {
                id,
                state: session.state,
                operation: "update",
            }
            .into());
        }

        let superseded = session.upsert_change(descriptor)?;
        Ok(UpdateResult {
            state: session.state,
            superseded,
        })
    }

    /// Run the consistency validator without attempting an apply
    ///
    /// Read-only preview: no state transition, no governance.
    ///
    /// # Errors
    /// `SessionNotFound` or a provider failure.
    pub async fn preview_consistency(
        &self,
        id: SessionId,
    ) -> Result<ConsistencyReport, EngineError> {
        let entry = self.entry(id).await?;
        let mut session = entry.session.lock().await;
        if session.live_changes.is_empty() {
            return Ok(ConsistencyReport::consistent());
        }
        let changes = session.live_batch();
        let working_set = session.working_set.clone();
        let graph = session.graph(self.indexer.as_ref())?;
        let report = consistency::validate(&changes, graph, &working_set, self.indexer.as_ref())?;
        Ok(report)
    }

    /// Validate, score, gate, and - on allow - atomically apply
    ///
    /// # Errors
    /// `ValidationError` for bad input, or `RollbackFailure` when a
    /// restore failed and the session is flagged `CorruptionSuspected`.
    /// Consistency blocks, denials, rolled-back applies, and lock
    /// timeouts are `Ok` outcomes carrying their reasons.
    pub async fn apply_changes(
        &self,
        id: SessionId,
        options: ApplyOptions,
    ) -> Result<ApplyResult, EngineError> {
        let entry = self.entry(id).await?;
        let mut session = entry.session.lock().await;

        if session.state.is_terminal() {
            return Err(ValidationError::SessionTerminal {
                id,
                state: session.state,
            }
            .into());
        }
        if session.state != SessionState::Editing {
            return Err(ValidationError::InvalidState {
                id,
                state: session.state,
                operation: "apply",
            }
            .into());
        }
        if session.live_changes.is_empty() {
            return Err(ValidationError::NoLiveChanges(id).into());
        }

        let changes = session.live_batch();
        let edge = session.transition(SessionState::Validating)?;
        self.audit_transition(id, edge);

        // Consistency pass. A provider failure returns the session to
        // Editing rather than stranding it in Validating.
        let report = {
            let working_set = session.working_set.clone();
            let graph_result = session.graph(self.indexer.as_ref());
            let validated = match graph_result {
                Ok(graph) => {
                    consistency::validate(&changes, graph, &working_set, self.indexer.as_ref())
                }
                Err(e) => Err(e),
            };
            match validated {
                Ok(report) => report,
                Err(e) => {
                    let edge = session.transition(SessionState::Editing)?;
                    self.audit_transition(id, edge);
                    return Err(e.into());
                }
            }
        };

        if options.require_consistency && !report.consistent {
            let edge = session.transition(SessionState::Blocked)?;
            self.audit_transition(id, edge);
            self.audit.append(
                id,
                AuditKind::Decision,
                "consistency",
                format!(
                    "blocked: {} missing co-changes, {} broken references",
                    report.missing_co_changes.len(),
                    report.broken_references.len()
                ),
            );
            return Ok(ApplyResult::Blocked { report });
        }

        // External signals and governance.
        let touched: Vec<PathBuf> = ApplyExecutor::touched_paths(&changes).into_iter().collect();
        let touched_refs: Vec<&Path> = touched.iter().map(PathBuf::as_path).collect();
        let signal = self.tests.test_signal(&touched_refs);
        let violations = self.scanner.scan(&touched_refs);
        let rollback_ready = self.executor.rollback_ready(&changes).await;

        let score = confidence::score(&changes, &report, signal, &session.policy);
        let decision = governance::evaluate(
            &GovernanceContext {
                score: &score,
                live_change_count: changes.len(),
                cumulative_changes: session.accepted_changes,
                test_signal: signal,
                rollback_ready,
                scan_violations: &violations,
            },
            &session.policy,
        );
        session.last_decision = Some(decision.clone());
        self.audit.append(
            id,
            AuditKind::Decision,
            "apply",
            decision_summary(&decision),
        );

        match decision.outcome {
            PolicyOutcome::Deny => {
                let edge = session.transition(SessionState::Blocked)?;
                self.audit_transition(id, edge);
                Ok(ApplyResult::Denied { decision })
            }
            PolicyOutcome::NeedsReview => {
                let edge = session.transition(SessionState::AwaitingReview)?;
                self.audit_transition(id, edge);
                Ok(ApplyResult::NeedsReview { decision })
            }
            PolicyOutcome::Allow => {
                // An inconsistent batch never commits. Skipping the early
                // consistency gate only defers the block until after the
                // full rule evaluation.
                if !report.consistent {
                    let edge = session.transition(SessionState::Blocked)?;
                    self.audit_transition(id, edge);
                    return Ok(ApplyResult::Blocked { report });
                }
                // Locks are taken while still Validating: a timeout is a
                // lock conflict, not a governance denial, and no file has
                // been touched.
                let locks = match self.executor.acquire(&changes, options.lock_timeout).await {
                    Ok(locks) => locks,
                    Err(_timeout) => {
                        let edge = session.transition(SessionState::Editing)?;
                        self.audit_transition(id, edge);
                        return Ok(ApplyResult::LockTimeout);
                    }
                };
                let edge = session.transition(SessionState::Applying)?;
                self.audit_transition(id, edge);

                match self
                    .executor
                    .apply_locked(locks, id, &changes, &entry.cancel)
                    .await
                {
                    Ok(ApplyOutcome::Committed(summary)) => {
                        let edge = session.transition(SessionState::Committed)?;
                        self.audit_transition(id, edge);
                        self.audit.append(
                            id,
                            AuditKind::Apply,
                            "apply",
                            format!("committed: {} files", summary.files_written),
                        );
                        Ok(ApplyResult::Committed {
                            decision,
                            score,
                            summary,
                        })
                    }
                    Ok(ApplyOutcome::RolledBack { cause }) => {
                        let to = if matches!(cause, ExecutionError::Cancelled) {
                            SessionState::Cancelled
                        } else {
                            SessionState::RolledBack
                        };
                        let edge = session.transition(to)?;
                        self.audit_transition(id, edge);
                        self.audit.append(
                            id,
                            AuditKind::Rollback,
                            "rollback",
                            format!("restored: {cause}"),
                        );
                        Ok(ApplyResult::RolledBack { cause })
                    }
                    Err(source) => {
                        let edge = session.transition(SessionState::CorruptionSuspected)?;
                        self.audit_transition(id, edge);
                        self.audit.append(
                            id,
                            AuditKind::Rollback,
                            "rollback",
                            format!("failed: {source}"),
                        );
                        Err(EngineError::RollbackFailure {
                            session: id,
                            source,
                        })
                    }
                }
            }
        }
    }

    /// Read-only snapshot of a session
    ///
    /// # Errors
    /// `SessionNotFound`.
    pub async fn status(&self, id: SessionId) -> Result<SessionStatus, EngineError> {
        let entry = self.entry(id).await?;
        let session = entry.session.lock().await;
        Ok(SessionStatus {
            state: session.state,
            live_change_count: session.live_changes.len(),
            accepted_changes: session.accepted_changes,
            last_decision: session.last_decision.clone(),
            audit_sequence: self.audit.sequence_high_water(id),
        })
    }

    /// Cancel a session; idempotent on an already-cancelled one
    ///
    /// The cancel flag is set before the session lock is taken, so an
    /// apply in flight on another task observes it before committing and
    /// rolls back instead.
    ///
    /// # Errors
    /// `SessionNotFound`, or `SessionTerminal` for committed/rolled-back
    /// sessions.
    pub async fn cancel_session(&self, id: SessionId) -> Result<CancelResult, EngineError> {
        let entry = self.entry(id).await?;
        entry.cancel.cancel();

        let mut session = entry.session.lock().await;
        if session.state == SessionState::Cancelled {
            return Ok(CancelResult {
                state: SessionState::Cancelled,
            });
        }
        if session.state.is_terminal() {
            return Err(ValidationError::SessionTerminal {
                id,
                state: session.state,
            }
            .into());
        }
        let edge = session.transition(SessionState::Cancelled)?;
        self.audit_transition(id, edge);
        tracing::info!(session = %id, "session cancelled");
        Ok(CancelResult {
            state: SessionState::Cancelled,
        })
    }

    /// Startup recovery pass
    ///
    /// Any session found `Applying` cannot be trusted to have committed;
    /// it is transitioned to `RolledBack` pending verification of its
    /// snapshot. Returns the affected session ids.
    pub async fn recover_in_flight(&self) -> Vec<SessionId> {
        let mut recovered = Vec::new();
        for id in self.repo.ids().await {
            let Some(entry) = self.repo.get(id).await else {
                continue;
            };
            let mut session = entry.session.lock().await;
            if session.state == SessionState::Applying {
                if let Ok(edge) = session.transition(SessionState::RolledBack) {
                    self.audit_transition(id, edge);
                    self.audit.append(
                        id,
                        AuditKind::Rollback,
                        "recovery",
                        "found applying at startup; rollback verification required",
                    );
                    recovered.push(id);
                }
            }
        }
        if !recovered.is_empty() {
            tracing::warn!(count = recovered.len(), "recovered in-flight sessions");
        }
        recovered
    }

    async fn entry(&self, id: SessionId) -> Result<SessionHandle, ValidationError> {
        self.repo
            .get(id)
            .await
            .ok_or(ValidationError::SessionNotFound(id))
    }

    fn audit_transition(&self, id: SessionId, edge: (SessionState, SessionState)) {
        let (from, to) = edge;
        self.audit.append(
            id,
            AuditKind::Transition,
            format!("{from} -> {to}"),
            "ok",
        );
    }
}

fn decision_summary(decision: &PolicyDecision) -> String {
    if decision.failed_rules.is_empty() {
        decision.outcome.to_string()
    } else {
        let rules: Vec<String> = decision
            .failed_rules
            .iter()
            .map(ToString::to_string)
            .collect();
        format!("{} [{}]", decision.outcome, rules.join(", "))
    }
}
