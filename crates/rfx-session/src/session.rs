//! Session aggregate
//!
//! Owned exclusively by the session manager. The validator, scorer, and
//! governance engine are pure functions over a snapshot of this struct;
//! only the manager applies their results back.

use crate::error::ValidationError;
use crate::state::{validate_transition, SessionState, TransitionError};
use indexmap::IndexMap;
use rfx_change::{ChangeDescriptor, ChangeKind, SessionId, WorkingSet};
use rfx_graph::{DependencyGraph, GraphError, ReferenceProvider};
use rfx_policy::{PolicyConfig, PolicyDecision};
use std::path::PathBuf;

/// One bounded unit of refactoring work
#[derive(Debug)]
pub struct Session {
    /// Unique id, the key for audit entries and snapshots
    pub id: SessionId,
    /// Files captured at start; immutable
    pub working_set: WorkingSet,
    /// At most one live descriptor per path; insertion order preserved
    pub live_changes: IndexMap<PathBuf, ChangeDescriptor>,
    /// Lifecycle state
    pub state: SessionState,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Governance configuration, validated at start
    pub policy: PolicyConfig,
    /// Descriptors accepted over the session's lifetime (supersedes included)
    pub accepted_changes: usize,
    /// Most recent governance decision, if any
    pub last_decision: Option<PolicyDecision>,
    /// Cached dependency graph over the working set
    graph: Option<DependencyGraph>,
}

impl Session {
    /// Create a session in `Created` state
    #[must_use]
    pub fn new(working_set: WorkingSet, policy: PolicyConfig) -> Self {
        Self {
            id: SessionId::new(),
            working_set,
            live_changes: IndexMap::new(),
            state: SessionState::Created,
            created_at: chrono::Utc::now(),
            policy,
            accepted_changes: 0,
            last_decision: None,
            graph: None,
        }
    }

    /// Move to a new state, returning the edge for audit
    ///
    /// # Errors
    /// Returns [`TransitionError::Illegal`] on a transition outside the
    /// table.
    pub fn transition(
        &mut self,
        to: SessionState,
    ) -> Result<(SessionState, SessionState), TransitionError> {
        let from = self.state;
        validate_transition(from, to)?;
        self.state = to;
        tracing::debug!(session = %self.id, %from, %to, "session transition");
        Ok((from, to))
    }

    /// Upsert a descriptor, superseding any prior one for the path
    ///
    /// Returns whether an earlier descriptor was superseded.
    ///
    /// # Errors
    /// Rejects malformed descriptors and non-create changes to paths
    /// outside the working set.
    pub fn upsert_change(&mut self, descriptor: ChangeDescriptor) -> Result<bool, ValidationError> {
        descriptor.validate()?;
        // Only a create may name a path the working set does not hold;
        // a rename introduces its target but its source must be known.
        if descriptor.kind != ChangeKind::Create && !self.working_set.contains(&descriptor.path) {
            return Err(ValidationError::OutsideWorkingSet {
                path: descriptor.path.clone(),
            });
        }
        if descriptor.introduces_path() {
            // A new path enters scope; the cached graph no longer
            // covers the session's universe.
            self.graph = None;
        }
        self.accepted_changes += 1;
        let superseded = self
            .live_changes
            .insert(descriptor.path.clone(), descriptor)
            .is_some();
        Ok(superseded)
    }

    /// Live descriptors in insertion order
    #[must_use]
    pub fn live_batch(&self) -> Vec<ChangeDescriptor> {
        self.live_changes.values().cloned().collect()
    }

    /// The dependency graph over the working set, built lazily once
    ///
    /// Re-validation passes reuse the cached graph; only a change to the
    /// session's path universe (a create or rename entering scope)
    /// invalidates it.
    ///
    /// # Errors
    /// Propagates provider failures from the build.
    pub fn graph(&mut self, provider: &dyn ReferenceProvider) -> Result<&DependencyGraph, GraphError> {
        match &mut self.graph {
            Some(graph) => Ok(graph),
            slot => Ok(slot.insert(DependencyGraph::build(&self.working_set, provider)?)),
        }
    }
}
