//! RFX Session Manager
//!
//! The lifecycle owner for multi-file refactoring transactions:
//! start a session over a working set, accumulate change descriptors,
//! validate and gate them, then atomically apply or block.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rfx_session::prelude::*;
//!
//! let manager = SessionManager::new(indexer, tests, scanner);
//! let started = manager.start_session(paths, PolicyConfig::permissive()).await?;
//!
//! manager.update_file(started.session_id, descriptor).await?;
//! match manager.apply_changes(started.session_id, ApplyOptions::default()).await? {
//!     ApplyResult::Committed { .. } => { /* done */ }
//!     ApplyResult::Blocked { report } => { /* supply the missing co-changes */ }
//!     other => { /* denied, awaiting review, rolled back, ... */ }
//! }
//! ```

pub mod error;
pub mod manager;
pub mod repository;
pub mod session;
pub mod state;

pub use error::{EngineError, ValidationError};
pub use manager::{
    ApplyOptions, ApplyResult, CancelResult, SessionManager, SessionStatus, StartResult,
    UpdateResult,
};
pub use repository::{InMemorySessionRepository, SessionEntry, SessionHandle, SessionRepository};
pub use session::Session;
pub use state::{allowed_transitions, validate_transition, SessionState, TransitionError};

/// Common imports for engine callers
pub mod prelude {
    pub use crate::error::{EngineError, ValidationError};
    pub use crate::manager::{
        ApplyOptions, ApplyResult, CancelResult, SessionManager, SessionStatus, StartResult,
        UpdateResult,
    };
    pub use crate::state::SessionState;
    pub use rfx_change::{ChangeDescriptor, ChangeKind, RefactorKind, SessionId};
    pub use rfx_policy::{PolicyConfig, PolicyOutcome, TestSignal};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
