//! RFX Governance
//!
//! Confidence scoring and policy gating for change batches.
//!
//! # Core Concepts
//!
//! - [`PolicyConfig`]: exhaustively validated gate configuration
//! - [`confidence::score`]: batch confidence with per-factor breakdown
//! - [`engine::evaluate`]: ordered named rules, all always evaluated
//! - [`TestSignal`] / [`PolicyScanner`]: typed external collaborator seams

pub mod confidence;
mod config;
pub mod engine;
mod signal;

pub use confidence::{ConfidenceScore, ScoreBreakdown};
pub use config::{PolicyConfig, PolicyConfigError};
pub use engine::{GovernanceContext, PolicyDecision, PolicyOutcome, RuleName};
pub use signal::{PolicyScanner, ScanViolation, TestSignal, TestSignalProvider};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
