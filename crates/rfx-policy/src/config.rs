//! Governance policy configuration
//!
//! An explicit, exhaustively-validated struct with named fields and
//! required defaults. Internally contradictory configurations are
//! rejected at session start, not discovered mid-apply.

use serde::{Deserialize, Serialize};

/// Configuration gating autonomous application of change batches
///
/// A threshold of `0.0` disables the confidence gate; the limit rules
/// are disabled by setting them high enough to never bind. The three
/// `require_*` flags toggle their rules directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum batch confidence for the `min_confidence` rule
    pub confidence_threshold: f64,

    /// Maximum live descriptors in one batch
    pub max_files_per_change: usize,

    /// Maximum cumulative changes across the session's lifetime
    pub max_total_changes: usize,

    /// Deny unless the external test signal is `Pass` (no signal = deny)
    pub require_tests_pass: bool,

    /// Deny unless a snapshot can be taken before writing
    pub require_rollback_ready: bool,

    /// Never allow autonomously - always route to human review
    pub require_human_review: bool,
}

impl PolicyConfig {
    /// Permissive defaults for interactive use
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_files_per_change: 25,
            max_total_changes: 200,
            require_tests_pass: false,
            require_rollback_ready: true,
            require_human_review: false,
        }
    }

    /// Enterprise defaults: near-certain confidence and a human in the loop
    ///
    /// The human-review override wins regardless of confidence - a
    /// 0.999 score still only ever yields `needs-review`.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            confidence_threshold: 0.999,
            max_files_per_change: 10,
            max_total_changes: 50,
            require_tests_pass: true,
            require_rollback_ready: true,
            require_human_review: true,
        }
    }

    /// Check the configuration for internal contradictions
    ///
    /// # Errors
    /// - threshold outside `[0, 1]` or not finite
    /// - a zero file budget (no batch could ever pass)
    /// - a total budget smaller than a single batch budget
    /// - unattended mode with every gate disabled
    pub fn validate(&self) -> Result<(), PolicyConfigError> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(PolicyConfigError::InvalidThreshold(
                self.confidence_threshold,
            ));
        }
        if self.max_files_per_change == 0 {
            return Err(PolicyConfigError::ZeroFileBudget);
        }
        if self.max_total_changes < self.max_files_per_change {
            return Err(PolicyConfigError::TotalBelowBatch {
                total: self.max_total_changes,
                batch: self.max_files_per_change,
            });
        }
        if !self.require_human_review
            && !self.require_tests_pass
            && self.confidence_threshold == 0.0
        {
            return Err(PolicyConfigError::UnattendedWithoutGate);
        }
        Ok(())
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::permissive()
    }
}

/// Contradictions in a policy configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyConfigError {
    /// Threshold must be a finite value in [0, 1]
    #[error("confidence threshold {0} outside [0, 1]")]
    InvalidThreshold(f64),

    /// A zero per-batch budget can never pass
    #[error("max_files_per_change must be at least 1")]
    ZeroFileBudget,

    /// Session budget below batch budget
    #[error("max_total_changes ({total}) below max_files_per_change ({batch})")]
    TotalBelowBatch { total: usize, batch: usize },

    /// Fully unattended with no confidence gate and no test gate
    #[error("unattended configuration requires a confidence or test gate")]
    UnattendedWithoutGate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_and_strict_validate() {
        assert!(PolicyConfig::permissive().validate().is_ok());
        assert!(PolicyConfig::strict().validate().is_ok());
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let config = PolicyConfig {
            confidence_threshold: 1.5,
            ..PolicyConfig::permissive()
        };
        assert!(matches!(
            config.validate(),
            Err(PolicyConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn zero_file_budget_rejected() {
        let config = PolicyConfig {
            max_files_per_change: 0,
            ..PolicyConfig::permissive()
        };
        assert_eq!(config.validate(), Err(PolicyConfigError::ZeroFileBudget));
    }

    #[test]
    fn total_below_batch_rejected() {
        let config = PolicyConfig {
            max_files_per_change: 20,
            max_total_changes: 10,
            ..PolicyConfig::permissive()
        };
        assert!(matches!(
            config.validate(),
            Err(PolicyConfigError::TotalBelowBatch { .. })
        ));
    }

    #[test]
    fn unattended_without_any_gate_rejected() {
        let config = PolicyConfig {
            confidence_threshold: 0.0,
            require_tests_pass: false,
            require_human_review: false,
            ..PolicyConfig::permissive()
        };
        assert_eq!(
            config.validate(),
            Err(PolicyConfigError::UnattendedWithoutGate)
        );
    }
}
