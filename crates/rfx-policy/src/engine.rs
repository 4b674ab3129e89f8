//! Governance policy engine
//!
//! An ordered, named rule list evaluated against a batch. Every rule is
//! always evaluated - no short-circuit - so a caller sees the complete
//! set of reasons, not just the first failure. Precedence: any deny wins;
//! otherwise the human-review override yields needs-review; otherwise
//! allow.

use crate::config::PolicyConfig;
use crate::confidence::ConfidenceScore;
use crate::signal::{ScanViolation, TestSignal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical governance rule names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    /// Batch confidence below threshold
    MinConfidence,
    /// Too many files in one batch
    MaxFilesPerChange,
    /// Session change budget exhausted
    MaxTotalChanges,
    /// Test signal not `pass`
    RequireTestsPass,
    /// Snapshot cannot be taken
    RequireRollbackReady,
    /// Human-in-the-loop override
    RequireHumanReview,
    /// External scanner found violations
    ScanViolations,
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinConfidence => write!(f, "min_confidence"),
            Self::MaxFilesPerChange => write!(f, "max_files_per_change"),
            Self::MaxTotalChanges => write!(f, "max_total_changes"),
            Self::RequireTestsPass => write!(f, "require_tests_pass"),
            Self::RequireRollbackReady => write!(f, "require_rollback_ready"),
            Self::RequireHumanReview => write!(f, "require_human_review"),
            Self::ScanViolations => write!(f, "scan_violations"),
        }
    }
}

/// Decision outcome for one apply attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyOutcome {
    /// Batch may be applied autonomously
    Allow,
    /// Batch is refused; failed rules say why
    Deny,
    /// Batch needs a human decision
    NeedsReview,
}

impl fmt::Display for PolicyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
            Self::NeedsReview => write!(f, "needs-review"),
        }
    }
}

/// One decision per apply attempt; retained in the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Final outcome after precedence
    pub outcome: PolicyOutcome,
    /// Every rule that denied (empty on allow/needs-review-only)
    pub failed_rules: Vec<RuleName>,
    /// Evaluation timestamp
    pub evaluated_at: chrono::DateTime<chrono::Utc>,
}

impl PolicyDecision {
    /// Whether the batch may proceed to apply
    #[inline]
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.outcome == PolicyOutcome::Allow
    }
}

/// Everything governance looks at for one apply attempt
#[derive(Debug)]
pub struct GovernanceContext<'a> {
    /// Batch confidence
    pub score: &'a ConfidenceScore,
    /// Live descriptor count in this batch
    pub live_change_count: usize,
    /// Descriptors accepted across the session's history, superseded
    /// ones included - the churn the `max_total_changes` budget bounds
    pub cumulative_changes: usize,
    /// External test signal for the batch
    pub test_signal: TestSignal,
    /// Whether the executor confirmed a snapshot can be taken
    pub rollback_ready: bool,
    /// Findings from external static policy scanners
    pub scan_violations: &'a [ScanViolation],
}

/// Evaluate the full rule list against a batch
#[must_use]
pub fn evaluate(ctx: &GovernanceContext<'_>, config: &PolicyConfig) -> PolicyDecision {
    let mut failed_rules = Vec::new();

    if config.confidence_threshold > 0.0 && ctx.score.value < config.confidence_threshold {
        failed_rules.push(RuleName::MinConfidence);
    }
    if ctx.live_change_count > config.max_files_per_change {
        failed_rules.push(RuleName::MaxFilesPerChange);
    }
    if ctx.cumulative_changes > config.max_total_changes {
        failed_rules.push(RuleName::MaxTotalChanges);
    }
    if config.require_tests_pass && ctx.test_signal != TestSignal::Pass {
        failed_rules.push(RuleName::RequireTestsPass);
    }
    if config.require_rollback_ready && !ctx.rollback_ready {
        failed_rules.push(RuleName::RequireRollbackReady);
    }
    if !ctx.scan_violations.is_empty() {
        failed_rules.push(RuleName::ScanViolations);
    }

    let outcome = if !failed_rules.is_empty() {
        PolicyOutcome::Deny
    } else if config.require_human_review {
        PolicyOutcome::NeedsReview
    } else {
        PolicyOutcome::Allow
    };

    tracing::info!(
        %outcome,
        failed = failed_rules.len(),
        confidence = ctx.score.value,
        "governance decision"
    );

    PolicyDecision {
        outcome,
        failed_rules,
        evaluated_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::{ConfidenceScore, ScoreBreakdown};

    fn score(value: f64) -> ConfidenceScore {
        ConfidenceScore {
            value,
            breakdown: ScoreBreakdown {
                change_type_weight: value,
                blast_radius_penalty: 0.0,
                test_coverage_bonus: 0.0,
            },
        }
    }

    fn ctx<'a>(s: &'a ConfidenceScore, violations: &'a [ScanViolation]) -> GovernanceContext<'a> {
        GovernanceContext {
            score: s,
            live_change_count: 1,
            cumulative_changes: 0,
            test_signal: TestSignal::Pass,
            rollback_ready: true,
            scan_violations: violations,
        }
    }

    #[test]
    fn passing_batch_is_allowed() {
        let s = score(0.95);
        let decision = evaluate(&ctx(&s, &[]), &PolicyConfig::permissive());
        assert_eq!(decision.outcome, PolicyOutcome::Allow);
        assert!(decision.failed_rules.is_empty());
    }

    #[test]
    fn low_confidence_denies() {
        let s = score(0.3);
        let decision = evaluate(&ctx(&s, &[]), &PolicyConfig::permissive());
        assert_eq!(decision.outcome, PolicyOutcome::Deny);
        assert!(decision.failed_rules.contains(&RuleName::MinConfidence));
    }

    #[test]
    fn all_rules_evaluated_not_short_circuited() {
        let s = score(0.1);
        let config = PolicyConfig {
            max_files_per_change: 2,
            max_total_changes: 3,
            require_tests_pass: true,
            ..PolicyConfig::permissive()
        };
        let decision = evaluate(
            &GovernanceContext {
                score: &s,
                live_change_count: 5,
                cumulative_changes: 7,
                test_signal: TestSignal::Unknown,
                rollback_ready: false,
                scan_violations: &[],
            },
            &config,
        );
        assert_eq!(decision.outcome, PolicyOutcome::Deny);
        assert_eq!(
            decision.failed_rules,
            vec![
                RuleName::MinConfidence,
                RuleName::MaxFilesPerChange,
                RuleName::MaxTotalChanges,
                RuleName::RequireTestsPass,
                RuleName::RequireRollbackReady,
            ]
        );
    }

    #[test]
    fn missing_test_signal_denies_when_required() {
        let s = score(1.0);
        let config = PolicyConfig {
            require_tests_pass: true,
            ..PolicyConfig::permissive()
        };
        let mut context = ctx(&s, &[]);
        context.test_signal = TestSignal::Unknown;
        let decision = evaluate(&context, &config);
        assert_eq!(decision.outcome, PolicyOutcome::Deny);
        assert_eq!(decision.failed_rules, vec![RuleName::RequireTestsPass]);
    }

    #[test]
    fn human_review_override_never_allows() {
        let s = score(1.0);
        let decision = evaluate(&ctx(&s, &[]), &PolicyConfig::strict());
        assert_eq!(decision.outcome, PolicyOutcome::NeedsReview);
        assert!(decision.failed_rules.is_empty());
    }

    #[test]
    fn deny_beats_needs_review() {
        let s = score(0.5);
        let decision = evaluate(&ctx(&s, &[]), &PolicyConfig::strict());
        assert_eq!(decision.outcome, PolicyOutcome::Deny);
    }

    #[test]
    fn scan_violations_hard_deny() {
        let s = score(1.0);
        let violations = vec![ScanViolation {
            rule: "secret-in-source".into(),
            path: Some("config.ts".into()),
            message: "api key literal".into(),
        }];
        let decision = evaluate(&ctx(&s, &violations), &PolicyConfig::permissive());
        assert_eq!(decision.outcome, PolicyOutcome::Deny);
        assert_eq!(decision.failed_rules, vec![RuleName::ScanViolations]);
    }

    #[test]
    fn rule_names_render_snake_case() {
        assert_eq!(RuleName::MaxFilesPerChange.to_string(), "max_files_per_change");
        assert_eq!(PolicyOutcome::NeedsReview.to_string(), "needs-review");
    }
}
