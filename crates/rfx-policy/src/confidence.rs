//! Batch confidence scoring
//!
//! Assigns a scalar in `[0, 1]` to the full set of live descriptors.
//! Weights, in order of influence: change-type weight, blast-radius
//! penalty, test-coverage bonus. Broken references are an absolute veto.

use crate::config::PolicyConfig;
use crate::signal::TestSignal;
use rfx_change::ChangeDescriptor;
use rfx_graph::ConsistencyReport;
use serde::{Deserialize, Serialize};

/// Penalty factor applied to the batch-size ratio
pub const BLAST_RADIUS_FACTOR: f64 = 0.3;

/// Ceiling for a batch exceeding the configured file budget
pub const OVERSIZE_CEILING: f64 = 0.5;

/// Additive bonus when the external test signal is `Pass`
pub const TEST_PASS_BONUS: f64 = 0.1;

/// Per-factor decomposition of a batch score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Weakest change-type weight in the batch
    pub change_type_weight: f64,
    /// Penalty proportional to batch size over budget
    pub blast_radius_penalty: f64,
    /// Bonus from passing tests
    pub test_coverage_bonus: f64,
}

/// Confidence attached to a batch, never to a single file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// Scalar in [0, 1]
    pub value: f64,
    /// How the scalar was assembled
    pub breakdown: ScoreBreakdown,
}

impl ConfidenceScore {
    /// The zero score forced by a broken-reference veto
    #[must_use]
    pub fn vetoed(breakdown: ScoreBreakdown) -> Self {
        Self {
            value: 0.0,
            breakdown,
        }
    }
}

/// Score a batch of live descriptors
///
/// A batch's change-type weight is its weakest member's: one risky
/// rewrite drags the whole batch down. Any broken reference in the
/// consistency report forces the score to 0.0 regardless of the other
/// factors.
#[must_use]
pub fn score(
    changes: &[ChangeDescriptor],
    report: &ConsistencyReport,
    signal: TestSignal,
    config: &PolicyConfig,
) -> ConfidenceScore {
    let change_type_weight = changes
        .iter()
        .map(|d| {
            let base = d.refactor_kind.base_weight();
            match d.confidence_hint {
                Some(hint) => base.min(hint),
                None => base,
            }
        })
        .fold(1.0_f64, f64::min);

    let ratio = changes.len() as f64 / config.max_files_per_change as f64;
    let blast_radius_penalty = BLAST_RADIUS_FACTOR * ratio.min(1.0);

    let test_coverage_bonus = match signal {
        TestSignal::Pass => TEST_PASS_BONUS,
        TestSignal::Fail | TestSignal::Unknown => 0.0,
    };

    let breakdown = ScoreBreakdown {
        change_type_weight,
        blast_radius_penalty,
        test_coverage_bonus,
    };

    if !report.broken_references.is_empty() {
        tracing::debug!(
            broken = report.broken_references.len(),
            "broken references veto batch confidence"
        );
        return ConfidenceScore::vetoed(breakdown);
    }

    let mut value =
        (change_type_weight - blast_radius_penalty + test_coverage_bonus).clamp(0.0, 1.0);
    if changes.len() > config.max_files_per_change {
        value = value.min(OVERSIZE_CEILING);
    }

    ConfidenceScore { value, breakdown }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rfx_change::RefactorKind;
    use rfx_graph::BrokenReference;

    fn batch(kinds: &[RefactorKind]) -> Vec<ChangeDescriptor> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, k)| ChangeDescriptor::modify(format!("f{i}.ts"), "x", *k))
            .collect()
    }

    fn consistent() -> ConsistencyReport {
        ConsistencyReport::consistent()
    }

    #[test]
    fn mechanical_batch_scores_high() {
        let config = PolicyConfig::permissive();
        let s = score(
            &batch(&[RefactorKind::FormatOnly]),
            &consistent(),
            TestSignal::Unknown,
            &config,
        );
        assert!(s.value > 0.9, "value: {}", s.value);
    }

    #[test]
    fn weakest_member_sets_batch_weight() {
        let config = PolicyConfig::permissive();
        let s = score(
            &batch(&[RefactorKind::FormatOnly, RefactorKind::LogicRewrite]),
            &consistent(),
            TestSignal::Unknown,
            &config,
        );
        assert_eq!(
            s.breakdown.change_type_weight,
            RefactorKind::LogicRewrite.base_weight()
        );
    }

    #[test]
    fn broken_references_force_zero() {
        let config = PolicyConfig::permissive();
        let report = ConsistencyReport {
            consistent: false,
            missing_co_changes: vec![],
            broken_references: vec![BrokenReference {
                from: "b.ts".into(),
                to: "a.ts".into(),
                symbol: "shared".into(),
            }],
        };
        let s = score(
            &batch(&[RefactorKind::FormatOnly]),
            &report,
            TestSignal::Pass,
            &config,
        );
        assert_eq!(s.value, 0.0);
    }

    #[test]
    fn oversized_batch_capped_at_ceiling() {
        let config = PolicyConfig {
            max_files_per_change: 2,
            ..PolicyConfig::permissive()
        };
        let s = score(
            &batch(&[RefactorKind::FormatOnly; 5]),
            &consistent(),
            TestSignal::Pass,
            &config,
        );
        assert!(s.value <= OVERSIZE_CEILING);
    }

    #[test]
    fn confidence_hint_can_only_lower() {
        let config = PolicyConfig::permissive();
        let mut changes = batch(&[RefactorKind::FormatOnly]);
        changes[0] = changes[0].clone().with_confidence_hint(0.2);
        let s = score(&changes, &consistent(), TestSignal::Unknown, &config);
        assert_eq!(s.breakdown.change_type_weight, 0.2);
    }

    proptest! {
        // Passing tests never lower a batch's score relative to no signal.
        #[test]
        fn prop_pass_signal_is_monotone(n in 1usize..30) {
            let config = PolicyConfig::permissive();
            let changes = batch(&vec![RefactorKind::ExtractFunction; n]);
            let with_pass = score(&changes, &consistent(), TestSignal::Pass, &config);
            let with_unknown = score(&changes, &consistent(), TestSignal::Unknown, &config);
            prop_assert!(with_pass.value >= with_unknown.value);
        }

        // Score stays inside [0, 1] for any batch size.
        #[test]
        fn prop_score_bounded(n in 0usize..100) {
            let config = PolicyConfig::permissive();
            let changes = batch(&vec![RefactorKind::LogicRewrite; n]);
            let s = score(&changes, &consistent(), TestSignal::Pass, &config);
            prop_assert!((0.0..=1.0).contains(&s.value));
        }
    }
}
