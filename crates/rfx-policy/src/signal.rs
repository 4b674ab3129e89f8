//! External collaborator contracts
//!
//! Missing collaborators surface as typed absence ([`TestSignal::Unknown`],
//! an empty violation list from a scanner that ran) - never as a
//! silently-skipped check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of the external test run for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestSignal {
    /// Tests covering the batch pass
    Pass,
    /// Tests covering the batch fail
    Fail,
    /// No signal available - under `require_tests_pass` this denies
    Unknown,
}

impl fmt::Display for TestSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// External test-result provider
pub trait TestSignalProvider: Send + Sync + std::fmt::Debug {
    /// Signal for the batch touching `paths`
    fn test_signal(&self, paths: &[&Path]) -> TestSignal;
}

/// A finding from an external static policy scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanViolation {
    /// Scanner rule identifier (e.g. `secret-in-source`)
    pub rule: String,
    /// Offending file, when attributable
    pub path: Option<PathBuf>,
    /// Human-readable finding
    pub message: String,
}

/// External secret/architecture scanner
///
/// A non-empty violation set is a hard deny in governance.
pub trait PolicyScanner: Send + Sync + std::fmt::Debug {
    /// Scan the batch's file set
    fn scan(&self, paths: &[&Path]) -> Vec<ScanViolation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_display() {
        assert_eq!(TestSignal::Pass.to_string(), "pass");
        assert_eq!(TestSignal::Unknown.to_string(), "unknown");
    }
}
