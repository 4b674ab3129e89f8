//! Shared test fixtures for the RFX workspace
//!
//! Tempdir-backed workspaces, fixed external signals, and scripted
//! scanners so engine tests control every collaborator.

use rfx_policy::{PolicyScanner, ScanViolation, TestSignal, TestSignalProvider};
use std::path::{Path, PathBuf};

/// Initialize test-visible tracing output (idempotent)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// A temp directory holding real files for executor-path tests
#[derive(Debug)]
pub struct TempWorkspace {
    dir: tempfile::TempDir,
}

impl TempWorkspace {
    /// Fresh empty workspace
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Write a file and return its absolute path
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write fixture file");
        path
    }

    /// Absolute path of a (possibly not yet existing) file
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Read a file back
    #[must_use]
    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("read fixture file")
    }

    /// Whether a file currently exists
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Test-signal provider returning one fixed signal
#[derive(Debug, Clone, Copy)]
pub struct FixedSignal(pub TestSignal);

impl TestSignalProvider for FixedSignal {
    fn test_signal(&self, _paths: &[&Path]) -> TestSignal {
        self.0
    }
}

/// Scanner returning a fixed violation list (empty = clean)
#[derive(Debug, Clone, Default)]
pub struct StaticScanner(pub Vec<ScanViolation>);

impl StaticScanner {
    /// Scanner that never finds anything
    #[must_use]
    pub fn clean() -> Self {
        Self::default()
    }

    /// Scanner that always reports one violation
    #[must_use]
    pub fn violating(rule: &str, message: &str) -> Self {
        Self(vec![ScanViolation {
            rule: rule.to_string(),
            path: None,
            message: message.to_string(),
        }])
    }
}

impl PolicyScanner for StaticScanner {
    fn scan(&self, _paths: &[&Path]) -> Vec<ScanViolation> {
        self.0.clone()
    }
}
