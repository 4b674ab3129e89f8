//! Change descriptors - one proposed edit to one file
//!
//! A [`ChangeDescriptor`] is uniquely addressable by `(SessionId, path)`;
//! at most one live descriptor exists per file per session, and a later
//! descriptor for the same path supersedes the earlier one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of file mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A file that did not exist before
    Create,
    /// In-place content replacement
    Modify,
    /// File removal
    Delete,
    /// Move to a new path (modeled downstream as delete + create)
    Rename,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Modify => write!(f, "modify"),
            Self::Delete => write!(f, "delete"),
            Self::Rename => write!(f, "rename"),
        }
    }
}

/// Source refactoring classification, mechanical to semantic
///
/// The ordering here is the risk spectrum: mechanical kinds carry a base
/// confidence weight near 1.0, semantic rewrites carry a fixed discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefactorKind {
    /// Whitespace/formatting only
    FormatOnly,
    /// Import statement fixups
    UpdateImport,
    /// Symbol rename across files
    RenameSymbol,
    /// Extract a function/block into a new definition
    ExtractFunction,
    /// Inline a definition at its call sites
    InlineFunction,
    /// Semantic logic rewrite
    LogicRewrite,
}

impl RefactorKind {
    /// Base confidence weight for this change classification
    #[must_use]
    pub const fn base_weight(self) -> f64 {
        match self {
            Self::FormatOnly => 0.98,
            Self::UpdateImport => 0.95,
            Self::RenameSymbol => 0.85,
            Self::ExtractFunction => 0.75,
            Self::InlineFunction => 0.70,
            Self::LogicRewrite => 0.55,
        }
    }

    /// Whether this kind is mechanical (no semantic impact expected)
    #[inline]
    #[must_use]
    pub const fn is_mechanical(self) -> bool {
        matches!(self, Self::FormatOnly | Self::UpdateImport)
    }
}

impl fmt::Display for RefactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FormatOnly => write!(f, "format-only"),
            Self::UpdateImport => write!(f, "update-import"),
            Self::RenameSymbol => write!(f, "rename-symbol"),
            Self::ExtractFunction => write!(f, "extract-function"),
            Self::InlineFunction => write!(f, "inline-function"),
            Self::LogicRewrite => write!(f, "logic-rewrite"),
        }
    }
}

/// One proposed edit to one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    /// File the edit targets
    pub path: PathBuf,

    /// Mutation kind
    pub kind: ChangeKind,

    /// Replacement content (required for create/modify/rename)
    pub new_content: Option<String>,

    /// Destination path (required for rename)
    pub target_path: Option<PathBuf>,

    /// Refactoring classification driving the confidence weight
    pub refactor_kind: RefactorKind,

    /// Confidence hint from the originating generator, if any
    pub confidence_hint: Option<f64>,
}

impl ChangeDescriptor {
    /// Descriptor creating a new file
    #[must_use]
    pub fn create(
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        refactor_kind: RefactorKind,
    ) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Create,
            new_content: Some(content.into()),
            target_path: None,
            refactor_kind,
            confidence_hint: None,
        }
    }

    /// Descriptor replacing an existing file's content
    #[must_use]
    pub fn modify(
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        refactor_kind: RefactorKind,
    ) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modify,
            new_content: Some(content.into()),
            target_path: None,
            refactor_kind,
            confidence_hint: None,
        }
    }

    /// Descriptor removing a file
    #[must_use]
    pub fn delete(path: impl Into<PathBuf>, refactor_kind: RefactorKind) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Delete,
            new_content: None,
            target_path: None,
            refactor_kind,
            confidence_hint: None,
        }
    }

    /// Descriptor moving a file, optionally rewriting its content
    #[must_use]
    pub fn rename(
        path: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        new_content: Option<String>,
        refactor_kind: RefactorKind,
    ) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Rename,
            new_content,
            target_path: Some(target.into()),
            refactor_kind,
            confidence_hint: None,
        }
    }

    /// Attach a generator confidence hint (clamped to [0, 1])
    #[inline]
    #[must_use]
    pub fn with_confidence_hint(mut self, hint: f64) -> Self {
        self.confidence_hint = Some(hint.clamp(0.0, 1.0));
        self
    }

    /// Check descriptor shape against its kind
    ///
    /// # Errors
    /// Returns error if required fields are missing for the kind, or if
    /// fields that make no sense for the kind are present.
    pub fn validate(&self) -> Result<(), ChangeError> {
        match self.kind {
            ChangeKind::Create | ChangeKind::Modify => {
                if self.new_content.is_none() {
                    return Err(ChangeError::MissingContent {
                        path: self.path.clone(),
                        kind: self.kind,
                    });
                }
                if self.target_path.is_some() {
                    return Err(ChangeError::UnexpectedTarget {
                        path: self.path.clone(),
                        kind: self.kind,
                    });
                }
            }
            ChangeKind::Delete => {
                if self.new_content.is_some() {
                    return Err(ChangeError::UnexpectedContent {
                        path: self.path.clone(),
                    });
                }
                if self.target_path.is_some() {
                    return Err(ChangeError::UnexpectedTarget {
                        path: self.path.clone(),
                        kind: self.kind,
                    });
                }
            }
            ChangeKind::Rename => {
                let Some(target) = &self.target_path else {
                    return Err(ChangeError::MissingTarget {
                        path: self.path.clone(),
                    });
                };
                if target == &self.path {
                    return Err(ChangeError::RenameToSelf {
                        path: self.path.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Every on-disk path this change touches (source, plus rename target)
    #[must_use]
    pub fn touched_paths(&self) -> Vec<&Path> {
        match (&self.kind, &self.target_path) {
            (ChangeKind::Rename, Some(target)) => vec![self.path.as_path(), target.as_path()],
            _ => vec![self.path.as_path()],
        }
    }

    /// Whether this change adds a path that was not in the working set
    #[inline]
    #[must_use]
    pub fn introduces_path(&self) -> bool {
        matches!(self.kind, ChangeKind::Create | ChangeKind::Rename)
    }
}

/// Errors in change descriptor shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    /// Content required for this kind
    #[error("{kind} change for {path:?} requires new content")]
    MissingContent { path: PathBuf, kind: ChangeKind },

    /// Content present where it is meaningless
    #[error("delete change for {path:?} must not carry content")]
    UnexpectedContent { path: PathBuf },

    /// Rename requires a destination
    #[error("rename change for {path:?} requires a target path")]
    MissingTarget { path: PathBuf },

    /// Target present on a non-rename
    #[error("{kind} change for {path:?} must not carry a target path")]
    UnexpectedTarget { path: PathBuf, kind: ChangeKind },

    /// Rename destination equals the source
    #[error("rename for {path:?} targets itself")]
    RenameToSelf { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_create_is_valid() {
        let d = ChangeDescriptor::create("a.ts", "export const a = 1;", RefactorKind::LogicRewrite);
        assert!(d.validate().is_ok());
        assert_eq!(d.kind, ChangeKind::Create);
    }

    #[test]
    fn descriptor_modify_requires_content() {
        let mut d = ChangeDescriptor::modify("a.ts", "x", RefactorKind::FormatOnly);
        d.new_content = None;
        assert!(matches!(
            d.validate(),
            Err(ChangeError::MissingContent { .. })
        ));
    }

    #[test]
    fn descriptor_delete_rejects_content() {
        let mut d = ChangeDescriptor::delete("a.ts", RefactorKind::LogicRewrite);
        d.new_content = Some("leftover".into());
        assert!(matches!(
            d.validate(),
            Err(ChangeError::UnexpectedContent { .. })
        ));
    }

    #[test]
    fn descriptor_rename_requires_target() {
        let mut d = ChangeDescriptor::rename("a.ts", "b.ts", None, RefactorKind::RenameSymbol);
        assert!(d.validate().is_ok());

        d.target_path = None;
        assert!(matches!(
            d.validate(),
            Err(ChangeError::MissingTarget { .. })
        ));
    }

    #[test]
    fn descriptor_rename_to_self_rejected() {
        let d = ChangeDescriptor::rename("a.ts", "a.ts", None, RefactorKind::RenameSymbol);
        assert!(matches!(
            d.validate(),
            Err(ChangeError::RenameToSelf { .. })
        ));
    }

    #[test]
    fn descriptor_touched_paths_includes_rename_target() {
        let d = ChangeDescriptor::rename("old.ts", "new.ts", None, RefactorKind::RenameSymbol);
        let touched = d.touched_paths();
        assert_eq!(touched.len(), 2);
        assert!(touched.contains(&Path::new("old.ts")));
        assert!(touched.contains(&Path::new("new.ts")));
    }

    #[test]
    fn confidence_hint_is_clamped() {
        let d = ChangeDescriptor::modify("a.ts", "x", RefactorKind::FormatOnly)
            .with_confidence_hint(3.0);
        assert_eq!(d.confidence_hint, Some(1.0));
    }

    #[test]
    fn weights_follow_risk_spectrum() {
        assert!(RefactorKind::FormatOnly.base_weight() > RefactorKind::RenameSymbol.base_weight());
        assert!(
            RefactorKind::RenameSymbol.base_weight() > RefactorKind::LogicRewrite.base_weight()
        );
        assert!(RefactorKind::UpdateImport.is_mechanical());
        assert!(!RefactorKind::LogicRewrite.is_mechanical());
    }
}
