//! The four provider capabilities.

use crate::context::Context;
use crate::errors::Result;
use crate::report::StepResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Opaque provider settings, persisted verbatim under the provider's tag.
pub type ProviderBlob = BTreeMap<String, serde_json::Value>;

/// Persistence contract shared by every provider.
pub trait Persist: Send + Sync + Debug {
    /// The variant tag this provider is registered under.
    fn type_tag(&self) -> &str;

    /// Serializes provider settings.
    fn to_blob(&self) -> ProviderBlob;

    /// Restores provider settings from a blob produced by [`Persist::to_blob`].
    ///
    /// Unknown keys should be ignored so older builds can read newer blobs.
    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()>;
}

/// Structural problems a provider reports before a run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationIssues {
    /// Problems that prevent the run.
    pub errors: Vec<String>,
    /// Advisory notes.
    pub warnings: Vec<String>,
}

impl ValidationIssues {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    /// Adds a warning.
    #[must_use]
    pub fn with_warning(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }

    /// Returns true if there are no errors.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Appends another set, prefixing each message.
    pub fn merge(&mut self, prefix: &str, other: Self) {
        self.errors
            .extend(other.errors.into_iter().map(|e| format!("{prefix}: {e}")));
        self.warnings
            .extend(other.warnings.into_iter().map(|w| format!("{prefix}: {w}")));
    }
}

/// Acquires content and exposes it as a local file or folder.
#[async_trait]
pub trait Source: Persist {
    /// Sets up before fetching.
    async fn prepare(&self, _ctx: &Context, _result: &StepResult) -> bool {
        true
    }

    /// Acquires the content.
    async fn fetch(&self, ctx: &Context, result: &StepResult) -> bool;

    /// Fetch progress in `[0, 1]`.
    fn fetch_progress(&self) -> f64;

    /// Where the fetched file or folder lives, once fetched.
    fn local_path(&self) -> Option<PathBuf>;

    /// Releases anything the source created.
    async fn clean_up(&self) {}

    /// Reports structural errors and warnings.
    fn validate(&self) -> ValidationIssues {
        ValidationIssues::new()
    }
}

/// Publishes content to a target.
#[async_trait]
pub trait Destination: Persist {
    /// Prepares the publish target.
    async fn prepare(&self, _ctx: &Context, _result: &StepResult) -> bool {
        true
    }

    /// Publishes the file or folder at `path`.
    async fn publish(
        &self,
        path: &Path,
        description: &str,
        ctx: &Context,
        result: &StepResult,
    ) -> bool;

    /// Publish progress in `[0, 1]`.
    fn publish_progress(&self) -> f64;

    /// Releases anything the destination created locally.
    async fn clean_up(&self) {}

    /// Reports structural errors and warnings.
    fn validate(&self) -> ValidationIssues {
        ValidationIssues::new()
    }
}

/// What a modifier is validated against.
#[derive(Debug, Clone, Copy)]
pub enum ModifierTarget<'a> {
    /// A source whose content the modifier will transform.
    Source(&'a dyn Source),
    /// A destination that will receive the transformed content.
    Destination(&'a dyn Destination),
}

/// Mutates or checks cached content in place.
#[async_trait]
pub trait Modifier: Persist {
    /// Transforms the file at `path` in place.
    async fn apply(&self, path: &Path, ctx: &Context, result: &StepResult) -> bool;

    /// Reports problems with combining this modifier with `target`.
    fn validate_against(&self, _target: ModifierTarget<'_>) -> ValidationIssues {
        ValidationIssues::new()
    }

    /// Reports structural errors and warnings.
    fn validate(&self) -> ValidationIssues {
        ValidationIssues::new()
    }
}

/// A side effect triggered around publishing.
#[async_trait]
pub trait Action: Persist {
    /// Performs the side effect.
    async fn execute(&self, ctx: &Context, result: &StepResult) -> bool;

    /// Reports structural errors and warnings.
    fn validate(&self) -> ValidationIssues {
        ValidationIssues::new()
    }
}

/// When an action entry runs, relative to the run outcome so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhenToRun {
    /// Regardless of outcome.
    Always,
    /// Never; the entry is kept but inert.
    Never,
    /// Only if everything so far succeeded.
    #[default]
    OnlySuccess,
    /// Only if something failed.
    OnlyFailure,
}

impl WhenToRun {
    /// Evaluates the policy against the run's success flag.
    #[must_use]
    pub fn should_run(self, run_successful: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::OnlySuccess => run_successful,
            Self::OnlyFailure => !run_successful,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_when_to_run() {
        assert!(WhenToRun::Always.should_run(true));
        assert!(WhenToRun::Always.should_run(false));
        assert!(!WhenToRun::Never.should_run(true));
        assert!(WhenToRun::OnlySuccess.should_run(true));
        assert!(!WhenToRun::OnlySuccess.should_run(false));
        assert!(WhenToRun::OnlyFailure.should_run(false));
        assert!(!WhenToRun::OnlyFailure.should_run(true));
    }

    #[test]
    fn test_when_to_run_serialize() {
        let json = serde_json::to_string(&WhenToRun::OnlyFailure).unwrap();
        assert_eq!(json, r#""onlyFailure""#);
        assert_eq!(WhenToRun::default(), WhenToRun::OnlySuccess);
    }

    #[test]
    fn test_validation_issues_merge() {
        let mut issues = ValidationIssues::new().with_warning("top");
        issues.merge(
            "Source #1",
            ValidationIssues::new().with_error("path missing").with_warning("slow"),
        );

        assert!(!issues.is_ok());
        assert_eq!(issues.errors, vec!["Source #1: path missing".to_string()]);
        assert_eq!(issues.warnings.len(), 2);
    }
}
