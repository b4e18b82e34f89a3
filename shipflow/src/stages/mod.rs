//! The stage contract and the built-in release stages.
//!
//! A run drives a slice of [`Stage`]s strictly in order. Each stage files
//! its [`crate::report::StepResult`]s under its own [`StageType`] and
//! reports a single success flag back to the orchestrator.

mod actions;
mod cleanup;
mod destinations;
mod sources;
mod work;

pub use actions::{PostActionsStage, PreActionsStage};
pub use cleanup::CleanupStage;
pub use destinations::{PrepareDestinationsStage, UploadStage};
pub use sources::{CacheSourcesStage, GetSourcesStage, ModifySourcesStage, PrepareSourcesStage};

use crate::cancellation::CancellationToken;
use crate::core::StageType;
use crate::report::Report;
use crate::task::Task;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// One step of a release pipeline.
///
/// `run` executes under the `Intra` sub-phase and `post_run_result` under
/// `Post`. Returning `Ok(false)`, an `Err`, or panicking all mark the stage
/// failed; the orchestrator catches the latter two and records them.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// The bucket this stage reports into.
    fn stage_type(&self) -> StageType;

    /// Whether the stage is skipped after an earlier failure.
    fn requires_everything_before_to_succeed(&self) -> bool {
        true
    }

    /// Performs the stage's work.
    async fn run(
        &self,
        task: &Task,
        report: &Report,
        token: &CancellationToken,
    ) -> anyhow::Result<bool>;

    /// Summarizes or double-checks the stage once `run` returned.
    async fn post_run_result(&self, _task: &Task, _report: &Report) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// The standard release sequence, from preparing sources to cleanup.
#[must_use]
pub fn default_stages() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(PrepareSourcesStage),
        Arc::new(GetSourcesStage),
        Arc::new(CacheSourcesStage),
        Arc::new(ModifySourcesStage),
        Arc::new(PrepareDestinationsStage),
        Arc::new(PreActionsStage),
        Arc::new(UploadStage),
        Arc::new(PostActionsStage),
        Arc::new(CleanupStage),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stages_follow_declared_order() {
        let types: Vec<_> = default_stages().iter().map(|s| s.stage_type()).collect();
        let expected: Vec<_> = StageType::ALL[1..].to_vec();
        assert_eq!(types, expected);
    }

    #[test]
    fn test_only_trailing_stages_are_ungated() {
        let ungated: Vec<_> = default_stages()
            .iter()
            .filter(|s| !s.requires_everything_before_to_succeed())
            .map(|s| s.stage_type())
            .collect();
        assert_eq!(ungated, vec![StageType::PostActions, StageType::Cleanup]);
    }
}
