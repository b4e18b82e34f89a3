//! Stages that run pre- and post-publish action entries.

use super::work::settle;
use super::Stage;
use crate::cancellation::CancellationToken;
use crate::config::ActionEntry;
use crate::core::StageType;
use crate::report::Report;
use crate::task::Task;
use async_trait::async_trait;
use tracing::{debug, info};

/// Runs enabled action entries in list order.
///
/// Every entry's policy is evaluated against the success flag as it stood
/// when the stage began. A failing action does not change which of the
/// later actions run.
async fn run_actions(
    stage: StageType,
    entries: &[ActionEntry],
    task: &Task,
    report: &Report,
) -> bool {
    let successful = report.is_successful();
    let mut ok = true;
    for (index, action) in entries.iter().enumerate().filter(|(_, a)| a.entry.enabled) {
        let result = report.new_report(stage);
        let label = format!("Action #{} ({})", index + 1, action.entry.label());

        if !action.when_to_run.should_run(successful) {
            debug!(%stage, action = %label, policy = ?action.when_to_run, "Skipping action");
            result.add_log(format!(
                "{label}: skipped ({:?}, run successful: {successful})",
                action.when_to_run
            ));
            result.set_progress(1.0);
            continue;
        }

        let Some(provider) = action.entry.provider() else {
            result.set_failed(format!("{label}: no provider selected"));
            ok = false;
            continue;
        };

        info!(%stage, action = %label, "Running action");
        let executed = provider.execute(task.context(), &result).await;
        result.set_progress(1.0);
        ok &= settle(&result, executed, || format!("{label} failed"));
    }
    ok
}

/// Runs the pre-publish actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreActionsStage;

#[async_trait]
impl Stage for PreActionsStage {
    fn stage_type(&self) -> StageType {
        StageType::PreActions
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        Ok(run_actions(self.stage_type(), task.pre_actions(), task, report).await)
    }
}

/// Runs the post-publish actions, even after a failed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostActionsStage;

#[async_trait]
impl Stage for PostActionsStage {
    fn stage_type(&self) -> StageType {
        StageType::PostActions
    }

    fn requires_everything_before_to_succeed(&self) -> bool {
        false
    }

    async fn run(
        &self,
        task: &Task,
        report: &Report,
        _token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        Ok(run_actions(self.stage_type(), task.post_actions(), task, report).await)
    }
}
