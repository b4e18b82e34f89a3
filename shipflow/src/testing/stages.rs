//! Scriptable stages for exercising the orchestrator.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::core::StageType;
use crate::report::Report;
use crate::stages::Stage;
use crate::task::Task;

/// Shared record of which stages ran, in order.
pub type StageJournal = Arc<Mutex<Vec<StageType>>>;

/// What a [`MockStage`] does when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageBehavior {
    /// Returns `Ok(true)`.
    Succeed,
    /// Returns `Ok(false)` without recording a failure.
    ReportFailure,
    /// Records a failed result with this reason and returns `Ok(false)`.
    FailWith(String),
    /// Returns an error.
    Error(String),
    /// Panics.
    Panic(String),
    /// Cancels the run token with this reason, then succeeds.
    Cancel(String),
}

/// A stage with scripted behavior that records its calls.
#[derive(Debug)]
pub struct MockStage {
    stage_type: StageType,
    gated: bool,
    behavior: StageBehavior,
    post_result: bool,
    steps: usize,
    step_delay: Duration,
    journal: Option<StageJournal>,
    calls: AtomicUsize,
}

impl MockStage {
    /// Creates a gated stage that succeeds.
    #[must_use]
    pub fn new(stage_type: StageType) -> Self {
        Self {
            stage_type,
            gated: true,
            behavior: StageBehavior::Succeed,
            post_result: true,
            steps: 0,
            step_delay: Duration::ZERO,
            journal: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Runs even after an earlier failure.
    #[must_use]
    pub fn ungated(mut self) -> Self {
        self.gated = false;
        self
    }

    /// Sets what `run` does.
    #[must_use]
    pub fn with_behavior(mut self, behavior: StageBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Sets what `post_run_result` returns.
    #[must_use]
    pub fn with_post_result(mut self, ok: bool) -> Self {
        self.post_result = ok;
        self
    }

    /// Reports progress on one result in `steps` increments, sleeping
    /// `delay` before each.
    #[must_use]
    pub fn with_progress_steps(mut self, steps: usize, delay: Duration) -> Self {
        self.steps = steps;
        self.step_delay = delay;
        self
    }

    /// Appends this stage's type to `journal` whenever it runs.
    #[must_use]
    pub fn with_journal(mut self, journal: StageJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Number of `run` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for MockStage {
    fn stage_type(&self) -> StageType {
        self.stage_type
    }

    fn requires_everything_before_to_succeed(&self) -> bool {
        self.gated
    }

    #[allow(clippy::cast_precision_loss)]
    async fn run(
        &self,
        _task: &Task,
        report: &Report,
        token: &CancellationToken,
    ) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.lock().push(self.stage_type);
        }

        if self.steps > 0 {
            let result = report.new_report(self.stage_type);
            for step in 1..=self.steps {
                tokio::time::sleep(self.step_delay).await;
                result.set_progress(step as f64 / self.steps as f64);
            }
        }

        match &self.behavior {
            StageBehavior::Succeed => Ok(true),
            StageBehavior::ReportFailure => Ok(false),
            StageBehavior::FailWith(reason) => {
                report.new_report(self.stage_type).set_failed(reason.clone());
                Ok(false)
            }
            StageBehavior::Error(message) => Err(anyhow::anyhow!("{message}")),
            StageBehavior::Panic(message) => panic!("{message}"),
            StageBehavior::Cancel(reason) => {
                token.cancel(reason.clone());
                Ok(true)
            }
        }
    }

    async fn post_run_result(&self, _task: &Task, _report: &Report) -> anyhow::Result<bool> {
        Ok(self.post_result)
    }
}
