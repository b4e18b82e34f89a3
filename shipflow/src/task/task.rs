//! The pipeline task and its run loop.

use super::validation::validate;
use super::RunSettings;
use crate::cancellation::CancellationToken;
use crate::config::{
    ActionEntry, ActionEntryDocument, ConfigurationAggregate, TaskDocument, CURRENT_VERSION,
};
use crate::context::{Context, DateTimeTokens};
use crate::core::{StageType, SubPhase};
use crate::errors::LoadIssue;
use crate::events::{EventSink, NoOpEventSink, RunEvent};
use crate::providers::ProviderRegistry;
use crate::report::Report;
use crate::stages::Stage;
use crate::utils::generate_uuid;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Called once with the final report when a run completes.
pub type CompletionListener = Box<dyn Fn(&Arc<Report>) + Send + Sync>;

type StageOutcome = std::thread::Result<anyhow::Result<bool>>;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// One release pipeline: its configurations, actions and run state.
///
/// A task runs at most once. Progress only moves forward, and the owned
/// [`Report`] is the single record of what happened.
pub struct Task {
    id: Uuid,
    name: String,
    description: String,
    configs: Vec<ConfigurationAggregate>,
    pre_actions: Vec<ActionEntry>,
    post_actions: Vec<ActionEntry>,
    settings: RunSettings,
    context: Arc<Context>,
    report: Arc<Report>,
    event_sink: Arc<dyn EventSink>,
    current_stage: RwLock<StageType>,
    /// `f64` bits of the published progress.
    progress: AtomicU64,
    started: AtomicBool,
    complete: AtomicBool,
    listeners: Mutex<Vec<CompletionListener>>,
}

impl Task {
    /// Creates an empty task.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(generate_uuid(), name)
    }

    /// Creates a task with a known identity.
    ///
    /// The task context binds `$TASK_NAME`, `$TASK_ID` and the date tokens.
    #[must_use]
    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        let name = name.into();
        let context = Arc::new(Context::new());
        context.bind_value("TASK_NAME", name.clone());
        context.bind_value("TASK_ID", id.to_string());
        context.add_resolver(Arc::new(DateTimeTokens::new()));

        Self {
            id,
            name,
            description: String::new(),
            configs: Vec::new(),
            pre_actions: Vec::new(),
            post_actions: Vec::new(),
            settings: RunSettings::default(),
            context,
            report: Arc::new(Report::new()),
            event_sink: Arc::new(NoOpEventSink),
            current_stage: RwLock::new(StageType::Validation),
            progress: AtomicU64::new(0f64.to_bits()),
            started: AtomicBool::new(false),
            complete: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a configuration aggregate.
    #[must_use]
    pub fn with_config(mut self, config: ConfigurationAggregate) -> Self {
        self.configs.push(config);
        self
    }

    /// Appends a pre-publish action.
    #[must_use]
    pub fn with_pre_action(mut self, action: ActionEntry) -> Self {
        self.pre_actions.push(action);
        self
    }

    /// Appends a post-publish action.
    #[must_use]
    pub fn with_post_action(mut self, action: ActionEntry) -> Self {
        self.post_actions.push(action);
        self
    }

    /// Replaces the run settings.
    #[must_use]
    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sends lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// All configurations, enabled or not.
    #[must_use]
    pub fn configs(&self) -> &[ConfigurationAggregate] {
        &self.configs
    }

    /// Enabled configurations in list order.
    pub fn enabled_configs(&self) -> impl Iterator<Item = &ConfigurationAggregate> {
        self.configs.iter().filter(|c| c.enabled)
    }

    /// Pre-publish action entries.
    #[must_use]
    pub fn pre_actions(&self) -> &[ActionEntry] {
        &self.pre_actions
    }

    /// Post-publish action entries.
    #[must_use]
    pub fn post_actions(&self) -> &[ActionEntry] {
        &self.post_actions
    }

    /// Returns the run settings.
    #[must_use]
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// The root template context; every configuration context chains to it.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Returns the report, which fills in while the task runs.
    #[must_use]
    pub fn report(&self) -> Arc<Report> {
        self.report.clone()
    }

    /// This task's folder under the cache root.
    #[must_use]
    pub fn task_cache_dir(&self) -> PathBuf {
        self.settings.cache_root.join(self.id.to_string())
    }

    /// Where `config`'s artifacts are cached.
    #[must_use]
    pub fn cache_dir(&self, config: &ConfigurationAggregate) -> PathBuf {
        self.task_cache_dir().join(config.id().to_string())
    }

    /// The stage currently running, or the last one that ran.
    #[must_use]
    pub fn current_stage(&self) -> StageType {
        *self.current_stage.read()
    }

    /// Overall progress in `[0, 1]`; never decreases.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::SeqCst))
    }

    /// True once a run has started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// True once a run has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Whether the run succeeded so far; final once [`Task::is_complete`].
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.report.is_successful()
    }

    /// Registers a listener for run completion.
    ///
    /// Listeners fire exactly once. Registering after completion fires the
    /// listener immediately.
    pub fn on_complete<F>(&self, listener: F)
    where
        F: Fn(&Arc<Report>) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        if self.is_complete() {
            drop(listeners);
            listener(&self.report);
            return;
        }
        listeners.push(Box::new(listener));
    }

    /// Captures the task for persistence.
    #[must_use]
    pub fn to_document(&self) -> TaskDocument {
        TaskDocument {
            version: CURRENT_VERSION,
            guid: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            configs: self.configs.iter().map(ConfigurationAggregate::to_document).collect(),
            pre_actions: self.pre_actions.iter().map(ActionEntryDocument::from_action).collect(),
            post_actions: self.post_actions.iter().map(ActionEntryDocument::from_action).collect(),
        }
    }

    /// Rebuilds a task, binding providers through `registry`.
    ///
    /// Entries that cannot be bound are kept unbound and reported.
    pub fn from_document(
        document: &TaskDocument,
        registry: &ProviderRegistry,
    ) -> (Self, Vec<LoadIssue>) {
        let mut issues = Vec::new();
        let mut task =
            Self::with_id(document.guid, document.name.clone()).with_description(document.description.clone());

        for config in &document.configs {
            let (config, config_issues) = ConfigurationAggregate::from_document(config, registry);
            issues.extend(config_issues);
            task.configs.push(config);
        }
        for (index, action) in document.pre_actions.iter().enumerate() {
            task.pre_actions.push(action.load(index, registry, &mut issues));
        }
        for (index, action) in document.post_actions.iter().enumerate() {
            task.post_actions.push(action.load(index, registry, &mut issues));
        }

        (task, issues)
    }

    /// Runs validation and then `stages` in order.
    ///
    /// A task runs once; calling this again returns the existing report.
    /// Cancellation is honored between stages only.
    pub async fn run(&self, stages: &[Arc<dyn Stage>], token: &CancellationToken) -> Arc<Report> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(task = %self.name, id = %self.id, "Task already ran; returning its report");
            return self.report.clone();
        }

        let report = self.report.clone();
        report.start();
        report.set_sub_phase(SubPhase::Intra);
        info!(task = %self.name, id = %self.id, stages = stages.len(), "Starting run");
        self.emit(RunEvent::TaskStarted {
            task: self.id,
            name: self.name.clone(),
        })
        .await;

        self.freeze_contexts();

        if validate(self, &report) {
            self.run_stages(stages, token, &report).await;
        }

        self.finish(&report).await;
        report
    }

    fn freeze_contexts(&self) {
        for config in &self.configs {
            config.context().set_parent(self.context.clone());
        }
        self.context.cache_callbacks();
        for config in &self.configs {
            config.context().cache_callbacks();
        }
    }

    #[allow(clippy::cast_precision_loss)]
    async fn run_stages(&self, stages: &[Arc<dyn Stage>], token: &CancellationToken, report: &Report) {
        let total = stages.len() as f64;
        let mut cancel_recorded = false;
        // Stage a cancellation seen between stages is recorded under.
        let mut last_ran = StageType::Validation;

        for (index, stage) in stages.iter().enumerate() {
            let stage_type = stage.stage_type();
            *self.current_stage.write() = stage_type;
            report.set_sub_phase(SubPhase::Intra);
            let slot_end = (index + 1) as f64 / total;

            if token.is_cancelled() && !cancel_recorded {
                cancel_recorded = true;
                record_cancellation(report, last_ran, token);
            }

            if stage.requires_everything_before_to_succeed() && !report.is_successful() {
                info!(stage = %stage_type, "Skipping stage after earlier failure");
                self.emit(RunEvent::StageSkipped {
                    task: self.id,
                    stage: stage_type,
                })
                .await;
                self.publish_progress(slot_end);
                continue;
            }

            last_ran = stage_type;
            info!(stage = %stage_type, "Running stage");
            self.emit(RunEvent::StageStarted {
                task: self.id,
                stage: stage_type,
            })
            .await;

            let outcome = self.drive(stage.as_ref(), report, token, index, total).await;
            let ran = absorb(report, stage_type, outcome);

            report.set_sub_phase(SubPhase::Post);
            let outcome = AssertUnwindSafe(stage.post_run_result(self, report))
                .catch_unwind()
                .await;
            let checked = absorb(report, stage_type, outcome);

            if !(ran && checked) && !report.stage_failed(stage_type) {
                report
                    .new_report(stage_type)
                    .set_failed(format!("{} reported failure", stage_type.title()));
            }

            if token.is_cancelled() && !cancel_recorded {
                cancel_recorded = true;
                record_cancellation(report, stage_type, token);
            }

            let successful = !report.stage_failed(stage_type);
            info!(stage = %stage_type, successful, "Stage finished");
            self.emit(RunEvent::StageCompleted {
                task: self.id,
                stage: stage_type,
                successful,
            })
            .await;
            self.publish_progress(slot_end);
        }
        report.set_sub_phase(SubPhase::Intra);
    }

    /// Drives one stage body, sampling its progress on every tick.
    #[allow(clippy::cast_precision_loss)]
    async fn drive(
        &self,
        stage: &dyn Stage,
        report: &Report,
        token: &CancellationToken,
        index: usize,
        total: f64,
    ) -> StageOutcome {
        let stage_type = stage.stage_type();
        let work = AssertUnwindSafe(stage.run(self, report, token)).catch_unwind();
        tokio::pin!(work);
        let mut ticker = tokio::time::interval(self.settings.poll_interval());

        loop {
            tokio::select! {
                outcome = &mut work => return outcome,
                _ = ticker.tick() => {
                    let local = report.progress(stage_type, SubPhase::Intra);
                    self.publish_progress((index as f64 + local) / total);
                }
            }
        }
    }

    fn publish_progress(&self, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let _ = self
            .progress
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                (value > f64::from_bits(bits)).then(|| value.to_bits())
            });
    }

    async fn finish(&self, report: &Arc<Report>) {
        report.finish();
        self.publish_progress(1.0);
        let listeners = {
            let mut pending = self.listeners.lock();
            self.complete.store(true, Ordering::SeqCst);
            std::mem::take(&mut *pending)
        };

        let successful = report.is_successful();
        if successful {
            info!(task = %self.name, "Run succeeded");
        } else {
            warn!(task = %self.name, reasons = ?report.fail_reasons(), "Run failed");
        }

        if let Some(path) = &self.settings.report_path {
            if let Err(e) = report.persist(path, self.settings.ignore_empty_sections).await {
                warn!(path = %path.display(), error = %e, "Cannot persist report");
            }
        }

        for listener in listeners {
            if let Err(e) = std::panic::catch_unwind(AssertUnwindSafe(|| listener(report))) {
                warn!("Completion listener panicked: {}", panic_message(e.as_ref()));
            }
        }

        self.emit(RunEvent::TaskCompleted {
            task: self.id,
            successful,
        })
        .await;
    }

    async fn emit(&self, event: RunEvent) {
        self.event_sink.emit(&event).await;
    }
}

/// Turns a stage outcome into a flag, recording errors and panics.
fn absorb(report: &Report, stage_type: StageType, outcome: StageOutcome) -> bool {
    let message = match outcome {
        Ok(Ok(ok)) => return ok,
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => panic_message(payload.as_ref()),
    };
    error!(stage = %stage_type, error = %message, "Unhandled exception in stage");
    let result = report.new_report(stage_type);
    result.add_exception(message);
    result.set_failed(format!("Unhandled exception in {}", stage_type.title()));
    false
}

fn record_cancellation(report: &Report, stage_type: StageType, token: &CancellationToken) {
    let reason = token.reason().unwrap_or_else(|| "no reason given".to_string());
    warn!(stage = %stage_type, %reason, "Run cancelled");
    report
        .new_report(stage_type)
        .set_failed(format!("Run cancelled: {reason}"));
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("configs", &self.configs.len())
            .field("pre_actions", &self.pre_actions.len())
            .field("post_actions", &self.post_actions.len())
            .field("current_stage", &self.current_stage())
            .field("percent_complete", &self.percent_complete())
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}
