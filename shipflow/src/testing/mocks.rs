//! Mock providers for testing.
//!
//! Every mock persists a single `label` blob key and counts its calls.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::context::Context;
use crate::errors::{Result, ShipflowError};
use crate::providers::{
    Action, Destination, Modifier, ModifierTarget, Persist, ProviderBlob, Source,
    ValidationIssues,
};
use crate::report::StepResult;

fn label_blob(label: Option<&String>) -> ProviderBlob {
    let mut blob = ProviderBlob::new();
    if let Some(label) = label {
        blob.insert("label".to_string(), serde_json::json!(label));
    }
    blob
}

fn load_label(tag: &str, blob: &ProviderBlob) -> Result<Option<String>> {
    match blob.get("label") {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ShipflowError::invalid_blob(
            tag,
            format!("'label' must be a string, got {other}"),
        )),
    }
}

/// A source whose outcome is scripted up front.
///
/// By default `fetch` succeeds and exposes the configured local path.
#[derive(Debug)]
pub struct MockSource {
    label: Option<String>,
    path: Option<PathBuf>,
    fetch_result: bool,
    fetch_delay: Duration,
    validation_error: Option<String>,
    fetched: RwLock<Option<PathBuf>>,
    progress: Mutex<f64>,
    prepare_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    clean_up_calls: AtomicUsize,
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSource {
    /// Variant tag.
    pub const TAG: &'static str = "mock_source";

    /// Creates a source that fetches successfully.
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: None,
            path: None,
            fetch_result: true,
            fetch_delay: Duration::ZERO,
            validation_error: None,
            fetched: RwLock::new(None),
            progress: Mutex::new(0.0),
            prepare_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            clean_up_calls: AtomicUsize::new(0),
        }
    }

    /// Sets the persisted label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the path exposed after a successful fetch.
    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Makes `fetch` fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fetch_result = false;
        self
    }

    /// Makes `fetch` take `delay`, reporting half progress meanwhile.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Makes `validate` report an error.
    #[must_use]
    pub fn with_validation_error(mut self, error: impl Into<String>) -> Self {
        self.validation_error = Some(error.into());
        self
    }

    /// Number of `prepare` calls.
    #[must_use]
    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch` calls.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `clean_up` calls.
    #[must_use]
    pub fn clean_up_calls(&self) -> usize {
        self.clean_up_calls.load(Ordering::SeqCst)
    }
}

impl Persist for MockSource {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn to_blob(&self) -> ProviderBlob {
        label_blob(self.label.as_ref())
    }

    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()> {
        self.label = load_label(Self::TAG, blob)?;
        Ok(())
    }
}

#[async_trait]
impl Source for MockSource {
    async fn prepare(&self, _ctx: &Context, _result: &StepResult) -> bool {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn fetch(&self, _ctx: &Context, result: &StepResult) -> bool {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            *self.progress.lock() = 0.5;
            tokio::time::sleep(self.fetch_delay).await;
        }
        if !self.fetch_result {
            result.add_error("mock fetch failed");
            return false;
        }
        *self.fetched.write() = self.path.clone();
        *self.progress.lock() = 1.0;
        true
    }

    fn fetch_progress(&self) -> f64 {
        *self.progress.lock()
    }

    fn local_path(&self) -> Option<PathBuf> {
        self.fetched.read().clone()
    }

    async fn clean_up(&self) {
        self.clean_up_calls.fetch_add(1, Ordering::SeqCst);
        *self.fetched.write() = None;
    }

    fn validate(&self) -> ValidationIssues {
        match &self.validation_error {
            Some(error) => ValidationIssues::new().with_error(error.clone()),
            None => ValidationIssues::new(),
        }
    }
}

/// A destination that records what it was asked to publish.
#[derive(Debug)]
pub struct MockDestination {
    label: Option<String>,
    publish_result: bool,
    published: Mutex<Vec<(PathBuf, String)>>,
    progress: Mutex<f64>,
    prepare_calls: AtomicUsize,
    clean_up_calls: AtomicUsize,
}

impl Default for MockDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDestination {
    /// Variant tag.
    pub const TAG: &'static str = "mock_destination";

    /// Creates a destination that publishes successfully.
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: None,
            publish_result: true,
            published: Mutex::new(Vec::new()),
            progress: Mutex::new(0.0),
            prepare_calls: AtomicUsize::new(0),
            clean_up_calls: AtomicUsize::new(0),
        }
    }

    /// Sets the persisted label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Makes `publish` fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.publish_result = false;
        self
    }

    /// `(path, description)` of every publish call, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(PathBuf, String)> {
        self.published.lock().clone()
    }

    /// Number of `prepare` calls.
    #[must_use]
    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    /// Number of `clean_up` calls.
    #[must_use]
    pub fn clean_up_calls(&self) -> usize {
        self.clean_up_calls.load(Ordering::SeqCst)
    }
}

impl Persist for MockDestination {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn to_blob(&self) -> ProviderBlob {
        label_blob(self.label.as_ref())
    }

    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()> {
        self.label = load_label(Self::TAG, blob)?;
        Ok(())
    }
}

#[async_trait]
impl Destination for MockDestination {
    async fn prepare(&self, _ctx: &Context, _result: &StepResult) -> bool {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn publish(
        &self,
        path: &Path,
        description: &str,
        _ctx: &Context,
        result: &StepResult,
    ) -> bool {
        self.published
            .lock()
            .push((path.to_path_buf(), description.to_string()));
        if self.publish_result {
            *self.progress.lock() = 1.0;
            result.add_log(format!("Published {}", path.display()));
        }
        self.publish_result
    }

    fn publish_progress(&self) -> f64 {
        *self.progress.lock()
    }

    async fn clean_up(&self) {
        self.clean_up_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A modifier that records the paths it was applied to.
#[derive(Debug)]
pub struct MockModifier {
    label: Option<String>,
    apply_result: bool,
    target_warning: Option<String>,
    applied: Mutex<Vec<PathBuf>>,
}

impl Default for MockModifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModifier {
    /// Variant tag.
    pub const TAG: &'static str = "mock_modifier";

    /// Creates a modifier that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: None,
            apply_result: true,
            target_warning: None,
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Sets the persisted label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Makes `apply` fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.apply_result = false;
        self
    }

    /// Warns once for every source or destination validated against.
    #[must_use]
    pub fn with_target_warning(mut self, warning: impl Into<String>) -> Self {
        self.target_warning = Some(warning.into());
        self
    }

    /// Paths `apply` was called with, in order.
    #[must_use]
    pub fn applied(&self) -> Vec<PathBuf> {
        self.applied.lock().clone()
    }
}

impl Persist for MockModifier {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn to_blob(&self) -> ProviderBlob {
        label_blob(self.label.as_ref())
    }

    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()> {
        self.label = load_label(Self::TAG, blob)?;
        Ok(())
    }
}

#[async_trait]
impl Modifier for MockModifier {
    async fn apply(&self, path: &Path, _ctx: &Context, _result: &StepResult) -> bool {
        self.applied.lock().push(path.to_path_buf());
        self.apply_result
    }

    fn validate_against(&self, _target: ModifierTarget<'_>) -> ValidationIssues {
        match &self.target_warning {
            Some(warning) => ValidationIssues::new().with_warning(warning.clone()),
            None => ValidationIssues::new(),
        }
    }
}

/// An action that counts its executions.
#[derive(Debug)]
pub struct MockAction {
    label: Option<String>,
    execute_result: bool,
    validation_warning: Option<String>,
    executions: AtomicUsize,
}

impl Default for MockAction {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAction {
    /// Variant tag.
    pub const TAG: &'static str = "mock_action";

    /// Creates an action that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            label: None,
            execute_result: true,
            validation_warning: None,
            executions: AtomicUsize::new(0),
        }
    }

    /// Sets the persisted label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Makes `execute` fail.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.execute_result = false;
        self
    }

    /// Makes `validate` report a warning.
    #[must_use]
    pub fn with_validation_warning(mut self, warning: impl Into<String>) -> Self {
        self.validation_warning = Some(warning.into());
        self
    }

    /// Number of `execute` calls.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl Persist for MockAction {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn to_blob(&self) -> ProviderBlob {
        label_blob(self.label.as_ref())
    }

    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()> {
        self.label = load_label(Self::TAG, blob)?;
        Ok(())
    }
}

#[async_trait]
impl Action for MockAction {
    async fn execute(&self, _ctx: &Context, result: &StepResult) -> bool {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(label) = &self.label {
            result.add_log(format!("Executed {label}"));
        }
        self.execute_result
    }

    fn validate(&self) -> ValidationIssues {
        match &self.validation_warning {
            Some(warning) => ValidationIssues::new().with_warning(warning.clone()),
            None => ValidationIssues::new(),
        }
    }
}
