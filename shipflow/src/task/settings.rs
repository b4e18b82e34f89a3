//! Per-run settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings that shape a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    /// How often in-flight stage progress is sampled, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Root folder for cached artifacts.
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,
    /// File the rendered report is appended to after the run.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Skip report sections that have no log lines.
    #[serde(default)]
    pub ignore_empty_sections: bool,
    /// Template for the description passed to destinations.
    ///
    /// Expanded through each configuration's context. Tokens nothing
    /// resolves are passed through as written, so the default sends a
    /// literal `$VERSION` unless the task context binds `VERSION`.
    #[serde(default = "default_upload_description")]
    pub upload_description: String,
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join("shipflow-cache")
}

fn default_upload_description() -> String {
    "$TASK_NAME $VERSION".to_string()
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            cache_root: default_cache_root(),
            report_path: None,
            ignore_empty_sections: false,
            upload_description: default_upload_description(),
        }
    }
}

impl RunSettings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the progress polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the cache root.
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    /// Appends the rendered report to `path` after each run.
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Skips empty sections when rendering the persisted report.
    #[must_use]
    pub fn with_ignore_empty_sections(mut self, ignore: bool) -> Self {
        self.ignore_empty_sections = ignore;
        self
    }

    /// Sets the upload description template.
    #[must_use]
    pub fn with_upload_description(mut self, template: impl Into<String>) -> Self {
        self.upload_description = template.into();
        self
    }

    /// The polling interval, never shorter than one millisecond.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
