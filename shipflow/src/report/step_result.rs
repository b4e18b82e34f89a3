//! A single reportable unit of work.

use super::{LogLine, LogSeverity};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct StepState {
    successful: bool,
    fail_reason: String,
    logs: Vec<LogLine>,
}

/// The outcome of one unit of work inside a stage.
///
/// Several work items of the same stage may log into their results
/// concurrently, so every mutation takes the per-result mutex. Failing a
/// result also fails the report that created it.
#[derive(Debug)]
pub struct StepResult {
    state: Mutex<StepState>,
    /// `f64` bits of the last reported progress.
    progress: AtomicU64,
    report_successful: Arc<AtomicBool>,
}

impl StepResult {
    pub(crate) fn new(report_successful: Arc<AtomicBool>) -> Self {
        Self {
            state: Mutex::new(StepState {
                successful: true,
                fail_reason: String::new(),
                logs: Vec::new(),
            }),
            progress: AtomicU64::new(0f64.to_bits()),
            report_successful,
        }
    }

    /// Creates a result that is not attached to any report.
    ///
    /// Useful for exercising providers in isolation.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Arc::new(AtomicBool::new(true)))
    }

    /// Appends a line with the given severity.
    pub fn log(&self, severity: LogSeverity, message: impl Into<String>) {
        self.state.lock().logs.push(LogLine::new(severity, message));
    }

    /// Appends an info line.
    pub fn add_log(&self, message: impl Into<String>) {
        self.log(LogSeverity::Info, message);
    }

    /// Appends a warning line.
    pub fn add_warning(&self, message: impl Into<String>) {
        self.log(LogSeverity::Warning, message);
    }

    /// Appends an error line.
    pub fn add_error(&self, message: impl Into<String>) {
        self.log(LogSeverity::Error, message);
    }

    /// Appends an exception line.
    pub fn add_exception(&self, message: impl Into<String>) {
        self.log(LogSeverity::Exception, message);
    }

    /// Marks the result as failed and fails the owning report.
    ///
    /// The first reason is kept as the fail reason; later calls record
    /// their reason as an error line instead.
    pub fn set_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.state.lock();
        if state.successful {
            state.successful = false;
            state.fail_reason = reason;
        } else if reason != state.fail_reason {
            state.logs.push(LogLine::new(LogSeverity::Error, reason));
        }
        self.report_successful.store(false, Ordering::SeqCst);
    }

    /// Returns whether the result is still successful.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.state.lock().successful
    }

    /// Returns the fail reason, if the result failed.
    #[must_use]
    pub fn fail_reason(&self) -> Option<String> {
        let state = self.state.lock();
        if state.successful {
            None
        } else {
            Some(state.fail_reason.clone())
        }
    }

    /// Returns a copy of the logs in emission order.
    #[must_use]
    pub fn logs(&self) -> Vec<LogLine> {
        self.state.lock().logs.clone()
    }

    /// Returns the number of log lines.
    #[must_use]
    pub fn log_count(&self) -> usize {
        self.state.lock().logs.len()
    }

    /// Sets the fractional progress, clamped to `[0, 1]`.
    pub fn set_progress(&self, progress: f64) {
        let clamped = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        self.progress.store(clamped.to_bits(), Ordering::SeqCst);
    }

    /// Returns the last reported progress.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::SeqCst))
    }
}
