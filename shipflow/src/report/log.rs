//! Log lines recorded into step results.

use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a report log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    /// Informational.
    Info,
    /// Advisory; never fails a step.
    Warning,
    /// An error message. Logging one does not fail the step by itself.
    Error,
    /// A caught panic or error propagated out of a stage.
    Exception,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
            Self::Exception => write!(f, "Exception"),
        }
    }
}

/// One append-only log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// Severity of the line.
    pub severity: LogSeverity,
    /// The message.
    pub message: String,
    /// When the line was recorded.
    pub timestamp: Timestamp,
}

impl LogLine {
    /// Creates a log line stamped with the current time.
    #[must_use]
    pub fn new(severity: LogSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: now_utc(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}
