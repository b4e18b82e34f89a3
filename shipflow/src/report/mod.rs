//! Structured, thread-safe run reports.
//!
//! A [`Report`] is keyed by stage and sub-phase; each cell holds the ordered
//! [`StepResult`]s created for that stage, and each result holds
//! severity-tagged [`LogLine`]s.

mod log;
mod render;
#[allow(clippy::module_inception)]
mod report;
mod step_result;

pub use log::{LogLine, LogSeverity};
pub use report::Report;
pub use step_result::StepResult;
