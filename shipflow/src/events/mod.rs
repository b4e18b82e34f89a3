//! Lifecycle events emitted by a pipeline run.
//!
//! A [`crate::task::Task`] owns its sink; there is no process-wide sink.

mod event;
mod sink;

pub use event::RunEvent;
pub use sink::{
    ChannelEventSink, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
};

/// Emitted once when a run begins, before validation.
pub const TASK_STARTED: &str = "task.started";
/// Emitted before a stage body runs.
pub const STAGE_STARTED: &str = "stage.started";
/// Emitted when a gated stage is skipped after an earlier failure.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// Emitted after a stage and its post-run check finish.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Emitted once when the run is finalized.
pub const TASK_COMPLETED: &str = "task.completed";
