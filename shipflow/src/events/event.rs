//! The lifecycle events a run emits.

use super::{STAGE_COMPLETED, STAGE_SKIPPED, STAGE_STARTED, TASK_COMPLETED, TASK_STARTED};
use crate::core::StageType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step in the life of a pipeline run.
///
/// Serialized with a `type` field holding [`RunEvent::event_type`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// The run began.
    #[serde(rename = "task.started")]
    TaskStarted {
        /// Task identity.
        task: Uuid,
        /// Task display name.
        name: String,
    },
    /// A stage body is about to run.
    #[serde(rename = "stage.started")]
    StageStarted {
        /// Task identity.
        task: Uuid,
        /// The stage.
        stage: StageType,
    },
    /// A gated stage was skipped after an earlier failure.
    #[serde(rename = "stage.skipped")]
    StageSkipped {
        /// Task identity.
        task: Uuid,
        /// The stage.
        stage: StageType,
    },
    /// A stage and its post-run check finished.
    #[serde(rename = "stage.completed")]
    StageCompleted {
        /// Task identity.
        task: Uuid,
        /// The stage.
        stage: StageType,
        /// Whether the stage recorded no failure.
        successful: bool,
    },
    /// The run was finalized.
    #[serde(rename = "task.completed")]
    TaskCompleted {
        /// Task identity.
        task: Uuid,
        /// Final outcome.
        successful: bool,
    },
}

impl RunEvent {
    /// The dotted event name, e.g. `stage.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => TASK_STARTED,
            Self::StageStarted { .. } => STAGE_STARTED,
            Self::StageSkipped { .. } => STAGE_SKIPPED,
            Self::StageCompleted { .. } => STAGE_COMPLETED,
            Self::TaskCompleted { .. } => TASK_COMPLETED,
        }
    }

    /// The task the event belongs to.
    #[must_use]
    pub fn task(&self) -> Uuid {
        match self {
            Self::TaskStarted { task, .. }
            | Self::StageStarted { task, .. }
            | Self::StageSkipped { task, .. }
            | Self::StageCompleted { task, .. }
            | Self::TaskCompleted { task, .. } => *task,
        }
    }

    /// The stage, for stage events.
    #[must_use]
    pub fn stage(&self) -> Option<StageType> {
        match self {
            Self::StageStarted { stage, .. }
            | Self::StageSkipped { stage, .. }
            | Self::StageCompleted { stage, .. } => Some(*stage),
            Self::TaskStarted { .. } | Self::TaskCompleted { .. } => None,
        }
    }
}
