//! Pipeline tasks and their orchestration.
//!
//! This module provides:
//! - [`Task`], which validates its configurations and drives stages in order
//! - [`RunSettings`] for polling, caching and report persistence
//! - [`TaskManager`], an owned registry of tasks

mod manager;
mod settings;
#[allow(clippy::module_inception)]
mod task;
mod validation;

pub use manager::TaskManager;
pub use settings::RunSettings;
pub use task::{CompletionListener, Task};
