//! # Shipflow
//!
//! A release-pipeline orchestration engine.
//!
//! Shipflow gathers build artifacts from configurable sources, transforms
//! them, publishes them to configurable destinations and runs actions
//! around publishing. It provides:
//!
//! - **Ordered stages**: a fixed sequence from preparing sources to cleanup,
//!   with later stages skipped after a failure while cleanup always runs
//! - **Structured reports**: thread-safe, per-stage step results with
//!   severity-tagged logs and text rendering
//! - **Template contexts**: `$TOKEN` expansion chained from configuration to
//!   task, frozen for the duration of a run
//! - **Versioned persistence**: JSON documents with numbered migrations and
//!   an explicit provider registry
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = ConfigurationAggregate::new("windows")
//!     .with_source(Arc::new(LocalFileSource::new("build/game-$VERSION.zip")))
//!     .with_destination(Arc::new(LocalFolderDestination::new("/srv/releases")));
//!
//! let task = Task::new("game").with_config(config);
//! task.context().bind_value("VERSION", "1.4.0");
//!
//! let report = task.run(&default_stages(), &CancellationToken::new()).await;
//! println!("{}", report.render(true));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod providers;
pub mod report;
pub mod stages;
pub mod task;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{
        ActionEntry, ConfigurationAggregate, Entry, TaskDocument, CURRENT_VERSION,
    };
    pub use crate::context::{Context, DateTimeTokens, StaticTokens, TokenResolver};
    pub use crate::core::{StageType, SubPhase};
    pub use crate::errors::{LoadIssue, ProviderKind, ShipflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, RunEvent};
    pub use crate::providers::local::{LocalFileSource, LocalFolderDestination, LogAction};
    pub use crate::providers::{
        Action, Destination, Modifier, ModifierTarget, Persist, ProviderBlob, ProviderRegistry,
        Source, ValidationIssues, WhenToRun,
    };
    pub use crate::report::{LogLine, LogSeverity, Report, StepResult};
    pub use crate::stages::{default_stages, Stage};
    pub use crate::task::{RunSettings, Task, TaskManager};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
