//! Testing utilities for shipflow pipelines.
//!
//! This module provides:
//! - Mock sources, modifiers, destinations and actions
//! - A scriptable stage for driving the orchestrator

mod mocks;
mod stages;

pub use mocks::{MockAction, MockDestination, MockModifier, MockSource};
pub use stages::{MockStage, StageBehavior, StageJournal};
