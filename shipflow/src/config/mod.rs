//! Configuration aggregates and their persisted form.
//!
//! This module provides:
//! - [`Entry`], the enabled/variant/provider slot shared by all providers
//! - [`ConfigurationAggregate`], the ordered source/modifier/destination lists
//! - Versioned documents and the numbered migration chain

mod aggregate;
mod document;
mod entry;
mod migrations;

pub use aggregate::ConfigurationAggregate;
pub use document::{ActionEntryDocument, ConfigDocument, EntryDocument, TaskDocument};
pub use entry::{ActionEntry, DestinationEntry, Entry, ModifierEntry, SourceEntry};
pub use migrations::{migrate, CURRENT_VERSION};
