//! Error types for the shipflow engine.
//!
//! Pipeline failures are not errors in this sense: they are recorded in the
//! [`Report`](crate::report::Report). `ShipflowError` covers the operations
//! that hand a result back to their caller, mostly loading and persisting
//! configuration documents.

use std::fmt;
use uuid::Uuid;
use thiserror::Error;

/// The main error type for shipflow operations.
#[derive(Debug, Error)]
pub enum ShipflowError {
    /// A persisted document does not have the expected shape.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A persisted document was written by a newer version of the engine.
    #[error("Unsupported document version {found} (current version is {current})")]
    UnsupportedVersion {
        /// The version stored in the document.
        found: u32,
        /// The newest version this build understands.
        current: u32,
    },

    /// A migration step could not be applied.
    #[error("Migration from version {from} failed: {reason}")]
    Migration {
        /// The version the migration started from.
        from: u32,
        /// Why the migration failed.
        reason: String,
    },

    /// No provider is registered under the requested variant tag.
    #[error("Unknown {kind} variant '{tag}'")]
    UnknownVariant {
        /// The provider capability that was looked up.
        kind: ProviderKind,
        /// The variant tag that could not be resolved.
        tag: String,
    },

    /// A provider rejected its persisted blob.
    #[error("Invalid blob for '{tag}': {reason}")]
    InvalidBlob {
        /// The provider variant tag.
        tag: String,
        /// Why the blob was rejected.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShipflowError {
    /// Creates an unknown variant error.
    #[must_use]
    pub fn unknown_variant(kind: ProviderKind, tag: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            tag: tag.into(),
        }
    }

    /// Creates an invalid blob error.
    #[must_use]
    pub fn invalid_blob(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBlob {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = ShipflowError> = std::result::Result<T, E>;

/// The four provider capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// A [`Source`](crate::providers::Source).
    Source,
    /// A [`Modifier`](crate::providers::Modifier).
    Modifier,
    /// A [`Destination`](crate::providers::Destination).
    Destination,
    /// An [`Action`](crate::providers::Action).
    Action,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Modifier => write!(f, "modifier"),
            Self::Destination => write!(f, "destination"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// A non-fatal problem found while loading a persisted document.
///
/// The entry it refers to is left unbound; the rest of the document loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIssue {
    /// Which list the entry belongs to.
    pub kind: ProviderKind,
    /// Position of the entry in its list.
    pub index: usize,
    /// The configuration holding the entry; `None` for task-level actions.
    pub config: Option<Uuid>,
    /// Human readable description.
    pub message: String,
}

impl LoadIssue {
    /// Creates a new load issue.
    #[must_use]
    pub fn new(kind: ProviderKind, index: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            index,
            config: None,
            message: message.into(),
        }
    }

    /// Attributes the issue to a configuration.
    #[must_use]
    pub fn in_config(mut self, config: Uuid) -> Self {
        self.config = Some(config);
        self
    }
}

impl fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.config {
            Some(config) => write!(
                f,
                "{} #{} in config {}: {}",
                self.kind, self.index, config, self.message
            ),
            None => write!(f, "{} #{}: {}", self.kind, self.index, self.message),
        }
    }
}
