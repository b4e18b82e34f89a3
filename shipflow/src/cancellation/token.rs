//! Cancellation token shared between a run and whoever may stop it.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// A cloneable handle for cooperative cancellation.
///
/// Clones share state: cancelling any clone cancels all of them. Only the
/// first cancellation reason is kept.
#[derive(Clone, Default)]
pub struct CancellationToken {
    reason: Arc<RwLock<Option<String>>>,
}

impl CancellationToken {
    /// Creates a new, untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Later calls keep the first reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        let mut slot = self.reason.write();
        if slot.is_none() {
            let reason = reason.into();
            debug!(%reason, "Cancellation requested");
            *slot = Some(reason);
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.read().is_some()
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("reason", &self.reason())
            .finish()
    }
}
