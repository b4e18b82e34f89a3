//! The enabled/variant/provider slot.

use crate::providers::{Action, Destination, Modifier, Persist, ProviderBlob, Source, WhenToRun};
use std::fmt;
use std::sync::Arc;

/// One slot binding a provider variant into a configuration.
///
/// An entry can name a variant without having a provider bound, for
/// example when the variant is not registered in this build. Such an entry
/// keeps the blob it was loaded with so saving it again loses nothing.
pub struct Entry<P: ?Sized> {
    /// Whether the entry takes part in runs.
    pub enabled: bool,
    variant: Option<String>,
    provider: Option<Arc<P>>,
    stored_blob: ProviderBlob,
}

/// An entry holding a [`Source`].
pub type SourceEntry = Entry<dyn Source>;
/// An entry holding a [`Modifier`].
pub type ModifierEntry = Entry<dyn Modifier>;
/// An entry holding a [`Destination`].
pub type DestinationEntry = Entry<dyn Destination>;

impl<P: ?Sized + Persist> Entry<P> {
    /// Creates an enabled entry with no variant selected.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            enabled: true,
            variant: None,
            provider: None,
            stored_blob: ProviderBlob::new(),
        }
    }

    /// Creates an enabled entry bound to `provider`.
    #[must_use]
    pub fn bound(provider: Arc<P>) -> Self {
        Self {
            enabled: true,
            variant: Some(provider.type_tag().to_string()),
            provider: Some(provider),
            stored_blob: ProviderBlob::new(),
        }
    }

    /// Creates an entry naming `variant` with no provider bound.
    #[must_use]
    pub fn unbound(variant: impl Into<String>, blob: ProviderBlob) -> Self {
        Self {
            enabled: true,
            variant: Some(variant.into()),
            provider: None,
            stored_blob: blob,
        }
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Binds a provider, selecting its variant.
    pub fn bind(&mut self, provider: Arc<P>) {
        self.variant = Some(provider.type_tag().to_string());
        self.provider = Some(provider);
        self.stored_blob.clear();
    }

    /// Returns the selected variant tag.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Returns the bound provider.
    #[must_use]
    pub fn provider(&self) -> Option<&Arc<P>> {
        self.provider.as_ref()
    }

    /// Returns true if a provider is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.provider.is_some()
    }

    /// The provider if the entry is enabled and bound.
    #[must_use]
    pub fn active(&self) -> Option<&Arc<P>> {
        if self.enabled {
            self.provider.as_ref()
        } else {
            None
        }
    }

    /// The blob to persist: the provider's own, or the one kept from loading.
    #[must_use]
    pub fn blob(&self) -> ProviderBlob {
        self.provider
            .as_ref()
            .map_or_else(|| self.stored_blob.clone(), |p| p.to_blob())
    }

    /// A short label for reports, e.g. `local_file` or `<unselected>`.
    #[must_use]
    pub fn label(&self) -> String {
        self.variant
            .clone()
            .unwrap_or_else(|| "<unselected>".to_string())
    }
}

impl<P: ?Sized + Persist> Default for Entry<P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P: ?Sized> Clone for Entry<P> {
    fn clone(&self) -> Self {
        Self {
            enabled: self.enabled,
            variant: self.variant.clone(),
            provider: self.provider.clone(),
            stored_blob: self.stored_blob.clone(),
        }
    }
}

impl<P: ?Sized> fmt::Debug for Entry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("enabled", &self.enabled)
            .field("variant", &self.variant)
            .field("bound", &self.provider.is_some())
            .finish()
    }
}

/// An [`Action`] entry with its run policy.
#[derive(Debug, Clone)]
pub struct ActionEntry {
    /// The underlying slot.
    pub entry: Entry<dyn Action>,
    /// When the action runs.
    pub when_to_run: WhenToRun,
}

impl ActionEntry {
    /// Creates an entry bound to `action`.
    #[must_use]
    pub fn new(action: Arc<dyn Action>, when_to_run: WhenToRun) -> Self {
        Self {
            entry: Entry::bound(action),
            when_to_run,
        }
    }

    /// Wraps an existing slot.
    #[must_use]
    pub fn from_entry(entry: Entry<dyn Action>, when_to_run: WhenToRun) -> Self {
        Self { entry, when_to_run }
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.entry.enabled = enabled;
        self
    }
}
