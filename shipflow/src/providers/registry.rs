//! Start-up registration table mapping variant tags to factories.

use super::{local, Action, Destination, Modifier, Persist, ProviderBlob, Source};
use crate::errors::{ProviderKind, Result, ShipflowError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Factory function type for sources.
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn Source> + Send + Sync>;
/// Factory function type for modifiers.
pub type ModifierFactory = Arc<dyn Fn() -> Box<dyn Modifier> + Send + Sync>;
/// Factory function type for destinations.
pub type DestinationFactory = Arc<dyn Fn() -> Box<dyn Destination> + Send + Sync>;
/// Factory function type for actions.
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn Action> + Send + Sync>;

struct FactoryTable<T: ?Sized> {
    kind: ProviderKind,
    factories: RwLock<BTreeMap<String, Arc<dyn Fn() -> Box<T> + Send + Sync>>>,
}

impl<T: ?Sized + Persist> FactoryTable<T> {
    fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    fn register(&self, tag: String, factory: Arc<dyn Fn() -> Box<T> + Send + Sync>) {
        self.factories.write().insert(tag, factory);
    }

    fn create(&self, tag: &str, blob: &ProviderBlob) -> Result<Arc<T>> {
        let factory = self
            .factories
            .read()
            .get(tag)
            .cloned()
            .ok_or_else(|| ShipflowError::unknown_variant(self.kind, tag))?;
        let mut provider = factory();
        provider.load_blob(blob)?;
        Ok(Arc::from(provider))
    }

    fn tags(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    fn contains(&self, tag: &str) -> bool {
        self.factories.read().contains_key(tag)
    }
}

/// Registry of provider variants.
///
/// Every provider implementation is registered explicitly under the tag it
/// reports from [`Persist::type_tag`]; loading a persisted entry looks the
/// tag up here.
pub struct ProviderRegistry {
    sources: FactoryTable<dyn Source>,
    modifiers: FactoryTable<dyn Modifier>,
    destinations: FactoryTable<dyn Destination>,
    actions: FactoryTable<dyn Action>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: FactoryTable::new(ProviderKind::Source),
            modifiers: FactoryTable::new(ProviderKind::Modifier),
            destinations: FactoryTable::new(ProviderKind::Destination),
            actions: FactoryTable::new(ProviderKind::Action),
        }
    }

    /// Creates a registry with the built-in local providers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_source(local::LocalFileSource::TAG, || {
            Box::new(local::LocalFileSource::default())
        });
        registry.register_destination(local::LocalFolderDestination::TAG, || {
            Box::new(local::LocalFolderDestination::default())
        });
        registry.register_action(local::LogAction::TAG, || {
            Box::new(local::LogAction::default())
        });
        registry
    }

    /// Registers a source factory, replacing any previous one for `tag`.
    pub fn register_source<F>(&self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Source> + Send + Sync + 'static,
    {
        self.sources.register(tag.into(), Arc::new(factory));
    }

    /// Registers a modifier factory, replacing any previous one for `tag`.
    pub fn register_modifier<F>(&self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Modifier> + Send + Sync + 'static,
    {
        self.modifiers.register(tag.into(), Arc::new(factory));
    }

    /// Registers a destination factory, replacing any previous one for `tag`.
    pub fn register_destination<F>(&self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Destination> + Send + Sync + 'static,
    {
        self.destinations.register(tag.into(), Arc::new(factory));
    }

    /// Registers an action factory, replacing any previous one for `tag`.
    pub fn register_action<F>(&self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.actions.register(tag.into(), Arc::new(factory));
    }

    /// Builds a source for `tag` and loads `blob` into it.
    pub fn create_source(&self, tag: &str, blob: &ProviderBlob) -> Result<Arc<dyn Source>> {
        self.sources.create(tag, blob)
    }

    /// Builds a modifier for `tag` and loads `blob` into it.
    pub fn create_modifier(&self, tag: &str, blob: &ProviderBlob) -> Result<Arc<dyn Modifier>> {
        self.modifiers.create(tag, blob)
    }

    /// Builds a destination for `tag` and loads `blob` into it.
    pub fn create_destination(
        &self,
        tag: &str,
        blob: &ProviderBlob,
    ) -> Result<Arc<dyn Destination>> {
        self.destinations.create(tag, blob)
    }

    /// Builds an action for `tag` and loads `blob` into it.
    pub fn create_action(&self, tag: &str, blob: &ProviderBlob) -> Result<Arc<dyn Action>> {
        self.actions.create(tag, blob)
    }

    /// Returns the registered tags for one capability.
    #[must_use]
    pub fn tags(&self, kind: ProviderKind) -> Vec<String> {
        match kind {
            ProviderKind::Source => self.sources.tags(),
            ProviderKind::Modifier => self.modifiers.tags(),
            ProviderKind::Destination => self.destinations.tags(),
            ProviderKind::Action => self.actions.tags(),
        }
    }

    /// Returns true if `tag` is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: ProviderKind, tag: &str) -> bool {
        match kind {
            ProviderKind::Source => self.sources.contains(tag),
            ProviderKind::Modifier => self.modifiers.contains(tag),
            ProviderKind::Destination => self.destinations.contains(tag),
            ProviderKind::Action => self.actions.contains(tag),
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("sources", &self.sources.tags())
            .field("modifiers", &self.modifiers.tags())
            .field("destinations", &self.destinations.tags())
            .field("actions", &self.actions.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSource;

    #[test]
    fn test_builtins_registered() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.contains(ProviderKind::Source, local::LocalFileSource::TAG));
        assert!(registry.contains(ProviderKind::Destination, local::LocalFolderDestination::TAG));
        assert!(registry.contains(ProviderKind::Action, local::LogAction::TAG));
        assert!(registry.tags(ProviderKind::Modifier).is_empty());
    }

    #[test]
    fn test_create_loads_blob() {
        let registry = ProviderRegistry::new();
        registry.register_source(MockSource::TAG, || Box::new(MockSource::new()));

        let mut blob = ProviderBlob::new();
        blob.insert("label".to_string(), serde_json::json!("nightly"));
        let source = registry.create_source(MockSource::TAG, &blob).unwrap();

        assert_eq!(source.type_tag(), MockSource::TAG);
        assert_eq!(source.to_blob().get("label"), Some(&serde_json::json!("nightly")));
    }

    #[test]
    fn test_unknown_tag() {
        let registry = ProviderRegistry::new();
        let err = registry
            .create_destination("carrier-pigeon", &ProviderBlob::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ShipflowError::UnknownVariant {
                kind: ProviderKind::Destination,
                ..
            }
        ));
    }
}
