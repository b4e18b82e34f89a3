//! The configuration aggregate consumed by every stage.

use super::{DestinationEntry, Entry, ModifierEntry, SourceEntry};
use crate::context::Context;
use crate::providers::{Destination, Modifier, ModifierTarget, Source, ValidationIssues};
use crate::utils::generate_uuid;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// An ordered, independently enabled set of sources, modifiers and
/// destinations.
///
/// Each aggregate owns a [`Context`] that the task chains to its own at the
/// start of a run. Runs also record the cached artifact paths here.
#[derive(Debug)]
pub struct ConfigurationAggregate {
    id: Uuid,
    /// Display name.
    pub name: String,
    /// Whether the aggregate takes part in runs.
    pub enabled: bool,
    /// Source entries in list order.
    pub sources: Vec<SourceEntry>,
    /// Modifier entries, applied in list order.
    pub modifiers: Vec<ModifierEntry>,
    /// Destination entries in list order.
    pub destinations: Vec<DestinationEntry>,
    context: Arc<Context>,
    cached: RwLock<Vec<PathBuf>>,
}

impl ConfigurationAggregate {
    /// Creates an enabled, empty aggregate.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(generate_uuid(), name)
    }

    /// Creates an aggregate with a known identity.
    #[must_use]
    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        let name = name.into();
        let context = Arc::new(Context::new());
        context.bind_value("CONFIG_NAME", name.clone());
        context.bind_value("CONFIG_ID", id.to_string());
        Self {
            id,
            name,
            enabled: true,
            sources: Vec::new(),
            modifiers: Vec::new(),
            destinations: Vec::new(),
            context,
            cached: RwLock::new(Vec::new()),
        }
    }

    /// Returns the identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the aggregate's template context.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Appends a bound source entry.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(Entry::bound(source));
        self
    }

    /// Appends a bound modifier entry.
    #[must_use]
    pub fn with_modifier(mut self, modifier: Arc<dyn Modifier>) -> Self {
        self.modifiers.push(Entry::bound(modifier));
        self
    }

    /// Appends a bound destination entry.
    #[must_use]
    pub fn with_destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.destinations.push(Entry::bound(destination));
        self
    }

    /// Enabled, bound sources in list order.
    pub fn active_sources(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter().filter_map(Entry::active)
    }

    /// Enabled, bound modifiers in list order.
    pub fn active_modifiers(&self) -> impl Iterator<Item = &Arc<dyn Modifier>> {
        self.modifiers.iter().filter_map(Entry::active)
    }

    /// Enabled, bound destinations in list order.
    pub fn active_destinations(&self) -> impl Iterator<Item = &Arc<dyn Destination>> {
        self.destinations.iter().filter_map(Entry::active)
    }

    /// True if at least one source and one destination are enabled.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.sources.iter().any(|e| e.enabled) && self.destinations.iter().any(|e| e.enabled)
    }

    /// Collects structural errors and warnings for pre-flight validation.
    #[must_use]
    pub fn validate(&self) -> ValidationIssues {
        let mut issues = ValidationIssues::new();

        if !self.sources.iter().any(|e| e.enabled) {
            issues.errors.push("No enabled sources".to_string());
        }
        if !self.destinations.iter().any(|e| e.enabled) {
            issues.errors.push("No enabled destinations".to_string());
        }

        for (index, entry) in self.sources.iter().enumerate().filter(|(_, e)| e.enabled) {
            let prefix = format!("Source #{} ({})", index + 1, entry.label());
            match entry.provider() {
                Some(source) => issues.merge(&prefix, source.validate()),
                None => issues.errors.push(format!("{prefix}: no provider selected")),
            }
        }

        for (index, entry) in self.destinations.iter().enumerate().filter(|(_, e)| e.enabled) {
            let prefix = format!("Destination #{} ({})", index + 1, entry.label());
            match entry.provider() {
                Some(destination) => issues.merge(&prefix, destination.validate()),
                None => issues.errors.push(format!("{prefix}: no provider selected")),
            }
        }

        for (index, entry) in self.modifiers.iter().enumerate().filter(|(_, e)| e.enabled) {
            let prefix = format!("Modifier #{} ({})", index + 1, entry.label());
            let Some(modifier) = entry.provider() else {
                issues.errors.push(format!("{prefix}: no provider selected"));
                continue;
            };
            issues.merge(&prefix, modifier.validate());
            for source in self.active_sources() {
                issues.merge(
                    &prefix,
                    modifier.validate_against(ModifierTarget::Source(source.as_ref())),
                );
            }
            for destination in self.active_destinations() {
                issues.merge(
                    &prefix,
                    modifier.validate_against(ModifierTarget::Destination(destination.as_ref())),
                );
            }
        }

        issues
    }

    /// Artifacts cached for the current run, in caching order.
    #[must_use]
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        self.cached.read().clone()
    }

    pub(crate) fn record_cached(&self, path: PathBuf) {
        self.cached.write().push(path);
    }

    pub(crate) fn clear_cached(&self) {
        self.cached.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDestination, MockModifier, MockSource};

    fn eligible() -> ConfigurationAggregate {
        ConfigurationAggregate::new("windows")
            .with_source(Arc::new(MockSource::new()))
            .with_destination(Arc::new(MockDestination::new()))
    }

    #[test]
    fn test_context_binds_identity_tokens() {
        let config = ConfigurationAggregate::new("windows");
        assert_eq!(config.context().resolve("CONFIG_NAME"), Some("windows".to_string()));
        assert_eq!(
            config.context().resolve("CONFIG_ID"),
            Some(config.id().to_string())
        );
    }

    #[test]
    fn test_eligible_config_validates() {
        let config = eligible();
        assert!(config.is_eligible());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_destination() {
        let config = ConfigurationAggregate::new("linux").with_source(Arc::new(MockSource::new()));
        let issues = config.validate();

        assert!(!config.is_eligible());
        assert_eq!(issues.errors, vec!["No enabled destinations".to_string()]);
    }

    #[test]
    fn test_disabled_entries_do_not_count() {
        let mut config = eligible();
        config.sources[0].enabled = false;
        assert!(!config.is_eligible());
        assert_eq!(config.active_sources().count(), 0);
    }

    #[test]
    fn test_unbound_enabled_entry_is_an_error() {
        let mut config = eligible();
        config.sources.push(Entry::empty());
        let issues = config.validate();

        assert_eq!(issues.errors.len(), 1);
        assert!(issues.errors[0].contains("Source #2"));
        assert!(issues.errors[0].contains("no provider selected"));
    }

    #[test]
    fn test_provider_errors_are_prefixed() {
        let config = ConfigurationAggregate::new("mac")
            .with_source(Arc::new(MockSource::new().with_validation_error("bad url")))
            .with_destination(Arc::new(MockDestination::new()));
        let issues = config.validate();

        assert_eq!(issues.errors, vec!["Source #1 (mock_source): bad url".to_string()]);
    }

    #[test]
    fn test_modifier_validated_against_each_target() {
        let config = eligible()
            .with_source(Arc::new(MockSource::new()))
            .with_modifier(Arc::new(MockModifier::new().with_target_warning("check archive")));
        let issues = config.validate();

        assert!(issues.is_ok());
        // Two sources and one destination.
        assert_eq!(issues.warnings.len(), 3);
    }

    #[test]
    fn test_cached_paths() {
        let config = eligible();
        config.record_cached(PathBuf::from("/tmp/a.zip"));
        config.record_cached(PathBuf::from("/tmp/b.zip"));
        assert_eq!(config.cached_paths().len(), 2);
        config.clear_cached();
        assert!(config.cached_paths().is_empty());
    }
}
