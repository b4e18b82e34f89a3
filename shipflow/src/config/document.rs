//! Persisted configuration documents.

use super::{migrate, ActionEntry, ConfigurationAggregate, Entry, CURRENT_VERSION};
use crate::errors::{LoadIssue, ProviderKind, Result, ShipflowError};
use crate::providers::{Persist, ProviderBlob, ProviderRegistry, WhenToRun};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

fn default_true() -> bool {
    true
}

/// The persisted form of an [`Entry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDocument {
    /// Enabled flag.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Selected variant, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_type_tag: Option<String>,
    /// Opaque provider settings.
    #[serde(default)]
    pub provider_blob: ProviderBlob,
}

impl EntryDocument {
    /// Captures an entry.
    #[must_use]
    pub fn from_entry<P: ?Sized + Persist>(entry: &Entry<P>) -> Self {
        Self {
            enabled: entry.enabled,
            variant_type_tag: entry.variant().map(str::to_string),
            provider_blob: entry.blob(),
        }
    }

    /// Rebuilds an entry, binding a provider through `create`.
    ///
    /// If the variant cannot be created the entry is returned unbound and
    /// the problem is pushed onto `issues`.
    fn bind<P, F>(
        &self,
        kind: ProviderKind,
        index: usize,
        create: F,
        issues: &mut Vec<LoadIssue>,
    ) -> Entry<P>
    where
        P: ?Sized + Persist,
        F: FnOnce(&str, &ProviderBlob) -> Result<Arc<P>>,
    {
        let Some(tag) = self.variant_type_tag.as_deref() else {
            return Entry::empty().with_enabled(self.enabled);
        };
        match create(tag, &self.provider_blob) {
            Ok(provider) => Entry::bound(provider).with_enabled(self.enabled),
            Err(e) => {
                warn!(%kind, index, error = %e, "Leaving entry unbound");
                issues.push(LoadIssue::new(kind, index, e.to_string()));
                Entry::unbound(tag, self.provider_blob.clone()).with_enabled(self.enabled)
            }
        }
    }
}

/// The persisted form of an [`ActionEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntryDocument {
    /// The shared entry fields.
    #[serde(flatten)]
    pub entry: EntryDocument,
    /// Run policy.
    #[serde(default)]
    pub when_to_run: WhenToRun,
}

impl ActionEntryDocument {
    /// Captures an action entry.
    #[must_use]
    pub fn from_action(action: &ActionEntry) -> Self {
        Self {
            entry: EntryDocument::from_entry(&action.entry),
            when_to_run: action.when_to_run,
        }
    }

    /// Rebuilds an action entry through `registry`.
    pub fn load(
        &self,
        index: usize,
        registry: &ProviderRegistry,
        issues: &mut Vec<LoadIssue>,
    ) -> ActionEntry {
        let entry = self.entry.bind(
            ProviderKind::Action,
            index,
            |tag, blob| registry.create_action(tag, blob),
            issues,
        );
        ActionEntry::from_entry(entry, self.when_to_run)
    }
}

/// The persisted form of a [`ConfigurationAggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Identity.
    pub guid: Uuid,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Enabled flag.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Source entries.
    #[serde(default)]
    pub sources: Vec<EntryDocument>,
    /// Modifier entries.
    #[serde(default)]
    pub modifiers: Vec<EntryDocument>,
    /// Destination entries.
    #[serde(default)]
    pub destinations: Vec<EntryDocument>,
}

impl ConfigurationAggregate {
    /// Captures the aggregate for persistence.
    #[must_use]
    pub fn to_document(&self) -> ConfigDocument {
        ConfigDocument {
            guid: self.id(),
            name: self.name.clone(),
            enabled: self.enabled,
            sources: self.sources.iter().map(EntryDocument::from_entry).collect(),
            modifiers: self.modifiers.iter().map(EntryDocument::from_entry).collect(),
            destinations: self
                .destinations
                .iter()
                .map(EntryDocument::from_entry)
                .collect(),
        }
    }

    /// Rebuilds an aggregate, binding providers through `registry`.
    ///
    /// Entries whose variant cannot be created are left unbound and
    /// reported in the returned issues.
    pub fn from_document(
        document: &ConfigDocument,
        registry: &ProviderRegistry,
    ) -> (Self, Vec<LoadIssue>) {
        let mut issues = Vec::new();
        let mut config = Self::with_id(document.guid, document.name.clone());
        config.enabled = document.enabled;

        for (index, entry) in document.sources.iter().enumerate() {
            let entry = entry.bind(
                ProviderKind::Source,
                index,
                |tag, blob| registry.create_source(tag, blob),
                &mut issues,
            );
            config.sources.push(entry);
        }
        for (index, entry) in document.modifiers.iter().enumerate() {
            let entry = entry.bind(
                ProviderKind::Modifier,
                index,
                |tag, blob| registry.create_modifier(tag, blob),
                &mut issues,
            );
            config.modifiers.push(entry);
        }
        for (index, entry) in document.destinations.iter().enumerate() {
            let entry = entry.bind(
                ProviderKind::Destination,
                index,
                |tag, blob| registry.create_destination(tag, blob),
                &mut issues,
            );
            config.destinations.push(entry);
        }

        let issues = issues
            .into_iter()
            .map(|issue| issue.in_config(document.guid))
            .collect();
        (config, issues)
    }
}

/// The persisted form of a whole pipeline task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    /// Document version; see [`CURRENT_VERSION`].
    pub version: u32,
    /// Task identity.
    pub guid: Uuid,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Configuration aggregates.
    #[serde(default)]
    pub configs: Vec<ConfigDocument>,
    /// Actions run before publishing.
    #[serde(default)]
    pub pre_actions: Vec<ActionEntryDocument>,
    /// Actions run after publishing.
    #[serde(default)]
    pub post_actions: Vec<ActionEntryDocument>,
}

impl TaskDocument {
    /// Creates an empty current-version document.
    #[must_use]
    pub fn new(guid: Uuid, name: impl Into<String>) -> Self {
        Self {
            version: CURRENT_VERSION,
            guid,
            name: name.into(),
            description: String::new(),
            configs: Vec::new(),
            pre_actions: Vec::new(),
            post_actions: Vec::new(),
        }
    }

    /// Parses a document of any supported version, migrating it first.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        let migrated = migrate(raw)?;
        serde_json::from_value(migrated).map_err(|e| ShipflowError::MalformedDocument(e.to_string()))
    }

    /// Serializes as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads and migrates a document from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_json(&text)
    }

    /// Writes the document to disk, replacing any existing file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, self.to_json()?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDestination, MockModifier, MockSource};
    use pretty_assertions::assert_eq;

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry.register_source(MockSource::TAG, || Box::new(MockSource::new()));
        registry.register_modifier(MockModifier::TAG, || Box::new(MockModifier::new()));
        registry.register_destination(MockDestination::TAG, || Box::new(MockDestination::new()));
        registry
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = ConfigurationAggregate::new("android")
            .with_source(Arc::new(MockSource::new().with_label("apk")))
            .with_source(Arc::new(MockSource::new().with_label("symbols")))
            .with_modifier(Arc::new(MockModifier::new().with_label("sign")))
            .with_destination(Arc::new(MockDestination::new().with_label("store")));
        config.sources[1].enabled = false;

        let document = config.to_document();
        let json = serde_json::to_string(&document).unwrap();
        let parsed: ConfigDocument = serde_json::from_str(&json).unwrap();
        let (loaded, issues) = ConfigurationAggregate::from_document(&parsed, &registry());

        assert!(issues.is_empty());
        assert_eq!(loaded.id(), config.id());
        assert_eq!(loaded.to_document(), document);

        let enabled: Vec<_> = loaded.sources.iter().map(|e| e.enabled).collect();
        assert_eq!(enabled, vec![true, false]);
        assert_eq!(loaded.modifiers[0].variant(), Some(MockModifier::TAG));
        assert_eq!(
            loaded.destinations[0].blob().get("label"),
            Some(&serde_json::json!("store"))
        );
    }

    #[test]
    fn test_unknown_variant_left_unbound() {
        let mut document = ConfigurationAggregate::new("web")
            .with_destination(Arc::new(MockDestination::new()))
            .to_document();
        let mut blob = ProviderBlob::new();
        blob.insert("bucket".to_string(), serde_json::json!("builds"));
        document.sources.push(EntryDocument {
            enabled: true,
            variant_type_tag: Some("s3".to_string()),
            provider_blob: blob.clone(),
        });

        let (loaded, issues) = ConfigurationAggregate::from_document(&document, &registry());

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ProviderKind::Source);
        assert_eq!(issues[0].index, 0);
        assert_eq!(issues[0].config, Some(document.guid));
        assert!(!loaded.sources[0].is_bound());
        assert_eq!(loaded.sources[0].variant(), Some("s3"));
        assert_eq!(loaded.to_document().sources[0].provider_blob, blob);
        assert!(loaded.destinations[0].is_bound());
    }

    #[test]
    fn test_entry_without_variant_loads_empty() {
        let document: ConfigDocument = serde_json::from_value(serde_json::json!({
            "guid": "00000000-0000-0000-0000-00000000000a",
            "sources": [{"enabled": false}]
        }))
        .unwrap();

        let (loaded, issues) = ConfigurationAggregate::from_document(&document, &registry());
        assert!(issues.is_empty());
        assert!(loaded.enabled);
        assert!(!loaded.sources[0].enabled);
        assert!(loaded.sources[0].variant().is_none());
    }

    #[test]
    fn test_task_document_from_v1_json() {
        let text = r#"{
            "version": 1,
            "guid": "00000000-0000-0000-0000-000000000001",
            "name": "game",
            "configs": [],
            "actions": [{"enabled": true, "type": "log", "data": {"message": "hi"}}]
        }"#;

        let document = TaskDocument::from_json(text).unwrap();
        assert_eq!(document.version, CURRENT_VERSION);
        assert_eq!(document.post_actions.len(), 1);
        assert_eq!(document.post_actions[0].when_to_run, WhenToRun::OnlySuccess);
        assert_eq!(
            document.post_actions[0].entry.variant_type_tag.as_deref(),
            Some("log")
        );
    }

    #[test]
    fn test_task_document_malformed() {
        let err = TaskDocument::from_json(r#"{"version": 3, "name": 5}"#).unwrap_err();
        assert!(matches!(err, ShipflowError::MalformedDocument(_)));

        let err = TaskDocument::from_json("not json").unwrap_err();
        assert!(matches!(err, ShipflowError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_task_document_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipelines").join("game.json");
        let mut document = TaskDocument::new(Uuid::new_v4(), "game");
        document.description = "nightly".to_string();

        document.save(&path).await.unwrap();
        let loaded = TaskDocument::load(&path).await.unwrap();
        assert_eq!(loaded, document);
    }
}
