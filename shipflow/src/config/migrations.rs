//! Numbered migrations applied to raw documents before deserialization.
//!
//! Each step only adds or renames fields. Steps run in sequence from the
//! stored version up to [`CURRENT_VERSION`].

use crate::errors::{Result, ShipflowError};
use serde_json::{Map, Value};
use tracing::debug;

/// The document version written by this build.
pub const CURRENT_VERSION: u32 = 3;

type Migration = fn(&mut Map<String, Value>) -> Result<()>;

/// `(from_version, step)`; step `n` upgrades a version `n` document to `n + 1`.
const MIGRATIONS: [(u32, Migration); 2] = [(1, v1_to_v2), (2, v2_to_v3)];

const ENTRY_LISTS: [&str; 3] = ["sources", "modifiers", "destinations"];

/// Upgrades a raw task document to [`CURRENT_VERSION`].
///
/// A document without a `version` field is treated as version 1.
pub fn migrate(document: Value) -> Result<Value> {
    let Value::Object(mut root) = document else {
        return Err(ShipflowError::MalformedDocument(
            "document root must be an object".to_string(),
        ));
    };

    let version = match root.get("version") {
        None => 1,
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v >= 1)
            .ok_or_else(|| ShipflowError::MalformedDocument(format!("invalid version {v}")))?,
    };

    if version > CURRENT_VERSION {
        return Err(ShipflowError::UnsupportedVersion {
            found: version,
            current: CURRENT_VERSION,
        });
    }

    for (from, step) in MIGRATIONS {
        if from < version {
            continue;
        }
        debug!(from, to = from + 1, "Migrating document");
        step(&mut root)?;
        root.insert("version".to_string(), Value::from(from + 1));
    }

    Ok(Value::Object(root))
}

fn array_mut<'a>(
    object: &'a mut Map<String, Value>,
    key: &str,
    from: u32,
) -> Result<Option<&'a mut Vec<Value>>> {
    match object.get_mut(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(ShipflowError::Migration {
            from,
            reason: format!("'{key}' must be an array"),
        }),
    }
}

fn rename(entry: &mut Value, old: &str, new: &str) {
    if let Value::Object(fields) = entry {
        if let Some(value) = fields.remove(old) {
            fields.entry(new.to_string()).or_insert(value);
        }
    }
}

/// Entry fields `type` and `data` become `variantTypeTag` and `providerBlob`.
fn v1_to_v2(root: &mut Map<String, Value>) -> Result<()> {
    let rename_entry = |entry: &mut Value| {
        rename(entry, "type", "variantTypeTag");
        rename(entry, "data", "providerBlob");
    };

    if let Some(configs) = array_mut(root, "configs", 1)? {
        for config in configs.iter_mut() {
            let Value::Object(config) = config else {
                return Err(ShipflowError::Migration {
                    from: 1,
                    reason: "config must be an object".to_string(),
                });
            };
            for list in ENTRY_LISTS {
                if let Some(entries) = array_mut(config, list, 1)? {
                    entries.iter_mut().for_each(rename_entry);
                }
            }
        }
    }
    if let Some(actions) = array_mut(root, "actions", 1)? {
        actions.iter_mut().for_each(rename_entry);
    }
    Ok(())
}

/// Task-level `actions` become `postActions` with an explicit run policy;
/// `preActions` and `description` are added.
fn v2_to_v3(root: &mut Map<String, Value>) -> Result<()> {
    let actions = root.remove("actions").unwrap_or(Value::Array(Vec::new()));
    let Value::Array(mut actions) = actions else {
        return Err(ShipflowError::Migration {
            from: 2,
            reason: "'actions' must be an array".to_string(),
        });
    };
    for action in &mut actions {
        if let Value::Object(fields) = action {
            fields
                .entry("whenToRun".to_string())
                .or_insert_with(|| Value::from("onlySuccess"));
        }
    }

    root.entry("postActions".to_string())
        .or_insert(Value::Array(actions));
    root.entry("preActions".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    root.entry("description".to_string())
        .or_insert_with(|| Value::from(""));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_current_version_untouched() {
        let doc = json!({"version": CURRENT_VERSION, "name": "x", "postActions": []});
        assert_eq!(migrate(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn test_v1_to_current() {
        let doc = json!({
            "version": 1,
            "guid": "00000000-0000-0000-0000-000000000001",
            "name": "game",
            "configs": [{
                "guid": "00000000-0000-0000-0000-000000000002",
                "enabled": true,
                "sources": [{"enabled": true, "type": "local_file", "data": {"path": "a.zip"}}],
                "destinations": [{"enabled": false, "type": "local_folder", "data": {}}]
            }],
            "actions": [{"enabled": true, "type": "log", "data": {"message": "done"}}]
        });

        let migrated = migrate(doc).unwrap();

        assert_eq!(migrated["version"], json!(3));
        let source = &migrated["configs"][0]["sources"][0];
        assert_eq!(source["variantTypeTag"], json!("local_file"));
        assert_eq!(source["providerBlob"], json!({"path": "a.zip"}));
        assert!(source.get("type").is_none());
        assert_eq!(migrated["postActions"][0]["variantTypeTag"], json!("log"));
        assert_eq!(migrated["postActions"][0]["whenToRun"], json!("onlySuccess"));
        assert_eq!(migrated["preActions"], json!([]));
        assert_eq!(migrated["description"], json!(""));
        assert!(migrated.get("actions").is_none());
    }

    #[test]
    fn test_v2_keeps_existing_policy() {
        let doc = json!({
            "version": 2,
            "name": "game",
            "description": "kept",
            "actions": [{"enabled": true, "variantTypeTag": "log", "whenToRun": "always"}]
        });

        let migrated = migrate(doc).unwrap();
        assert_eq!(migrated["postActions"][0]["whenToRun"], json!("always"));
        assert_eq!(migrated["description"], json!("kept"));
    }

    #[test]
    fn test_missing_version_is_v1() {
        let migrated = migrate(json!({"name": "legacy"})).unwrap();
        assert_eq!(migrated["version"], json!(CURRENT_VERSION));
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = migrate(json!({"version": CURRENT_VERSION + 1})).unwrap_err();
        assert!(matches!(err, ShipflowError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_bad_shapes() {
        assert!(matches!(
            migrate(json!([1, 2])).unwrap_err(),
            ShipflowError::MalformedDocument(_)
        ));
        assert!(matches!(
            migrate(json!({"version": "two"})).unwrap_err(),
            ShipflowError::MalformedDocument(_)
        ));
        assert!(matches!(
            migrate(json!({"version": 1, "configs": {}})).unwrap_err(),
            ShipflowError::Migration { from: 1, .. }
        ));
    }
}
