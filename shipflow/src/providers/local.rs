//! Built-in providers that work on the local filesystem.

use super::{Action, Destination, Persist, ProviderBlob, Source, ValidationIssues};
use crate::context::Context;
use crate::errors::{Result, ShipflowError};
use crate::report::StepResult;
use crate::utils::copy_artifact;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Progress(AtomicU64);

impl Progress {
    fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::SeqCst);
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }
}

fn string_field(tag: &str, blob: &ProviderBlob, key: &str) -> Result<Option<String>> {
    match blob.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ShipflowError::invalid_blob(
            tag,
            format!("'{key}' must be a string, got {other}"),
        )),
    }
}

/// A source that picks up an existing file or folder, typically a finished
/// build.
///
/// The configured path may contain `$TOKEN`s.
#[derive(Debug, Default)]
pub struct LocalFileSource {
    path: String,
    fetched: RwLock<Option<PathBuf>>,
    progress: Progress,
}

impl LocalFileSource {
    /// Variant tag.
    pub const TAG: &'static str = "local_file";

    /// Creates a source for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Persist for LocalFileSource {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn to_blob(&self) -> ProviderBlob {
        let mut blob = ProviderBlob::new();
        blob.insert("path".to_string(), serde_json::json!(self.path));
        blob
    }

    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()> {
        self.path = string_field(Self::TAG, blob, "path")?.unwrap_or_default();
        Ok(())
    }
}

#[async_trait]
impl Source for LocalFileSource {
    async fn fetch(&self, ctx: &Context, result: &StepResult) -> bool {
        let path = PathBuf::from(ctx.expand(&self.path));
        match tokio::fs::metadata(&path).await {
            Ok(meta) => {
                if meta.is_dir() {
                    result.add_log(format!("Found folder {}", path.display()));
                } else {
                    result.add_log(format!("Found {} ({} bytes)", path.display(), meta.len()));
                }
                *self.fetched.write() = Some(path);
                self.progress.set(1.0);
                true
            }
            Err(e) => {
                result.set_failed(format!("Cannot read {}: {e}", path.display()));
                false
            }
        }
    }

    fn fetch_progress(&self) -> f64 {
        self.progress.get()
    }

    fn local_path(&self) -> Option<PathBuf> {
        self.fetched.read().clone()
    }

    async fn clean_up(&self) {
        *self.fetched.write() = None;
        self.progress.set(0.0);
    }

    fn validate(&self) -> ValidationIssues {
        if self.path.trim().is_empty() {
            ValidationIssues::new().with_error("No source path configured")
        } else {
            ValidationIssues::new()
        }
    }
}

/// A destination that copies artifacts, files or folder trees, into a
/// folder.
///
/// Both the folder and the optional file name may contain `$TOKEN`s.
#[derive(Debug, Default)]
pub struct LocalFolderDestination {
    folder: String,
    file_name: Option<String>,
    progress: Progress,
}

impl LocalFolderDestination {
    /// Variant tag.
    pub const TAG: &'static str = "local_folder";

    /// Creates a destination publishing into `folder`.
    #[must_use]
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    /// Renames published files using a template.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    fn target_for(&self, path: &Path, ctx: &Context) -> PathBuf {
        let folder = PathBuf::from(ctx.expand(&self.folder));
        match &self.file_name {
            Some(template) => folder.join(ctx.expand(template)),
            None => folder.join(path.file_name().unwrap_or(path.as_os_str())),
        }
    }
}

impl Persist for LocalFolderDestination {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn to_blob(&self) -> ProviderBlob {
        let mut blob = ProviderBlob::new();
        blob.insert("folder".to_string(), serde_json::json!(self.folder));
        if let Some(ref name) = self.file_name {
            blob.insert("fileName".to_string(), serde_json::json!(name));
        }
        blob
    }

    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()> {
        self.folder = string_field(Self::TAG, blob, "folder")?.unwrap_or_default();
        self.file_name = string_field(Self::TAG, blob, "fileName")?;
        Ok(())
    }
}

#[async_trait]
impl Destination for LocalFolderDestination {
    async fn prepare(&self, ctx: &Context, result: &StepResult) -> bool {
        let folder = PathBuf::from(ctx.expand(&self.folder));
        match tokio::fs::create_dir_all(&folder).await {
            Ok(()) => {
                result.add_log(format!("Publishing into {}", folder.display()));
                true
            }
            Err(e) => {
                result.set_failed(format!("Cannot create {}: {e}", folder.display()));
                false
            }
        }
    }

    async fn publish(
        &self,
        path: &Path,
        description: &str,
        ctx: &Context,
        result: &StepResult,
    ) -> bool {
        self.progress.set(0.0);
        let target = self.target_for(path, ctx);
        debug!(from = %path.display(), to = %target.display(), "Copying artifact");
        match copy_artifact(path, &target).await {
            Ok(copied) => {
                self.progress.set(1.0);
                result.add_log(format!(
                    "Copied {} bytes to {} ({description})",
                    copied.bytes,
                    target.display()
                ));
                true
            }
            Err(e) => {
                result.set_failed(format!("Cannot copy to {}: {e}", target.display()));
                false
            }
        }
    }

    fn publish_progress(&self) -> f64 {
        self.progress.get()
    }

    fn validate(&self) -> ValidationIssues {
        if self.folder.trim().is_empty() {
            ValidationIssues::new().with_error("No destination folder configured")
        } else {
            ValidationIssues::new()
        }
    }
}

/// An action that writes a templated message to the log and the report.
#[derive(Debug, Default)]
pub struct LogAction {
    message: String,
}

impl LogAction {
    /// Variant tag.
    pub const TAG: &'static str = "log";

    /// Creates an action logging `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Persist for LogAction {
    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn to_blob(&self) -> ProviderBlob {
        let mut blob = ProviderBlob::new();
        blob.insert("message".to_string(), serde_json::json!(self.message));
        blob
    }

    fn load_blob(&mut self, blob: &ProviderBlob) -> Result<()> {
        self.message = string_field(Self::TAG, blob, "message")?.unwrap_or_default();
        Ok(())
    }
}

#[async_trait]
impl Action for LogAction {
    async fn execute(&self, ctx: &Context, result: &StepResult) -> bool {
        let message = ctx.expand(&self.message);
        info!(action = Self::TAG, "{}", message);
        result.add_log(message);
        true
    }

    fn validate(&self) -> ValidationIssues {
        if self.message.is_empty() {
            ValidationIssues::new().with_warning("Log action has an empty message")
        } else {
            ValidationIssues::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_file_source_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("game-1.0.zip");
        tokio::fs::write(&file, b"payload").await.unwrap();

        let ctx = Context::new();
        ctx.bind_value("VERSION", "1.0");
        let template = dir.path().join("game-$VERSION.zip");
        let source = LocalFileSource::new(template.to_string_lossy());
        let result = StepResult::detached();

        assert!(source.fetch(&ctx, &result).await);
        assert_eq!(source.local_path(), Some(file));
        assert_eq!(source.fetch_progress(), 1.0);

        source.clean_up().await;
        assert!(source.local_path().is_none());
    }

    #[tokio::test]
    async fn test_folder_is_fetched_and_published_as_a_tree() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("BuildFolder");
        tokio::fs::create_dir_all(build.join("data")).await.unwrap();
        tokio::fs::write(build.join("game.exe"), b"exe").await.unwrap();
        tokio::fs::write(build.join("data/assets.pak"), b"pak").await.unwrap();

        let ctx = Context::new();
        let result = StepResult::detached();
        let source = LocalFileSource::new(build.to_string_lossy());
        assert!(source.fetch(&ctx, &result).await);
        assert_eq!(source.local_path(), Some(build.clone()));

        let out = dir.path().join("out");
        let dest = LocalFolderDestination::new(out.to_string_lossy());
        assert!(dest.prepare(&ctx, &result).await);
        assert!(dest.publish(&build, "release", &ctx, &result).await);

        let published = out.join("BuildFolder");
        assert_eq!(tokio::fs::read(published.join("game.exe")).await.unwrap(), b"exe");
        assert_eq!(
            tokio::fs::read(published.join("data/assets.pak")).await.unwrap(),
            b"pak"
        );
        assert!(result.is_successful());
    }

    #[tokio::test]
    async fn test_local_file_source_missing_file_fails() {
        let source = LocalFileSource::new("/definitely/not/here.zip");
        let result = StepResult::detached();

        assert!(!source.fetch(&Context::new(), &result).await);
        assert!(!result.is_successful());
        assert!(source.local_path().is_none());
    }

    #[test]
    fn test_local_file_source_validate() {
        assert!(!LocalFileSource::default().validate().is_ok());
        assert!(LocalFileSource::new("build.zip").validate().is_ok());
    }

    #[tokio::test]
    async fn test_local_folder_destination_publish() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("build.zip");
        tokio::fs::write(&artifact, b"payload").await.unwrap();

        let ctx = Context::new();
        ctx.bind_value("VERSION", "2.1");
        let out = dir.path().join("out");
        let dest = LocalFolderDestination::new(out.to_string_lossy())
            .with_file_name("game-$VERSION.zip");
        let result = StepResult::detached();

        assert!(dest.prepare(&ctx, &result).await);
        assert!(dest.publish(&artifact, "release", &ctx, &result).await);
        assert_eq!(dest.publish_progress(), 1.0);

        let copied = tokio::fs::read(out.join("game-2.1.zip")).await.unwrap();
        assert_eq!(copied, b"payload");
    }

    #[test]
    fn test_blob_round_trip() {
        let dest = LocalFolderDestination::new("/srv/builds").with_file_name("$DATE.zip");
        let blob = dest.to_blob();

        let mut loaded = LocalFolderDestination::default();
        loaded.load_blob(&blob).unwrap();
        assert_eq!(loaded.to_blob(), blob);
    }

    #[test]
    fn test_blob_with_wrong_type_is_rejected() {
        let mut blob = ProviderBlob::new();
        blob.insert("path".to_string(), serde_json::json!(42));

        let mut source = LocalFileSource::default();
        let err = source.load_blob(&blob).unwrap_err();
        assert!(matches!(err, ShipflowError::InvalidBlob { .. }));
    }

    #[tokio::test]
    async fn test_log_action_expands_message() {
        let ctx = Context::new();
        ctx.bind_value("VERSION", "3.0");
        let action = LogAction::new("Released $VERSION");
        let result = StepResult::detached();

        assert!(action.execute(&ctx, &result).await);
        assert_eq!(result.logs()[0].message, "Released 3.0");
    }
}
