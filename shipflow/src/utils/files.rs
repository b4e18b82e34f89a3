//! Copying and hashing artifacts that may be single files or folder trees.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// What [`copy_artifact`] copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Copied {
    /// Regular files copied.
    pub files: usize,
    /// Total bytes copied.
    pub bytes: u64,
}

/// Files below `root`, relative to it, in sorted order.
async fn files_under(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        let mut entries = tokio::fs::read_dir(root.join(&relative)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = relative.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Copies a file, or a folder and everything below it, to `to`.
///
/// Parent folders of `to` are created. Empty sub-folders are not copied.
pub async fn copy_artifact(from: &Path, to: &Path) -> io::Result<Copied> {
    if !tokio::fs::metadata(from).await?.is_dir() {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(from, to).await?;
        return Ok(Copied { files: 1, bytes });
    }

    tokio::fs::create_dir_all(to).await?;
    let mut copied = Copied::default();
    for relative in files_under(from).await? {
        let target = to.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        copied.bytes += tokio::fs::copy(from.join(&relative), &target).await?;
        copied.files += 1;
    }
    Ok(copied)
}

async fn hash_file(path: &Path, hasher: &mut Sha256) -> io::Result<()> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(());
        }
        hasher.update(&buf[..read]);
    }
}

/// Hex SHA-256 of an artifact, reading it in chunks.
///
/// A folder hashes every file below it in sorted order, each preceded by
/// its `/`-separated relative path and a NUL byte, so renames change the
/// digest.
pub async fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    if tokio::fs::metadata(path).await?.is_dir() {
        for relative in files_under(path).await? {
            let name: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect();
            hasher.update(name.join("/").as_bytes());
            hasher.update([0u8]);
            hash_file(&path.join(&relative), &mut hasher).await?;
        }
    } else {
        hash_file(path, &mut hasher).await?;
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn build_tree(root: &Path) {
        tokio::fs::create_dir_all(root.join("data/levels")).await.unwrap();
        tokio::fs::write(root.join("game.exe"), b"binary").await.unwrap();
        tokio::fs::write(root.join("data/levels/one.pak"), b"level one").await.unwrap();
    }

    #[tokio::test]
    async fn test_copy_single_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("build.zip");
        tokio::fs::write(&from, b"payload").await.unwrap();
        let to = dir.path().join("cache/a/build.zip");

        let copied = copy_artifact(&from, &to).await.unwrap();

        assert_eq!(copied, Copied { files: 1, bytes: 7 });
        assert_eq!(tokio::fs::read(&to).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_copy_folder_tree() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("BuildFolder");
        build_tree(&from).await;
        let to = dir.path().join("cache/BuildFolder");

        let copied = copy_artifact(&from, &to).await.unwrap();

        assert_eq!(copied, Copied { files: 2, bytes: 15 });
        assert_eq!(tokio::fs::read(to.join("game.exe")).await.unwrap(), b"binary");
        assert_eq!(
            tokio::fs::read(to.join("data/levels/one.pak")).await.unwrap(),
            b"level one"
        );
        assert_eq!(
            sha256_hex(&from).await.unwrap(),
            sha256_hex(&to).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_file_digest_streams_large_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &content).await.unwrap();

        assert_eq!(
            sha256_hex(&path).await.unwrap(),
            hex::encode(Sha256::digest(&content))
        );
    }

    #[tokio::test]
    async fn test_folder_digest_depends_on_names() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        tokio::fs::create_dir_all(&first).await.unwrap();
        tokio::fs::create_dir_all(&second).await.unwrap();
        tokio::fs::write(first.join("a.txt"), b"same").await.unwrap();
        tokio::fs::write(second.join("b.txt"), b"same").await.unwrap();

        assert_ne!(
            sha256_hex(&first).await.unwrap(),
            sha256_hex(&second).await.unwrap()
        );
    }
}
