//! Sink that writes partitions under a local directory, one subdirectory per
//! bucket. Intended for local development.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::storage::{IngestionSink, StorageError};

#[derive(Clone, Debug)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if bucket.is_empty() || bucket.contains('/') || key.is_empty() || escapes {
            return Err(StorageError::InvalidKey(format!("{bucket}/{key}")));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl IngestionSink for FileSink {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), "wrote partition");
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let bucket_dir = self.root.join(bucket);
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            collect_keys(&bucket_dir, &bucket_dir, &mut keys)?;
            keys.retain(|k| k.starts_with(&prefix));
            keys.sort();
            Ok::<_, StorageError>(keys)
        })
        .await
        .map_err(|e| StorageError::Join(e.to_string()))?
    }

    async fn has_objects(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError> {
        let bucket_dir = self.root.join(bucket);
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || find_key(&bucket_dir, &bucket_dir, &prefix))
            .await
            .map_err(|e| StorageError::Join(e.to_string()))?
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_dir_or_empty(dir: &Path) -> Result<Option<std::fs::ReadDir>, StorageError> {
    match std::fs::read_dir(dir) {
        Ok(entries) => Ok(Some(entries)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn key_for(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn collect_keys(base: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), StorageError> {
    let Some(entries) = read_dir_or_empty(dir)? else {
        return Ok(());
    };

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys(base, &path, keys)?;
        } else if let Some(key) = key_for(base, &path) {
            keys.push(key);
        }
    }
    Ok(())
}

/// Depth-first walk that stops at the first file whose key starts with `prefix`.
fn find_key(base: &Path, dir: &Path, prefix: &str) -> Result<bool, StorageError> {
    let Some(entries) = read_dir_or_empty(dir)? else {
        return Ok(false);
    };

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            if find_key(base, &path, prefix)? {
                return Ok(true);
            }
        } else if key_for(base, &path).is_some_and(|key| key.starts_with(prefix)) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let key = "ethereum/mainnet/contracts/block=7.ndjson";

        sink.upload("contracts", key, b"a\n".to_vec()).await.unwrap();
        sink.upload("contracts", key, b"b\n".to_vec()).await.unwrap();

        assert_eq!(sink.get("contracts", key).await.unwrap(), Some(b"b\n".to_vec()));
        assert!(dir
            .path()
            .join("contracts/ethereum/mainnet/contracts/block=7.ndjson")
            .is_file());
    }

    #[tokio::test]
    async fn test_list_keys_uses_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        sink.upload("events", "ethereum/mainnet/block=1.ndjson", vec![]).await.unwrap();
        sink.upload("events", "ethereum/mainnet/contracts/block=1.ndjson", vec![]).await.unwrap();
        sink.upload("events", "ethereum/holesky/block=1.ndjson", vec![]).await.unwrap();

        let keys = sink.list_keys("events", "ethereum/mainnet/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "ethereum/mainnet/block=1.ndjson",
                "ethereum/mainnet/contracts/block=1.ndjson",
            ]
        );
    }

    #[tokio::test]
    async fn test_has_objects_matches_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        sink.upload("events", "ethereum/holesky/block=1.ndjson", vec![]).await.unwrap();

        assert!(!sink.has_objects("events", "ethereum/mainnet/").await.unwrap());

        sink.upload("events", "ethereum/mainnet/contracts/block=9.ndjson", vec![]).await.unwrap();
        assert!(sink.has_objects("events", "ethereum/mainnet/").await.unwrap());
        assert!(sink.has_objects("events", "").await.unwrap());
        assert!(!sink.has_objects("wallets", "").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_bucket_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        assert!(sink.list_keys("nope", "").await.unwrap().is_empty());
        assert_eq!(sink.get("nope", "a.ndjson").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_keys_outside_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        assert!(matches!(
            sink.upload("events", "../escape.ndjson", vec![]).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            sink.upload("events", "/abs.ndjson", vec![]).await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
