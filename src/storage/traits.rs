use std::sync::Arc;

use async_trait::async_trait;

use super::StorageError;

/// Object storage addressed by bucket and key.
///
/// Writes overwrite: uploading an existing key replaces its content. There is
/// no append and no conditional write.
#[async_trait]
pub trait IngestionSink: Send + Sync {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Keys under `prefix`, sorted ascending.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Whether at least one key exists under `prefix`. Reads at most one key.
    async fn has_objects(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError>;

    /// Current content of `key`, or `None` if it was never written.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
}

#[async_trait]
impl<T: IngestionSink + ?Sized> IngestionSink for Arc<T> {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        (**self).upload(bucket, key, data).await
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).list_keys(bucket, prefix).await
    }

    async fn has_objects(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError> {
        (**self).has_objects(bucket, prefix).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(bucket, key).await
    }
}
