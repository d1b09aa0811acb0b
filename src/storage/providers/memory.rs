//! In-memory sink, used by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::storage::{IngestionSink, StorageError};

#[derive(Debug, Default)]
pub struct MemorySink {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key currently stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-written
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IngestionSink for MemorySink {
    async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        tracing::debug!(bucket, key, size = data.len(), "memory upload");
        self.lock()
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .lock()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }

    async fn has_objects(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError> {
        Ok(self
            .lock()
            .keys()
            .any(|(b, k)| b == bucket && k.starts_with(prefix)))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }
}
