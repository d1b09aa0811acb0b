//! Error types for the storage module.

use std::error::Error as StdError;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// Key that cannot be mapped onto the backing store.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[source] Box<dyn StdError + Send + Sync + 'static>),

    #[error("storage task failed: {0}")]
    Join(String),
}

impl StorageError {
    pub fn s3(err: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self::S3(err.into())
    }
}
