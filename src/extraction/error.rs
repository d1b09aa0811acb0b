use alloy::primitives::B256;
use thiserror::Error;

use crate::rpc::RpcError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Block {0} not found")]
    BlockNotFound(u64),

    #[error("Receipt not found for tx: {0}")]
    ReceiptNotFound(B256),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Upload of {bucket}/{key} failed: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
}
