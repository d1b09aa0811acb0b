use alloy::primitives::B256;
use thiserror::Error;

/// Failure to decode a single log. Always recoverable: the caller skips the
/// log and keeps going with the rest of the block.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event: no decoder registered for topic0 {0}")]
    UnknownEvent(B256),

    #[error("log has no topics")]
    MissingTopic0,

    #[error("failed to decode {event}: {message}")]
    Abi {
        event: &'static str,
        message: String,
    },
}
