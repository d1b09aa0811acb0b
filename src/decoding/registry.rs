//! Decoder registration system.
//!
//! The registry maps an event's topic0 (the keccak hash of its canonical
//! signature) to the routine that turns a raw log into an [`EventKind`].

use std::collections::HashMap;

use alloy::primitives::B256;
use alloy::sol_types::SolEvent;

use super::error::DecodeError;
use super::events::{
    DecodedEvent, DepositRequested, EventKind, ExitCompleted, ExitRequested, RewardsDistributed,
    StakeDeposited, StakeRebalanced,
};
use crate::rpc::RawLog;

type DecodeFn = fn(&RawLog) -> Result<EventKind, DecodeError>;

/// Registry of event decoders, built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    decoders: HashMap<B256, DecodeFn>,
}

impl EventRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for every event the staking manager contract emits.
    pub fn staking_manager() -> Self {
        let mut registry = Self::new();
        registry.register::<StakeDeposited>();
        registry.register::<DepositRequested>();
        registry.register::<ExitRequested>();
        registry.register::<ExitCompleted>();
        registry.register::<StakeRebalanced>();
        registry.register::<RewardsDistributed>();

        tracing::debug!("Built event registry with {} decoders", registry.len());
        registry
    }

    /// Register a `sol!` event type under its signature hash.
    pub fn register<E>(&mut self)
    where
        E: SolEvent + Into<EventKind>,
    {
        self.decoders.insert(E::SIGNATURE_HASH, decode_as::<E>);
    }

    /// Decode one log. Both error cases are per-log and recoverable.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedEvent, DecodeError> {
        let topic0 = log.topic0().ok_or(DecodeError::MissingTopic0)?;
        let decode = self
            .decoders
            .get(&topic0)
            .ok_or(DecodeError::UnknownEvent(topic0))?;

        let kind = decode(log)?;
        Ok(DecodedEvent {
            kind,
            log: log.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

fn decode_as<E>(log: &RawLog) -> Result<EventKind, DecodeError>
where
    E: SolEvent + Into<EventKind>,
{
    E::decode_raw_log(log.topics.iter().copied(), &log.data)
        .map(Into::into)
        .map_err(|e| DecodeError::Abi {
            event: extract_event_name(E::SIGNATURE),
            message: e.to_string(),
        })
}

/// Extract event name from signature.
/// e.g., "StakeDeposited(address,uint256)" -> "StakeDeposited"
fn extract_event_name(signature: &'static str) -> &'static str {
    signature.split('(').next().unwrap_or(signature)
}
