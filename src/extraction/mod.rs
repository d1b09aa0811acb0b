//! Per-block extraction: node reads in, three NDJSON partitions out.

mod error;
pub mod keys;
pub mod ndjson;
mod pipeline;
pub mod records;

pub use error::ExtractionError;
pub use pipeline::{BlockExtractor, BlockOutput, Buckets};
pub use records::{
    BlockIdentity, Direction, EventRecord, EventRowKind, StakingAction, StakingActionRecord,
    WalletRecord,
};
