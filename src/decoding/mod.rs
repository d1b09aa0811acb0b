mod error;
mod events;
mod registry;

pub use error::DecodeError;
pub use events::{
    DecodedEvent, DepositRequested, EventKind, ExitCompleted, ExitRequested, IStakingManager,
    RewardsDistributed, StakeDeposited, StakeRebalanced,
};
pub use registry::EventRegistry;
