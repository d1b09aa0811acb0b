use alloy::sol;

use crate::rpc::RawLog;

sol! {
    /// Events emitted by the tracked staking manager contract.
    #[sol(all_derives)]
    interface IStakingManager {
        event StakeDeposited(address sender, uint256 amount);
        event DepositRequested(address indexed staker, uint256 amount, uint256 requestId);
        event ExitRequested(address indexed staker, uint256 amount);
        event ExitCompleted(address indexed staker, uint256 amount);
        event StakeRebalanced(uint256 stakeDelta, uint256 rewardsDelta);
        event RewardsDistributed(uint256 amount);
    }
}

pub use IStakingManager::{
    DepositRequested, ExitCompleted, ExitRequested, RewardsDistributed, StakeDeposited,
    StakeRebalanced,
};

/// One variant per registered event, holding the ABI-decoded fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    StakeDeposited(StakeDeposited),
    DepositRequested(DepositRequested),
    ExitRequested(ExitRequested),
    ExitCompleted(ExitCompleted),
    StakeRebalanced(StakeRebalanced),
    RewardsDistributed(RewardsDistributed),
}

macro_rules! impl_from_event {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for EventKind {
                fn from(event: $variant) -> Self {
                    EventKind::$variant(event)
                }
            }
        )*
    };
}

impl_from_event!(
    StakeDeposited,
    DepositRequested,
    ExitRequested,
    ExitCompleted,
    StakeRebalanced,
    RewardsDistributed,
);

/// A decoded contract event together with the log it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub kind: EventKind,
    pub log: RawLog,
}
