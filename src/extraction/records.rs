//! Flat rows persisted per block.
//!
//! Field order is the serialization order. Wei-denominated values are decimal
//! strings so consumers never round them through a float.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::decoding::{DecodedEvent, EventKind};
use crate::rpc::{BlockData, TransactionData};

/// Which chain, network and node provider a row was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIdentity {
    pub chain: String,
    pub network: String,
    pub provider: String,
}

impl BlockIdentity {
    pub fn new(
        chain: impl Into<String>,
        network: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            chain: chain.into(),
            network: network.into(),
            provider: provider.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRowKind {
    Block,
    Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub chain: String,
    pub network: String,
    pub provider: String,
    pub kind: EventRowKind,
    pub height: u64,
    pub block_hash: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_fee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_balance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_balance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miner: Option<Address>,
    /// Block timestamp, unix seconds
    pub received_at: u64,
}

impl EventRecord {
    /// The synthetic per-block row.
    pub fn for_block(identity: &BlockIdentity, block: &BlockData) -> Self {
        Self {
            chain: identity.chain.clone(),
            network: identity.network.clone(),
            provider: identity.provider.clone(),
            kind: EventRowKind::Block,
            height: block.number,
            block_hash: block.hash,
            transaction_hash: None,
            sender: None,
            recipient: None,
            amount: None,
            gas_fee: None,
            sender_balance: None,
            recipient_balance: None,
            transaction_count: Some(block.transactions.len() as u64),
            gas_used: Some(block.gas_used),
            base_fee: block.base_fee_per_gas,
            miner: Some(block.miner),
            received_at: block.timestamp,
        }
    }

    pub fn for_transaction(
        identity: &BlockIdentity,
        block: &BlockData,
        tx: &TransactionData,
        fees: &TransferContext,
    ) -> Self {
        Self {
            chain: identity.chain.clone(),
            network: identity.network.clone(),
            provider: identity.provider.clone(),
            kind: EventRowKind::Transaction,
            height: block.number,
            block_hash: block.hash,
            transaction_hash: Some(tx.hash),
            sender: Some(tx.from),
            recipient: tx.to,
            amount: Some(tx.value.to_string()),
            gas_fee: Some(fees.gas_fee.to_string()),
            sender_balance: Some(fees.sender_balance.to_string()),
            recipient_balance: fees.recipient_balance.map(|b| b.to_string()),
            transaction_count: None,
            gas_used: None,
            base_fee: None,
            miner: None,
            received_at: block.timestamp,
        }
    }
}

/// Per-transaction values read from the node alongside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferContext {
    pub gas_fee: U256,
    pub sender_balance: U256,
    /// `None` when the transaction has no recipient
    pub recipient_balance: Option<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub chain: String,
    pub network: String,
    pub provider: String,
    pub address: Address,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Address>,
    pub height: u64,
    pub transaction_hash: B256,
    pub amount: String,
    pub gas_fee: String,
    pub balance: String,
    pub received_at: u64,
}

impl WalletRecord {
    /// Outgoing row for the sender, then an incoming row for the recipient
    /// when there is one.
    pub fn for_transaction(
        identity: &BlockIdentity,
        block: &BlockData,
        tx: &TransactionData,
        fees: &TransferContext,
    ) -> Vec<Self> {
        let row = |address, direction, counterparty, balance: U256| Self {
            chain: identity.chain.clone(),
            network: identity.network.clone(),
            provider: identity.provider.clone(),
            address,
            direction,
            counterparty,
            height: block.number,
            transaction_hash: tx.hash,
            amount: tx.value.to_string(),
            gas_fee: fees.gas_fee.to_string(),
            balance: balance.to_string(),
            received_at: block.timestamp,
        };

        let mut rows = vec![row(tx.from, Direction::Outgoing, tx.to, fees.sender_balance)];
        if let (Some(to), Some(balance)) = (tx.to, fees.recipient_balance) {
            rows.push(row(to, Direction::Incoming, Some(tx.from), balance));
        }
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingAction {
    StakeDeposited,
    DepositRequested,
    ExitRequested,
    ExitCompleted,
    RebalanceStake,
    RebalanceRewards,
    RewardsDistributed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingActionRecord {
    pub chain: String,
    pub network: String,
    pub provider: String,
    pub action: StakingAction,
    pub height: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
    pub contract: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub amount: String,
    pub received_at: u64,
}

impl StakingActionRecord {
    /// Fold one decoded event into zero or more rows.
    pub fn from_event(
        identity: &BlockIdentity,
        event: &DecodedEvent,
        received_at: u64,
    ) -> Vec<Self> {
        let row = |action, address, amount: U256| Self {
            chain: identity.chain.clone(),
            network: identity.network.clone(),
            provider: identity.provider.clone(),
            action,
            height: event.log.block_number,
            transaction_hash: event.log.transaction_hash,
            log_index: event.log.log_index,
            contract: event.log.address,
            address,
            amount: amount.to_string(),
            received_at,
        };

        match &event.kind {
            EventKind::StakeDeposited(e) => {
                vec![row(StakingAction::StakeDeposited, Some(e.sender), e.amount)]
            }
            EventKind::DepositRequested(e) => {
                vec![row(StakingAction::DepositRequested, Some(e.staker), e.amount)]
            }
            EventKind::ExitRequested(e) => {
                vec![row(StakingAction::ExitRequested, Some(e.staker), e.amount)]
            }
            EventKind::ExitCompleted(e) => {
                vec![row(StakingAction::ExitCompleted, Some(e.staker), e.amount)]
            }
            EventKind::StakeRebalanced(e) => {
                let mut rows = Vec::with_capacity(2);
                if !e.stakeDelta.is_zero() {
                    rows.push(row(StakingAction::RebalanceStake, None, e.stakeDelta));
                }
                if !e.rewardsDelta.is_zero() {
                    rows.push(row(StakingAction::RebalanceRewards, None, e.rewardsDelta));
                }
                rows
            }
            EventKind::RewardsDistributed(e) => {
                vec![row(StakingAction::RewardsDistributed, None, e.amount)]
            }
        }
    }
}
