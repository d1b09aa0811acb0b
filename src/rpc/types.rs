use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::Log;

/// Log as returned by the node, reduced to what decoding and provenance need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
}

impl RawLog {
    /// Converts a node log that is part of a mined block. Returns `None` for
    /// a log missing its block number, transaction hash or log index.
    pub fn from_mined(log: Log) -> Option<Self> {
        Some(Self {
            block_number: log.block_number?,
            transaction_hash: log.transaction_hash?,
            log_index: log.log_index?,
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data,
        })
    }

    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// `eth_getLogs` query: one contract address over an inclusive height window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub from_block: u64,
    /// `None` means "up to latest"
    pub to_block: Option<u64>,
}

impl LogQuery {
    pub fn from_block(address: Address, from_block: u64) -> Self {
        Self {
            address,
            from_block,
            to_block: None,
        }
    }

    pub fn single_block(address: Address, height: u64) -> Self {
        Self {
            address,
            from_block: height,
            to_block: Some(height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionData {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
    pub miner: Address,
    pub gas_used: u64,
    pub base_fee_per_gas: Option<u64>,
    pub transactions: Vec<TransactionData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptData {
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl ReceiptData {
    /// Fee paid by the sender, in wei.
    pub fn gas_fee(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}
