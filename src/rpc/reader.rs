//! The read-only view of the node that the crawler depends on.
//!
//! [`ChainReader`] is deliberately narrow so crawls can run against an
//! in-process fake in tests. [`RpcClient`] is the production implementation.

use alloy::consensus::Transaction as _;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::{Block, Filter};
use async_trait::async_trait;

use super::rpc::{RpcClient, RpcError};
use super::types::{BlockData, LogQuery, RawLog, ReceiptData, TransactionData};

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Cheap reachability check, run once before any work is dispatched.
    async fn probe(&self) -> Result<u64, RpcError>;

    async fn block_number(&self) -> Result<u64, RpcError>;

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, RpcError>;

    /// Block header plus its full transaction list.
    async fn block_by_number(&self, height: u64) -> Result<Option<BlockData>, RpcError>;

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptData>, RpcError>;

    async fn balance_at(&self, address: Address, height: u64) -> Result<U256, RpcError>;
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn probe(&self) -> Result<u64, RpcError> {
        RpcClient::probe(self).await
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        self.get_block_number().await
    }

    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, RpcError> {
        let mut filter = Filter::new()
            .address(query.address)
            .from_block(query.from_block);
        if let Some(to_block) = query.to_block {
            filter = filter.to_block(to_block);
        }

        let logs = self.get_logs(&filter).await?;
        let total = logs.len();
        let mined: Vec<RawLog> = logs.into_iter().filter_map(RawLog::from_mined).collect();
        if mined.len() < total {
            tracing::warn!(
                "Skipped {} logs without a block number, transaction hash or log index",
                total - mined.len()
            );
        }
        Ok(mined)
    }

    async fn block_by_number(&self, height: u64) -> Result<Option<BlockData>, RpcError> {
        Ok(self.get_full_block(height).await?.map(block_data))
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptData>, RpcError> {
        Ok(self
            .get_transaction_receipt(hash)
            .await?
            .map(|receipt| ReceiptData {
                gas_used: receipt.gas_used,
                effective_gas_price: receipt.effective_gas_price,
            }))
    }

    async fn balance_at(&self, address: Address, height: u64) -> Result<U256, RpcError> {
        self.get_balance(address, height).await
    }
}

fn block_data(block: Block) -> BlockData {
    let header = &block.header;
    let inner = &header.inner;

    let transactions = block
        .transactions
        .txns()
        .map(|tx| TransactionData {
            hash: tx.tx_hash(),
            from: TransactionResponse::from(tx),
            to: tx.to(),
            value: tx.value(),
        })
        .collect();

    BlockData {
        number: inner.number,
        hash: header.hash,
        timestamp: inner.timestamp,
        miner: inner.beneficiary,
        gas_used: inner.gas_used,
        base_fee_per_gas: inner.base_fee_per_gas,
        transactions,
    }
}
