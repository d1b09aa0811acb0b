//! Turns one block height into its three partitions and writes them.
//!
//! A block is all-or-nothing from the caller's point of view: any node read
//! that fails, or any upload that fails, makes [`BlockExtractor::process`]
//! return an error for that height. Logs that do not decode are skipped and
//! counted, they never fail the block.

use std::sync::Arc;

use alloy::primitives::{Address, U256};

use super::error::ExtractionError;
use super::keys::{block_key, contracts_key};
use super::ndjson::to_ndjson;
use super::records::{
    BlockIdentity, EventRecord, StakingActionRecord, TransferContext, WalletRecord,
};
use crate::decoding::EventRegistry;
use crate::rpc::{BlockData, ChainReader, LogQuery, TransactionData};
use crate::storage::IngestionSink;

/// Destination bucket per partition kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub events: String,
    pub wallets: String,
    pub contracts: String,
}

/// Everything extracted from a single block.
#[derive(Debug, Clone, Default)]
pub struct BlockOutput {
    pub height: u64,
    pub events: Vec<EventRecord>,
    pub wallets: Vec<WalletRecord>,
    pub actions: Vec<StakingActionRecord>,
    pub skipped_logs: usize,
}

#[derive(Debug, Clone)]
pub struct BlockExtractor {
    identity: BlockIdentity,
    contract: Address,
    registry: Arc<EventRegistry>,
}

impl BlockExtractor {
    pub fn new(identity: BlockIdentity, contract: Address, registry: Arc<EventRegistry>) -> Self {
        Self {
            identity,
            contract,
            registry,
        }
    }

    pub fn identity(&self) -> &BlockIdentity {
        &self.identity
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Extract then publish one height.
    pub async fn process<R, S>(
        &self,
        reader: &R,
        sink: &S,
        buckets: &Buckets,
        height: u64,
    ) -> Result<BlockOutput, ExtractionError>
    where
        R: ChainReader + ?Sized,
        S: IngestionSink + ?Sized,
    {
        let output = self.extract(reader, height).await?;
        self.publish(sink, buckets, &output).await?;
        Ok(output)
    }

    pub async fn extract<R>(&self, reader: &R, height: u64) -> Result<BlockOutput, ExtractionError>
    where
        R: ChainReader + ?Sized,
    {
        let block = reader
            .block_by_number(height)
            .await?
            .ok_or(ExtractionError::BlockNotFound(height))?;

        let mut output = BlockOutput {
            height,
            events: Vec::with_capacity(block.transactions.len() + 1),
            wallets: Vec::with_capacity(block.transactions.len() * 2),
            ..Default::default()
        };
        output.events.push(EventRecord::for_block(&self.identity, &block));

        for tx in &block.transactions {
            let fees = transfer_context(reader, &block, tx).await?;
            output
                .events
                .push(EventRecord::for_transaction(&self.identity, &block, tx, &fees));
            output
                .wallets
                .extend(WalletRecord::for_transaction(&self.identity, &block, tx, &fees));
        }

        let logs = reader
            .filter_logs(&LogQuery::single_block(self.contract, height))
            .await?;
        for log in &logs {
            match self.registry.decode(log) {
                Ok(event) => output.actions.extend(StakingActionRecord::from_event(
                    &self.identity,
                    &event,
                    block.timestamp,
                )),
                Err(e) => {
                    tracing::warn!(
                        "Skipping log {} in tx {} at block {}: {}",
                        log.log_index,
                        log.transaction_hash,
                        height,
                        e
                    );
                    output.skipped_logs += 1;
                }
            }
        }

        // Every transaction yields one event row and, unless it creates a
        // contract, two wallet rows.
        let transactions = output.events.len() - 1;
        if output.wallets.len() != 2 * transactions {
            tracing::warn!(
                "Block {}: {} wallet rows for {} transactions (contract creations yield one)",
                height,
                output.wallets.len(),
                transactions
            );
        }

        tracing::debug!(
            "Extracted block {}: {} events, {} wallets, {} actions, {} skipped logs",
            height,
            output.events.len(),
            output.wallets.len(),
            output.actions.len(),
            output.skipped_logs
        );

        Ok(output)
    }

    /// Serialize and upload all three partitions of a block.
    ///
    /// Every upload is attempted even when an earlier one fails, the first
    /// failure is returned. The contracts partition is written even when it
    /// is empty.
    pub async fn publish<S>(
        &self,
        sink: &S,
        buckets: &Buckets,
        output: &BlockOutput,
    ) -> Result<(), ExtractionError>
    where
        S: IngestionSink + ?Sized,
    {
        let BlockIdentity { chain, network, .. } = &self.identity;
        let partition_key = block_key(chain, network, output.height);
        let contract_key = contracts_key(chain, network, output.height);

        let uploads = [
            (&buckets.events, &partition_key, to_ndjson(&output.events)?),
            (&buckets.wallets, &partition_key, to_ndjson(&output.wallets)?),
            (&buckets.contracts, &contract_key, to_ndjson(&output.actions)?),
        ];

        let mut first_failure = None;
        for (bucket, key, data) in uploads {
            let size = data.len();
            match sink.upload(bucket, key, data).await {
                Ok(()) => tracing::debug!("Uploaded {} bytes to {}/{}", size, bucket, key),
                Err(e) => {
                    tracing::error!("Upload to {}/{} failed: {}", bucket, key, e);
                    if first_failure.is_none() {
                        first_failure = Some(ExtractionError::Upload {
                            bucket: bucket.clone(),
                            key: key.clone(),
                            source: e,
                        });
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn transfer_context<R>(
    reader: &R,
    block: &BlockData,
    tx: &TransactionData,
) -> Result<TransferContext, ExtractionError>
where
    R: ChainReader + ?Sized,
{
    let recipient_balance = async {
        match tx.to {
            Some(to) => reader.balance_at(to, block.number).await.map(Some),
            None => Ok::<Option<U256>, _>(None),
        }
    };

    let (receipt, sender_balance, recipient_balance) = futures::try_join!(
        reader.transaction_receipt(tx.hash),
        reader.balance_at(tx.from, block.number),
        recipient_balance,
    )?;
    let receipt = receipt.ok_or(ExtractionError::ReceiptNotFound(tx.hash))?;

    Ok(TransferContext {
        gas_fee: receipt.gas_fee(),
        sender_balance,
        recipient_balance,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use alloy::primitives::{address, keccak256, Bytes, B256};
    use alloy::sol_types::SolEvent;
    use async_trait::async_trait;

    use super::*;
    use crate::decoding::{StakeDeposited, StakeRebalanced};
    use crate::extraction::ndjson::from_ndjson;
    use crate::extraction::records::{Direction, EventRowKind, StakingAction};
    use crate::rpc::{RawLog, ReceiptData, RpcError};
    use crate::storage::{MemorySink, StorageError};

    const CONTRACT: Address = address!("0x00000000000000000000000000000000000c0de1");
    const ALICE: Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const BOB: Address = address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

    #[derive(Default)]
    struct FakeChain {
        blocks: HashMap<u64, BlockData>,
        receipts: HashMap<B256, ReceiptData>,
        logs: Vec<RawLog>,
    }

    #[async_trait]
    impl ChainReader for FakeChain {
        async fn probe(&self) -> Result<u64, RpcError> {
            self.block_number().await
        }

        async fn block_number(&self) -> Result<u64, RpcError> {
            Ok(self.blocks.keys().copied().max().unwrap_or_default())
        }

        async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, RpcError> {
            Ok(self
                .logs
                .iter()
                .filter(|l| l.address == query.address && l.block_number >= query.from_block)
                .filter(|l| query.to_block.map_or(true, |to| l.block_number <= to))
                .cloned()
                .collect())
        }

        async fn block_by_number(&self, height: u64) -> Result<Option<BlockData>, RpcError> {
            Ok(self.blocks.get(&height).cloned())
        }

        async fn transaction_receipt(&self, hash: B256) -> Result<Option<ReceiptData>, RpcError> {
            Ok(self.receipts.get(&hash).cloned())
        }

        async fn balance_at(&self, address: Address, height: u64) -> Result<U256, RpcError> {
            Ok(U256::from(height) + U256::from(address.0[0]))
        }
    }

    struct FailingSink {
        fail_bucket: &'static str,
        inner: MemorySink,
    }

    #[async_trait]
    impl IngestionSink for FailingSink {
        async fn upload(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
            if bucket == self.fail_bucket {
                return Err(StorageError::s3(std::io::Error::other("access denied")));
            }
            self.inner.upload(bucket, key, data).await
        }

        async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list_keys(bucket, prefix).await
        }

        async fn has_objects(&self, bucket: &str, prefix: &str) -> Result<bool, StorageError> {
            self.inner.has_objects(bucket, prefix).await
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(bucket, key).await
        }
    }

    fn tx(n: u8, to: Option<Address>) -> TransactionData {
        TransactionData {
            hash: B256::repeat_byte(n),
            from: ALICE,
            to,
            value: U256::from(n as u64 * 1_000),
        }
    }

    fn chain_with(height: u64, txs: Vec<TransactionData>) -> FakeChain {
        let mut chain = FakeChain::default();
        for t in &txs {
            chain.receipts.insert(
                t.hash,
                ReceiptData {
                    gas_used: 21_000,
                    effective_gas_price: 10,
                },
            );
        }
        chain.blocks.insert(
            height,
            BlockData {
                number: height,
                hash: B256::repeat_byte(0xee),
                timestamp: 1_700_000_000,
                miner: BOB,
                gas_used: 63_000,
                base_fee_per_gas: Some(9),
                transactions: txs,
            },
        );
        chain
    }

    fn log_at(height: u64, log_index: u64, topics: Vec<B256>, data: Bytes) -> RawLog {
        RawLog {
            address: CONTRACT,
            topics,
            data,
            block_number: height,
            transaction_hash: B256::repeat_byte(1),
            log_index,
        }
    }

    fn encoded<E: SolEvent>(event: &E) -> (Vec<B256>, Bytes) {
        let data = event.encode_log_data();
        (data.topics().to_vec(), data.data)
    }

    fn buckets() -> Buckets {
        Buckets {
            events: "events".into(),
            wallets: "wallets".into(),
            contracts: "contracts".into(),
        }
    }

    fn extractor() -> BlockExtractor {
        BlockExtractor::new(
            BlockIdentity::new("ethereum", "mainnet", "alchemy"),
            CONTRACT,
            Arc::new(EventRegistry::staking_manager()),
        )
    }

    #[tokio::test]
    async fn test_three_transfers_yield_expected_rows() {
        let chain = chain_with(
            19_000_001,
            vec![tx(1, Some(BOB)), tx(2, Some(BOB)), tx(3, Some(BOB))],
        );
        let sink = MemorySink::new();

        let output = extractor()
            .process(&chain, &sink, &buckets(), 19_000_001)
            .await
            .unwrap();

        assert_eq!(output.events.len(), 4);
        assert_eq!(output.wallets.len(), 6);
        assert!(output.actions.is_empty());
        assert_eq!(output.events[0].kind, EventRowKind::Block);
        assert_eq!(output.events[0].transaction_count, Some(3));
        assert_eq!(output.events[1].transaction_hash, Some(B256::repeat_byte(1)));
        assert_eq!(output.events[1].gas_fee.as_deref(), Some("210000"));
        assert_eq!(output.wallets[0].direction, Direction::Outgoing);
        assert_eq!(output.wallets[1].direction, Direction::Incoming);

        let key = "ethereum/mainnet/block=19000001.ndjson";
        let events: Vec<EventRecord> =
            from_ndjson(&sink.get("events", key).await.unwrap().unwrap()).unwrap();
        assert_eq!(events, output.events);
        let wallets: Vec<WalletRecord> =
            from_ndjson(&sink.get("wallets", key).await.unwrap().unwrap()).unwrap();
        assert_eq!(wallets.len(), 6);

        // Empty contracts partition still exists.
        let contracts = sink
            .get("contracts", "ethereum/mainnet/contracts/block=19000001.ndjson")
            .await
            .unwrap();
        assert_eq!(contracts, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_empty_block_yields_only_block_row() {
        let chain = chain_with(42, vec![]);
        let output = extractor().extract(&chain, 42).await.unwrap();

        assert_eq!(output.events.len(), 1);
        assert!(output.wallets.is_empty());
        assert_eq!(output.events[0].gas_used, Some(63_000));
        assert_eq!(output.events[0].miner, Some(BOB));
    }

    #[tokio::test]
    async fn test_contract_creation_yields_one_wallet_row() {
        let chain = chain_with(7, vec![tx(1, None), tx(2, Some(BOB))]);
        let output = extractor().extract(&chain, 7).await.unwrap();

        assert_eq!(output.events.len(), 3);
        assert_eq!(output.wallets.len(), 3);
        assert_eq!(output.events[1].recipient, None);
        assert_eq!(output.events[1].recipient_balance, None);
        assert_eq!(output.wallets[0].counterparty, None);
    }

    #[tokio::test]
    async fn test_staking_logs_decode_and_unknown_logs_skip() {
        let mut chain = chain_with(100, vec![tx(1, Some(CONTRACT))]);
        let (topics, data) = encoded(&StakeDeposited {
            sender: ALICE,
            amount: U256::from(32u64),
        });
        chain.logs.push(log_at(100, 0, topics, data));
        let (topics, data) = encoded(&StakeRebalanced {
            stakeDelta: U256::from(5u64),
            rewardsDelta: U256::from(6u64),
        });
        chain.logs.push(log_at(100, 1, topics, data));
        chain.logs.push(log_at(100, 2, vec![keccak256("Transfer(address,address,uint256)")], Bytes::new()));
        // Other heights are not part of this block.
        let (topics, data) = encoded(&StakeDeposited {
            sender: BOB,
            amount: U256::from(1u64),
        });
        chain.logs.push(log_at(101, 0, topics, data));

        let output = extractor().extract(&chain, 100).await.unwrap();

        let actions: Vec<_> = output.actions.iter().map(|a| a.action).collect();
        assert_eq!(
            actions,
            vec![
                StakingAction::StakeDeposited,
                StakingAction::RebalanceStake,
                StakingAction::RebalanceRewards,
            ]
        );
        assert_eq!(output.actions[0].address, Some(ALICE));
        assert_eq!(output.actions[0].contract, CONTRACT);
        assert_eq!(output.skipped_logs, 1);
    }

    #[tokio::test]
    async fn test_missing_block_and_receipt_fail() {
        let chain = chain_with(5, vec![tx(1, Some(BOB))]);
        assert!(matches!(
            extractor().extract(&chain, 6).await,
            Err(ExtractionError::BlockNotFound(6))
        ));

        let mut chain = chain;
        chain.receipts.clear();
        assert!(matches!(
            extractor().extract(&chain, 5).await,
            Err(ExtractionError::ReceiptNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_upload_still_attempts_the_rest() {
        let chain = chain_with(9, vec![tx(1, Some(BOB))]);
        let sink = FailingSink {
            fail_bucket: "events",
            inner: MemorySink::new(),
        };

        let result = extractor().process(&chain, &sink, &buckets(), 9).await;

        assert!(matches!(result, Err(ExtractionError::Upload { ref bucket, .. }) if bucket == "events"));
        assert_eq!(sink.inner.keys("wallets"), vec!["ethereum/mainnet/block=9.ndjson"]);
        assert_eq!(
            sink.inner.keys("contracts"),
            vec!["ethereum/mainnet/contracts/block=9.ndjson"]
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_uploads_are_logged_at_debug() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let chain = chain_with(11, vec![]);
        extractor()
            .process(&chain, &MemorySink::new(), &buckets(), 11)
            .await
            .unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let uploads: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("Uploaded"))
            .collect();
        assert_eq!(uploads.len(), 3, "{output}");
        assert!(uploads.iter().all(|line| line.contains("DEBUG")));
        assert!(uploads
            .iter()
            .any(|line| line.contains("contracts/ethereum/mainnet/contracts/block=11.ndjson")));
    }
}
