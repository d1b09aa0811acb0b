//! Runs a crawl: setup, batch planning, and a bounded pool of batch workers.
//!
//! Setup failures abort the crawl before any worker starts. Once workers are
//! running, a failing block is logged and counted and the worker moves on to
//! the next height in its batch. Nothing is retried. A panicking worker loses
//! the rest of its batch; those heights are logged.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::scheduler::{fork_chunks, partition, Batch};
use crate::extraction::keys::partition_prefix;
use crate::extraction::{BlockExtractor, Buckets};
use crate::rpc::{ChainReader, LogQuery, RpcError};
use crate::storage::{IngestionSink, StorageError};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid crawl options: {0}")]
    InvalidOptions(String),

    #[error("Node unreachable: {0}")]
    Unreachable(#[source] RpcError),

    #[error("Failed to resolve chain head: {0}")]
    Head(#[source] RpcError),

    #[error("Sink unavailable: {0}")]
    Sink(#[source] StorageError),

    #[error("Failed to query contract logs: {0}")]
    Logs(#[source] RpcError),

    #[error("Start block {start} is below floor {floor}")]
    InvalidRange { start: u64, floor: u64 },

    #[error("Worker pool closed")]
    WorkerPoolClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Every height in `[floor, head]`.
    FullRange,
    /// Only heights where the tracked contract emitted logs.
    ForkDiff,
}

/// What the caller asks for, before the chain head is known.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub mode: CrawlMode,
    /// Highest height to crawl; the chain head when unset.
    pub start: Option<u64>,
    /// Lowest height to crawl.
    pub floor: u64,
    pub batch_size: u64,
    pub concurrency_limit: usize,
    pub fork_chunk_size: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            mode: CrawlMode::FullRange,
            start: None,
            floor: 0,
            batch_size: 100_000,
            concurrency_limit: 200,
            fork_chunk_size: 100,
        }
    }
}

impl CrawlOptions {
    fn validate(&self) -> Result<(), CrawlError> {
        if self.batch_size == 0 {
            return Err(CrawlError::InvalidOptions("batch_size must be > 0".into()));
        }
        if self.concurrency_limit == 0 || self.concurrency_limit > Semaphore::MAX_PERMITS {
            return Err(CrawlError::InvalidOptions(format!(
                "concurrency_limit must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.fork_chunk_size == 0 {
            return Err(CrawlError::InvalidOptions("fork_chunk_size must be > 0".into()));
        }
        Ok(())
    }
}

/// A resolved crawl. Fixed once setup has read the chain head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub mode: CrawlMode,
    pub head: u64,
    /// Highest height crawled, `min(requested start, head)`.
    pub start: u64,
    pub floor: u64,
    pub batch_size: u64,
    pub concurrency_limit: usize,
    pub fork_chunk_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub batches: usize,
    pub blocks_ok: u64,
    pub blocks_failed: u64,
    pub panicked_workers: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct BatchOutcome {
    ok: u64,
    failed: u64,
    /// Height being processed; on panic, where the batch stopped.
    current: Option<u64>,
    panicked: bool,
}

pub struct Crawler<R: ?Sized, S: ?Sized> {
    reader: Arc<R>,
    sink: Arc<S>,
    extractor: Arc<BlockExtractor>,
    buckets: Arc<Buckets>,
}

impl<R, S> Crawler<R, S>
where
    R: ChainReader + ?Sized + 'static,
    S: IngestionSink + ?Sized + 'static,
{
    pub fn new(reader: Arc<R>, sink: Arc<S>, extractor: BlockExtractor, buckets: Buckets) -> Self {
        Self {
            reader,
            sink,
            extractor: Arc::new(extractor),
            buckets: Arc::new(buckets),
        }
    }

    pub async fn run(&self, options: &CrawlOptions) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        let identity = self.extractor.identity();
        tracing::info!(
            "Starting {:?} crawl for {}/{} via {}",
            options.mode,
            identity.chain,
            identity.network,
            identity.provider
        );

        let job = self.setup(options).await?;
        let batches = self.plan(&job).await?;
        tracing::info!(
            "Planned {} batches over blocks {}-{} (head {}, concurrency {})",
            batches.len(),
            job.start,
            job.floor,
            job.head,
            job.concurrency_limit
        );

        let mut report = self.dispatch(&job, batches).await?;
        report.elapsed = started.elapsed();

        tracing::info!(
            "Crawl complete in {:?}: {} batches, {} blocks ok, {} blocks failed, {} workers panicked",
            report.elapsed,
            report.batches,
            report.blocks_ok,
            report.blocks_failed,
            report.panicked_workers
        );
        Ok(report)
    }

    async fn setup(&self, options: &CrawlOptions) -> Result<CrawlJob, CrawlError> {
        options.validate()?;

        let probed = self.reader.probe().await.map_err(CrawlError::Unreachable)?;
        tracing::debug!("Node reachable, reports block {}", probed);

        let head = self.reader.block_number().await.map_err(CrawlError::Head)?;
        let start = match options.start {
            Some(start) if start > head => {
                tracing::warn!("Requested start {} is above head {}, clamping", start, head);
                head
            }
            Some(start) => start,
            None => head,
        };
        if start < options.floor {
            return Err(CrawlError::InvalidRange {
                start,
                floor: options.floor,
            });
        }

        let identity = self.extractor.identity();
        let prefix = partition_prefix(&identity.chain, &identity.network);
        let populated = self
            .sink
            .has_objects(&self.buckets.events, &prefix)
            .await
            .map_err(CrawlError::Sink)?;
        if populated {
            tracing::info!(
                "Partitions already present under {}/{}; re-crawled blocks will be overwritten",
                self.buckets.events,
                prefix
            );
        } else {
            tracing::info!("No partitions under {}/{} yet", self.buckets.events, prefix);
        }

        Ok(CrawlJob {
            mode: options.mode,
            head,
            start,
            floor: options.floor,
            batch_size: options.batch_size,
            concurrency_limit: options.concurrency_limit,
            fork_chunk_size: options.fork_chunk_size,
        })
    }

    async fn plan(&self, job: &CrawlJob) -> Result<Vec<Batch>, CrawlError> {
        match job.mode {
            CrawlMode::FullRange => Ok(partition(job.start, job.floor, job.batch_size)
                .into_iter()
                .map(Batch::Range)
                .collect()),
            CrawlMode::ForkDiff => {
                let query = LogQuery::from_block(self.extractor.contract(), job.floor);
                let mut logs = self
                    .reader
                    .filter_logs(&query)
                    .await
                    .map_err(CrawlError::Logs)?;
                logs.retain(|log| log.block_number <= job.start);
                tracing::info!(
                    "Found {} logs for contract {} since block {}",
                    logs.len(),
                    query.address,
                    job.floor
                );

                Ok(fork_chunks(&logs, job.fork_chunk_size)
                    .into_iter()
                    .map(Batch::from_heights)
                    .collect())
            }
        }
    }

    async fn dispatch(&self, job: &CrawlJob, batches: Vec<Batch>) -> Result<CrawlReport, CrawlError> {
        let mut report = CrawlReport {
            batches: batches.len(),
            ..Default::default()
        };
        let semaphore = Arc::new(Semaphore::new(job.concurrency_limit));
        let mut workers = JoinSet::new();

        for (index, batch) in batches.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| CrawlError::WorkerPoolClosed)?;

            let reader = self.reader.clone();
            let sink = self.sink.clone();
            let extractor = self.extractor.clone();
            let buckets = self.buckets.clone();

            workers.spawn(async move {
                let _permit = permit;
                let mut outcome = BatchOutcome::default();
                let run = run_batch(
                    index,
                    &batch,
                    &*reader,
                    &*sink,
                    &extractor,
                    &buckets,
                    &mut outcome,
                );
                let result = AssertUnwindSafe(run).catch_unwind().await;
                if let Err(panic) = result {
                    let unprocessed = match outcome.current {
                        Some(height) => batch.remaining_from(height),
                        None => batch.clone(),
                    };
                    tracing::error!(
                        "Batch {} ({}) panicked: {}; {} not processed",
                        index,
                        batch,
                        panic_message(panic.as_ref()),
                        describe(&unprocessed)
                    );
                    outcome.panicked = true;
                }
                outcome
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.blocks_ok += outcome.ok;
                    report.blocks_failed += outcome.failed;
                    if outcome.panicked {
                        report.panicked_workers += 1;
                    }
                }
                Err(e) => {
                    tracing::error!("Batch worker aborted: {}", e);
                    report.panicked_workers += 1;
                }
            }
        }

        Ok(report)
    }
}

async fn run_batch<R, S>(
    index: usize,
    batch: &Batch,
    reader: &R,
    sink: &S,
    extractor: &BlockExtractor,
    buckets: &Buckets,
    outcome: &mut BatchOutcome,
) where
    R: ChainReader + ?Sized,
    S: IngestionSink + ?Sized,
{
    let started = Instant::now();
    tracing::info!("Batch {} started: {}", index, batch);

    for height in batch.heights() {
        outcome.current = Some(height);
        match extractor.process(reader, sink, buckets, height).await {
            Ok(_) => outcome.ok += 1,
            Err(e) => {
                tracing::error!("Block {} failed: {}", height, e);
                outcome.failed += 1;
            }
        }
    }

    tracing::info!(
        "Batch {} complete in {:?}: {} ok, {} failed",
        index,
        started.elapsed(),
        outcome.ok,
        outcome.failed
    );
}

fn describe(batch: &Batch) -> String {
    match batch {
        Batch::Range(range) => format!("blocks {range}"),
        Batch::Heights(heights) => format!("heights {heights:?}"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
