//! Batch scheduling and the crawl orchestrator.

mod orchestrator;
mod scheduler;

pub use orchestrator::{CrawlError, CrawlJob, CrawlMode, CrawlOptions, CrawlReport, Crawler};
pub use scheduler::{fork_chunks, partition, Batch, BlockRange};
