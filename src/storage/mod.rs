//! Ingestion sink: where serialized partitions are written.

mod error;
pub mod providers;
mod traits;

pub use error::StorageError;
pub use providers::{FileSink, MemorySink, S3Sink};
pub use traits::IngestionSink;
