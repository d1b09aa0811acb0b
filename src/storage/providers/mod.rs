mod file;
mod memory;
mod s3;

pub use file::FileSink;
pub use memory::MemorySink;
pub use s3::S3Sink;
