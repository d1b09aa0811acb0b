mod reader;
mod rpc;
mod types;

pub use reader::ChainReader;
pub use rpc::{RateLimitConfig, RetryConfig, RpcClient, RpcClientConfig, RpcError};
pub use types::{BlockData, LogQuery, RawLog, ReceiptData, TransactionData};
