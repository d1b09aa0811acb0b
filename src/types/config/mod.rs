pub mod chain;
pub mod crawler;
pub mod environment;
mod error;
pub mod rpc;
pub mod sink;

pub use error::ConfigError;
