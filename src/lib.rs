pub mod crawler;
pub mod decoding;
pub mod extraction;
pub mod rpc;
pub mod storage;
pub mod types;
