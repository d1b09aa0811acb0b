use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Address, BlockNumber, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{Block, BlockId, BlockNumberOrTag, Filter, Log, TransactionReceipt};
use governor::clock::{QuantaClock, QuantaInstant};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("RPC call '{0}' timed out after {1:?}")]
    Timeout(String, Duration),
}

impl RpcError {
    /// Check if this error is likely transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Timeout(..) => false,
            RpcError::ProviderError(msg) => Self::is_retryable_message(msg),
        }
    }

    fn is_retryable_message(msg: &str) -> bool {
        let msg_lower = msg.to_lowercase();
        msg_lower.contains("connection")
            || msg_lower.contains("timeout")
            || msg_lower.contains("timed out")
            || msg_lower.contains("reset")
            || msg_lower.contains("broken pipe")
            || msg_lower.contains("eof")
            || msg_lower.contains("sending request")
            || msg_lower.contains("rate limit")
            || msg_lower.contains("too many requests")
            || msg_lower.contains("429")
            || msg_lower.contains("502")
            || msg_lower.contains("503")
            || msg_lower.contains("504")
            || msg_lower.contains("service unavailable")
            || msg_lower.contains("bad gateway")
            || msg_lower.contains("try again")
    }
}

/// Configuration for retry behavior of a single RPC call
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = Duration::from_millis(delay_ms as u64);
        std::cmp::min(delay, self.max_delay)
    }
}

/// Execute an async operation with retry logic
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            tracing::debug!(
                "RPC retry {}/{} for '{}' in {:?}",
                attempt,
                config.max_retries,
                operation_name,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                tracing::warn!(
                    "RPC '{}' failed (attempt {}/{}): {}",
                    operation_name,
                    attempt + 1,
                    config.max_retries + 1,
                    e
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub type StandardRateLimiter =
    RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub url: Url,
    pub rate_limit: Option<RateLimitConfig>,
    pub retry: RetryConfig,
    /// Deadline for the liveness probe issued before a crawl starts
    pub probe_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_second: NonZeroU32,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl RateLimitConfig {
    pub fn per_second(requests_per_second: NonZeroU32) -> Self {
        Self {
            requests_per_second,
            jitter_min_ms: 5,
            jitter_max_ms: 50,
        }
    }
}

impl RpcClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            rate_limit: None,
            retry: RetryConfig::default(),
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// HTTP JSON-RPC client shared read-only by every crawl worker.
pub struct RpcClient {
    provider: RootProvider<Ethereum>,
    config: RpcClientConfig,
    rate_limiter: Option<Arc<StandardRateLimiter>>,
    jitter: Option<Jitter>,
}

impl RpcClient {
    pub fn new(config: RpcClientConfig) -> Result<Self, RpcError> {
        let provider = RootProvider::<Ethereum>::new_http(config.url.clone());

        let (rate_limiter, jitter) = if let Some(ref rate_config) = config.rate_limit {
            let quota = Quota::per_second(rate_config.requests_per_second);
            let limiter = RateLimiter::direct(quota);
            let jitter = Jitter::new(
                Duration::from_millis(rate_config.jitter_min_ms),
                Duration::from_millis(rate_config.jitter_max_ms),
            );
            (Some(Arc::new(limiter)), Some(jitter))
        } else {
            (None, None)
        };

        Ok(Self {
            provider,
            config,
            rate_limiter,
            jitter,
        })
    }

    async fn wait_for_rate_limit(&self) {
        if let (Some(limiter), Some(jitter)) = (&self.rate_limiter, &self.jitter) {
            limiter.until_ready_with_jitter(*jitter).await;
        }
    }

    /// Single `eth_blockNumber` under the probe deadline, without retries.
    pub async fn probe(&self) -> Result<BlockNumber, RpcError> {
        let timeout = self.config.probe_timeout;
        match tokio::time::timeout(timeout, self.provider.get_block_number()).await {
            Ok(result) => result.map_err(|e| RpcError::Transport(e.to_string())),
            Err(_) => Err(RpcError::Timeout("eth_blockNumber".to_string(), timeout)),
        }
    }

    pub async fn get_block_number(&self) -> Result<BlockNumber, RpcError> {
        with_retry(&self.config.retry, "eth_blockNumber", || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_block_number()
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }

    pub async fn get_full_block(&self, number: u64) -> Result<Option<Block>, RpcError> {
        let op_name = format!("eth_getBlockByNumber({})", number);
        with_retry(&self.config.retry, &op_name, || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_block(BlockId::Number(BlockNumberOrTag::Number(number)))
                .full()
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }

    pub async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let op_name = format!("eth_getTransactionReceipt({:?})", hash);
        with_retry(&self.config.retry, &op_name, || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }

    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        let op_name = format!(
            "eth_getLogs(blocks {:?}-{:?})",
            filter.get_from_block(),
            filter.get_to_block()
        );
        with_retry(&self.config.retry, &op_name, || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_logs(filter)
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }

    pub async fn get_balance(&self, address: Address, number: u64) -> Result<U256, RpcError> {
        let op_name = format!("eth_getBalance({:?}, {})", address, number);
        with_retry(&self.config.retry, &op_name, || async {
            self.wait_for_rate_limit().await;
            self.provider
                .get_balance(address)
                .block_id(BlockId::Number(BlockNumberOrTag::Number(number)))
                .await
                .map_err(|e| RpcError::ProviderError(e.to_string()))
        })
        .await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}
