use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::extraction::Buckets;
use crate::types::config::chain::ChainConfig;
use crate::types::config::environment::EnvironmentBuckets;
use crate::types::config::rpc::RpcSettings;
use crate::types::config::sink::SinkConfig;
use crate::types::config::ConfigError;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CrawlSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default = "default_fork_chunk_size")]
    pub fork_chunk_size: usize,
}

fn default_batch_size() -> u64 {
    100_000
}

fn default_concurrency_limit() -> usize {
    200
}

fn default_fork_chunk_size() -> usize {
    100
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency_limit: default_concurrency_limit(),
            fork_chunk_size: default_fork_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub crawler: CrawlSettings,
    #[serde(default)]
    pub rpc: RpcSettings,
    pub environments: BTreeMap<String, EnvironmentBuckets>,
    #[serde(default)]
    pub sink: SinkConfig,
}

impl CrawlerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CrawlerConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::Invalid("no chains configured".into()));
        }
        for (i, chain) in self.chains.iter().enumerate() {
            let duplicate = self.chains[..i]
                .iter()
                .any(|c| c.name == chain.name && c.network == chain.network);
            if duplicate {
                return Err(ConfigError::Invalid(format!(
                    "chain {}/{} configured twice",
                    chain.name, chain.network
                )));
            }
        }
        if self.crawler.batch_size == 0 {
            return Err(ConfigError::Invalid("crawler.batch_size must be > 0".into()));
        }
        if self.crawler.concurrency_limit == 0 {
            return Err(ConfigError::Invalid("crawler.concurrency_limit must be > 0".into()));
        }
        if self.crawler.fork_chunk_size == 0 {
            return Err(ConfigError::Invalid("crawler.fork_chunk_size must be > 0".into()));
        }
        for (name, buckets) in &self.environments {
            if [&buckets.events, &buckets.wallets, &buckets.contracts]
                .iter()
                .any(|b| b.is_empty())
            {
                return Err(ConfigError::Invalid(format!(
                    "environment {name} has an empty bucket name"
                )));
            }
        }
        Ok(())
    }

    pub fn chain(&self, name: &str, network: &str) -> Result<&ChainConfig, ConfigError> {
        self.chains
            .iter()
            .find(|c| c.name == name && c.network == network)
            .ok_or_else(|| ConfigError::UnknownChain {
                chain: name.to_string(),
                network: network.to_string(),
            })
    }

    /// Bucket names for a deployment environment such as `dev` or `prod`.
    pub fn buckets(&self, environment: &str) -> Result<Buckets, ConfigError> {
        self.environments
            .get(environment)
            .cloned()
            .map(Buckets::from)
            .ok_or_else(|| ConfigError::UnknownEnvironment(environment.to_string()))
    }
}
