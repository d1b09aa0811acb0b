use alloy_primitives::Address;
use serde::Deserialize;
use url::Url;

use crate::extraction::BlockIdentity;
use crate::types::config::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub network: String,
    pub chain_id: u64,
    /// Node provider label recorded on every row.
    pub provider: String,
    pub rpc_url_env_var: String,
    /// The staking manager contract whose logs are decoded.
    pub contract_address: Address,
    /// Lowest height crawled when no `--end` is given.
    #[serde(default)]
    pub start_block: Option<u64>,
}

impl ChainConfig {
    pub fn identity(&self) -> BlockIdentity {
        BlockIdentity::new(&self.name, &self.network, &self.provider)
    }

    /// Reads the node URL from `rpc_url_env_var`.
    pub fn rpc_url(&self) -> Result<Url, ConfigError> {
        let raw = std::env::var(&self.rpc_url_env_var)
            .map_err(|_| ConfigError::MissingEnvVar(self.rpc_url_env_var.clone()))?;
        Url::parse(&raw).map_err(|e| ConfigError::InvalidRpcUrl {
            var: self.rpc_url_env_var.clone(),
            message: e.to_string(),
        })
    }
}
