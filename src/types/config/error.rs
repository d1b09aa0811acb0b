use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Chain {chain}/{network} not found in config")]
    UnknownChain { chain: String, network: String },

    #[error("Environment {0} not found in config")]
    UnknownEnvironment(String),

    #[error("Missing env var {0}")]
    MissingEnvVar(String),

    #[error("Invalid RPC URL in {var}: {message}")]
    InvalidRpcUrl { var: String, message: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}
