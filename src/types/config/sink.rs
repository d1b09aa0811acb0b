use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// S3 or any S3-compatible store. Credentials come from the usual AWS
    /// environment and profile chain.
    S3 {
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint_url: Option<String>,
    },
    /// Local directory, one subdirectory per bucket.
    File { root: PathBuf },
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::S3 {
            region: None,
            endpoint_url: None,
        }
    }
}
