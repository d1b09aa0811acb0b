use serde::Deserialize;

use crate::extraction::Buckets;

/// Bucket names one deployment environment writes to.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EnvironmentBuckets {
    pub events: String,
    pub wallets: String,
    pub contracts: String,
}

impl From<EnvironmentBuckets> for Buckets {
    fn from(env: EnvironmentBuckets) -> Self {
        Buckets {
            events: env.events,
            wallets: env.wallets,
            contracts: env.contracts,
        }
    }
}
