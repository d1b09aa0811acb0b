//! Object keys for per-block partitions. A key depends only on chain, network
//! and height, so re-crawling a height overwrites what was there.

/// Prefix shared by every partition of a chain/network pair.
pub fn partition_prefix(chain: &str, network: &str) -> String {
    format!("{chain}/{network}/")
}

/// `{chain}/{network}/block={height}.ndjson`
pub fn block_key(chain: &str, network: &str, height: u64) -> String {
    format!("{chain}/{network}/block={height}.ndjson")
}

/// `{chain}/{network}/contracts/block={height}.ndjson`
pub fn contracts_key(chain: &str, network: &str, height: u64) -> String {
    format!("{chain}/{network}/contracts/block={height}.ndjson")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(
            block_key("ethereum", "mainnet", 19_000_001),
            "ethereum/mainnet/block=19000001.ndjson"
        );
        assert_eq!(
            contracts_key("ethereum", "holesky", 7),
            "ethereum/holesky/contracts/block=7.ndjson"
        );
        assert_eq!(block_key("ethereum", "mainnet", 0), "ethereum/mainnet/block=0.ndjson");
        assert!(block_key("ethereum", "mainnet", 5).starts_with(&partition_prefix("ethereum", "mainnet")));
    }
}
