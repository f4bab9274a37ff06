use crate::config_struct;

/// Canonical Multicall3 deployment (same address on every EVM chain)
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

config_struct! {
    /// On-chain contracts read by the rewards engine
    pub struct ContractsConfig {
        /// Chain the contracts live on; scopes the reader-unsupported flag
        chain_id: u64 = 1,

        /// Read-only reader contract (viewGraveWindow / getBurnInfo / getLPInfo)
        reader_address: String = String::new(),

        /// Core game contract (paused / burnSplits / nftLP)
        core_address: String = String::new(),

        /// Multicall3 used to batch reads
        multicall_address: String = MULTICALL3_ADDRESS.to_string(),

        /// Maximum calls per aggregate3 round-trip
        multicall_chunk_size: usize = 200,
    }
}

config_struct! {
    /// Subgraph discovery endpoints, in priority order
    pub struct SubgraphConfig {
        endpoints: Vec<String> = Vec::new(),

        request_timeout_secs: u64 = 10,

        /// Tokens requested per query (The Graph caps `first` at 1000)
        page_size: usize = 1_000,

        /// Queries per discovery; a full last page is logged as truncated
        max_pages: usize = 10,
    }
}
