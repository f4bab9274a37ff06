use crate::config_struct;

// ============================================================================
// PROVIDER CONFIGURATION
// ============================================================================

config_struct! {
    /// Provider credentials and request policy
    pub struct ProvidersConfig {
        /// Tier 0: premium API keys, rotated round-robin
        alchemy_keys: Vec<String> = Vec::new(),

        /// Base URL for keyed JSON-RPC requests (`<base>/v2/<key>`)
        rpc_base_url: String = "https://eth-mainnet.g.alchemy.com".to_string(),

        /// Base URL for keyed NFT API requests (`<base>/nft/v3/<key>`)
        nft_base_url: String = "https://eth-mainnet.g.alchemy.com".to_string(),

        /// Tier 1: public RPC endpoints used when every key is failed
        public_rpc_urls: Vec<String> = vec![
            "https://ethereum-rpc.publicnode.com".to_string(),
            "https://cloudflare-eth.com".to_string(),
        ],

        /// Failed credentials become eligible again after this many seconds
        reset_interval_secs: u64 = 180,

        /// Retries after the first attempt of a logical request
        max_retries: u32 = 5,

        /// First backoff delay between attempts
        backoff_base_ms: u64 = 2_000,

        /// Backoff ceiling
        backoff_max_ms: u64 = 64_000,

        /// Random jitter added on top of each backoff delay
        backoff_jitter_ms: u64 = 1_000,

        /// Per-request HTTP timeout
        request_timeout_secs: u64 = 15,
    }
}
