use crate::config_struct;

config_struct! {
    /// Reward discovery and refresh scheduling
    pub struct RewardsConfig {
        /// Base interval between scheduled fetches
        refresh_interval_secs: u64 = 60,

        /// Scheduled fetches are shifted by up to +/- this many milliseconds
        refresh_jitter_ms: u64 = 2_000,

        /// First delay added after a failed fetch
        error_backoff_base_secs: u64 = 5,

        /// Ceiling for the failed-fetch delay
        error_backoff_max_secs: u64 = 60,

        /// Cached rewards older than this are not shown
        cache_ttl_secs: u64 = 60,

        /// Ids requested per viewGraveWindow page (at most 800)
        grave_page_size: u64 = 800,

        /// Maximum viewGraveWindow pages per enumeration (at most 10)
        grave_max_pages: u32 = 10,
    }
}

config_struct! {
    /// Local persisted cache
    pub struct CacheConfig {
        /// JSON file holding every cached key
        file_path: String = "data/rewards_cache.json".to_string(),

        /// Use the file store; the in-memory store is used otherwise
        persist: bool = true,
    }
}
