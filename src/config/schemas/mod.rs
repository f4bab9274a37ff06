// Config schema submodules, one file per section

use crate::config_struct;
use crate::errors::ConfigError;

mod contracts;
mod providers;
mod rewards;

pub use contracts::*;
pub use providers::*;
pub use rewards::*;

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        /// Provider credentials and retry policy
        providers: ProvidersConfig = ProvidersConfig::default(),

        /// Contract addresses
        contracts: ContractsConfig = ContractsConfig::default(),

        /// Subgraph endpoints
        subgraph: SubgraphConfig = SubgraphConfig::default(),

        /// Reward engine scheduling
        rewards: RewardsConfig = RewardsConfig::default(),

        /// Local cache
        cache: CacheConfig = CacheConfig::default(),
    }
}

impl Config {
    /// Reject configurations the stack cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.public_rpc_urls.is_empty() {
            return Err(ConfigError::Invalid(
                "providers.public_rpc_urls must contain at least one endpoint".to_string(),
            ));
        }
        if self.providers.alchemy_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "providers.alchemy_keys contains an empty key".to_string(),
            ));
        }
        if self.contracts.multicall_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "contracts.multicall_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.rewards.grave_page_size == 0 || self.rewards.grave_page_size > 800 {
            return Err(ConfigError::Invalid(
                "rewards.grave_page_size must be between 1 and 800".to_string(),
            ));
        }
        if self.rewards.grave_max_pages == 0 || self.rewards.grave_max_pages > 10 {
            return Err(ConfigError::Invalid(
                "rewards.grave_max_pages must be between 1 and 10".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [providers]
            alchemy_keys = ["k1", "k2"]

            [rewards]
            cache_ttl_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.providers.alchemy_keys.len(), 2);
        assert_eq!(config.providers.max_retries, 5);
        assert_eq!(config.rewards.cache_ttl_secs, 30);
        assert_eq!(config.rewards.refresh_interval_secs, 60);
        assert_eq!(config.contracts.multicall_address, MULTICALL3_ADDRESS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_public_rpcs() {
        let mut config = Config::default();
        config.providers.public_rpc_urls.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rewards.grave_page_size = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_caps_grave_pages() {
        let mut config = Config::default();
        config.rewards.grave_max_pages = 10;
        assert!(config.validate().is_ok());

        config.rewards.grave_max_pages = 1_000;
        assert!(config.validate().is_err());

        config.rewards.grave_max_pages = 0;
        assert!(config.validate().is_err());
    }
}
