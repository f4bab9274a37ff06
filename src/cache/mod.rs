//! TTL-checked cache over a key/value store
//!
//! Entries are stored as JSON `{ts, data}` with `ts` in unix milliseconds.
//! The TTL is enforced when reading: a stale entry is reported as missing
//! but left in the store until it is overwritten.

pub mod storage;

pub use storage::{JsonFileStore, KvStore, MemoryStore};

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{CacheConfig, RewardsConfig};
use crate::errors::CacheError;
use crate::logger::{self, LogTag};

/// Default freshness window of cached rewards
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub ts: u64,
    pub data: T,
}

impl<T> CacheEntry<T> {
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.ts)
    }
}

/// Cache key of an account's pending rewards
pub fn pending_rewards_key(account: &Address) -> String {
    format!("{:#x}:pendingRewards", account)
}

pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[derive(Clone)]
pub struct TtlCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// File-backed when `cache.persist` is set, in-memory otherwise
    pub fn from_config(cache: &CacheConfig, rewards: &RewardsConfig) -> Result<Self, CacheError> {
        let store: Arc<dyn KvStore> = if cache.persist {
            Arc::new(JsonFileStore::open(&cache.file_path)?)
        } else {
            Arc::new(MemoryStore::new())
        };
        Ok(Self::new(store, Duration::from_secs(rewards.cache_ttl_secs)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry under `key`, if any. Unreadable entries count as missing.
    pub fn read<T: DeserializeOwned>(&self, key: &str, now_ms: u64) -> Option<CacheEntry<T>> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                logger::warning(LogTag::Cache, &format!("Read of {} failed: {}", key, e));
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                logger::debug(LogTag::Cache, &format!("Discarding unreadable {}: {}", key, e));
                return None;
            }
        };

        let age = entry.age_ms(now_ms);
        if u128::from(age) > self.ttl.as_millis() {
            logger::debug(
                LogTag::Cache,
                &format!("{} is stale ({}ms old)", key, age),
            );
            return None;
        }
        Some(entry)
    }

    pub fn write<T: Serialize>(&self, key: &str, data: &T, now_ms: u64) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&CacheEntry { ts: now_ms, data })?;
        self.store.set(key, raw)
    }

    pub fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn cache() -> (TtlCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (TtlCache::new(store.clone(), DEFAULT_CACHE_TTL), store)
    }

    #[test]
    fn test_key_is_lowercase() {
        let account = Address::from_str("0x00000000000000000000000000000000000000AB").unwrap();
        assert_eq!(
            pending_rewards_key(&account),
            "0x00000000000000000000000000000000000000ab:pendingRewards"
        );
    }

    #[test]
    fn test_ttl_enforced_on_read() {
        let (cache, _) = cache();
        cache.write("k", &vec![1u32, 2, 3], 1_000_000).unwrap();

        let fresh: CacheEntry<Vec<u32>> = cache.read("k", 1_000_000 + 30_000).unwrap();
        assert_eq!(fresh.data, vec![1, 2, 3]);
        assert_eq!(fresh.ts, 1_000_000);

        assert!(cache.read::<Vec<u32>>("k", 1_000_000 + 60_000).is_some());
        assert!(cache.read::<Vec<u32>>("k", 1_000_000 + 60_001).is_none());
    }

    #[test]
    fn test_entry_format() {
        let (cache, store) = cache();
        cache.write("k", &vec!["a"], 42).unwrap();
        let raw = store.get("k").unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["ts"], 42);
        assert_eq!(json["data"][0], "a");
    }

    #[test]
    fn test_unreadable_entry_is_missing() {
        let (cache, store) = cache();
        store.set("k", "garbage".to_string()).unwrap();
        assert!(cache.read::<Vec<u32>>("k", 0).is_none());
    }
}
