//! Key rotation registry
//!
//! Hands out the next usable provider credential:
//! - tier 0 keys are round-robined while at least one is not failed
//! - when tier 0 is exhausted the registry escalates to tier 1 public endpoints
//! - tier 2 (generic client) is only entered when tier 1 is exhausted too, and
//!   only the RPC client acts on it
//! - every `reset_interval` the failed set is cleared and tier drops back to 0
//!
//! One registry is shared (via `Arc`) by every caller of an application
//! context. The lock is never held across an await.

use crate::config::ProvidersConfig;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use super::types::{CredentialStats, ProviderCredential, Tier};

/// Default self-healing window
pub const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(180);

struct RegistryState {
    tier: Tier,
    failed: HashSet<ProviderCredential>,
    premium_cursor: usize,
    public_cursor: usize,
    last_reset: Instant,
    stats: HashMap<ProviderCredential, CredentialStats>,
}

pub struct KeyRegistry {
    premium: Vec<ProviderCredential>,
    public: Vec<ProviderCredential>,
    reset_interval: Duration,
    state: Mutex<RegistryState>,
}

impl KeyRegistry {
    /// Build a registry; at least one public endpoint is required so that
    /// selection always has a last resort.
    pub fn new(
        premium_keys: Vec<String>,
        public_urls: Vec<String>,
        reset_interval: Duration,
    ) -> Result<Self, ConfigError> {
        if public_urls.is_empty() {
            return Err(ConfigError::Invalid(
                "key registry needs at least one public endpoint".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let premium: Vec<ProviderCredential> = premium_keys
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .map(ProviderCredential::premium)
            .collect();
        let public: Vec<ProviderCredential> = public_urls
            .into_iter()
            .filter(|u| seen.insert(u.clone()))
            .map(ProviderCredential::public)
            .collect();

        let tier = if premium.is_empty() {
            Tier::Public
        } else {
            Tier::Premium
        };

        Ok(Self {
            premium,
            public,
            reset_interval,
            state: Mutex::new(RegistryState {
                tier,
                failed: HashSet::new(),
                premium_cursor: 0,
                public_cursor: 0,
                last_reset: Instant::now(),
                stats: HashMap::new(),
            }),
        })
    }

    pub fn from_config(config: &ProvidersConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.alchemy_keys.clone(),
            config.public_rpc_urls.clone(),
            Duration::from_secs(config.reset_interval_secs),
        )
    }

    /// Select the next credential. Never fails: with every tier exhausted the
    /// first public endpoint is returned.
    pub fn select_credential(&self) -> ProviderCredential {
        self.select_credential_at(Instant::now())
    }

    pub(crate) fn select_credential_at(&self, now: Instant) -> ProviderCredential {
        let mut state = self.state.lock();
        self.reset_locked(&mut state, now);

        if state.tier == Tier::Premium {
            let available: Vec<&ProviderCredential> = self
                .premium
                .iter()
                .filter(|c| !state.failed.contains(*c))
                .collect();

            if !available.is_empty() {
                let chosen = available[state.premium_cursor % available.len()].clone();
                state.premium_cursor = state.premium_cursor.wrapping_add(1);
                record_use(&mut state, &chosen, now);
                return chosen;
            }

            state.tier = Tier::Public;
            logger::warning(
                LogTag::Registry,
                &format!(
                    "All {} premium keys failed, escalating to {}",
                    self.premium.len(),
                    Tier::Public
                ),
            );
        }

        let available: Vec<&ProviderCredential> = self
            .public
            .iter()
            .filter(|c| !state.failed.contains(*c))
            .collect();

        let chosen = if available.is_empty() {
            logger::debug(
                LogTag::Registry,
                "Every endpoint is marked failed, using first public endpoint as last resort",
            );
            self.public[0].clone()
        } else {
            let chosen = available[state.public_cursor % available.len()].clone();
            state.public_cursor = state.public_cursor.wrapping_add(1);
            chosen
        };

        record_use(&mut state, &chosen, now);
        chosen
    }

    /// Mark a credential failed; escalates the tier when this empties it
    pub fn mark_failed(&self, credential: &ProviderCredential) {
        let mut state = self.state.lock();
        state.failed.insert(credential.clone());
        state.stats.entry(credential.clone()).or_default().fails += 1;

        if credential.tier != state.tier {
            return;
        }

        let pool = match credential.tier {
            Tier::Premium => &self.premium,
            Tier::Public => &self.public,
            Tier::Generic => return,
        };

        if pool.iter().all(|c| state.failed.contains(c)) {
            let next = state.tier.next();
            logger::warning(
                LogTag::Registry,
                &format!("{} exhausted, escalating to {}", state.tier, next),
            );
            state.tier = next;
        } else {
            logger::debug(
                LogTag::Registry,
                &format!("Marked {} failed", credential.masked()),
            );
        }
    }

    /// Clear the failed set and return to tier 0 once the reset window elapsed
    pub fn reset_if_stale(&self) -> bool {
        self.reset_if_stale_at(Instant::now())
    }

    pub(crate) fn reset_if_stale_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        self.reset_locked(&mut state, now)
    }

    fn reset_locked(&self, state: &mut RegistryState, now: Instant) -> bool {
        if now.saturating_duration_since(state.last_reset) <= self.reset_interval {
            return false;
        }

        let had_failures = !state.failed.is_empty();
        state.failed.clear();
        state.tier = self.initial_tier();
        state.last_reset = now;

        if had_failures {
            logger::info(
                LogTag::Registry,
                &format!("Reset window elapsed, failed credentials cleared, back to {}", state.tier),
            );
        }
        true
    }

    /// True when both keyed and public pools are exhausted and the RPC layer
    /// should answer from the generic fallback client
    pub fn select_generic_fallback(&self) -> bool {
        let mut state = self.state.lock();
        self.reset_locked(&mut state, Instant::now());
        state.tier == Tier::Generic
    }

    /// Force the registry to a tier (the RPC client uses this to leave tier 2
    /// for methods the generic client cannot serve)
    pub fn force_tier(&self, tier: Tier) {
        let mut state = self.state.lock();
        if state.tier != tier {
            logger::debug(
                LogTag::Registry,
                &format!("Forcing {} -> {}", state.tier, tier),
            );
            state.tier = tier;
        }
    }

    pub fn current_tier(&self) -> Tier {
        self.state.lock().tier
    }

    pub fn failed_count(&self) -> usize {
        self.state.lock().failed.len()
    }

    pub fn is_failed(&self, credential: &ProviderCredential) -> bool {
        self.state.lock().failed.contains(credential)
    }

    /// Usage counters for every credential that has been used or failed
    pub fn stats(&self) -> Vec<(ProviderCredential, CredentialStats)> {
        let state = self.state.lock();
        self.premium
            .iter()
            .chain(self.public.iter())
            .filter_map(|c| state.stats.get(c).map(|s| (c.clone(), s.clone())))
            .collect()
    }

    pub fn premium_count(&self) -> usize {
        self.premium.len()
    }

    pub fn public_endpoints(&self) -> &[ProviderCredential] {
        &self.public
    }

    fn initial_tier(&self) -> Tier {
        if self.premium.is_empty() {
            Tier::Public
        } else {
            Tier::Premium
        }
    }
}

fn record_use(state: &mut RegistryState, credential: &ProviderCredential, now: Instant) {
    let stats = state.stats.entry(credential.clone()).or_default();
    stats.uses += 1;
    stats.last_used_at = Some(now);
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("KeyRegistry")
            .field("premium", &self.premium.len())
            .field("public", &self.public.len())
            .field("tier", &state.tier)
            .field("failed", &state.failed.len())
            .finish()
    }
}
