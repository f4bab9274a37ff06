//! Reward discovery and reconciliation engine
//!
//! One engine tracks one connected account at a time and publishes every
//! state change on a `watch` channel. `fetch_rewards` merges the subgraph,
//! the reader contract and the core contract into one sorted list:
//!
//! 1. chain timestamp and `paused` (both best effort)
//! 2. subgraph discovery, confirmed through `getBurnInfo`
//! 3. `viewGraveWindow` enumeration (primary without subgraph data,
//!    supplemental otherwise)
//! 4. fee splits and LP payouts
//! 5. sort, cache write, publish
//!
//! Each fetch is stamped with a generation; a fetch that completes after a
//! newer one was applied, or after `invalidate_in_flight`, is dropped.

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::cache::{now_ms, pending_rewards_key, CacheEntry, TtlCache};
use crate::config::{ContractsConfig, RewardsConfig};
use crate::contracts::{GraveCore, GraveReader, ReaderSupport};
use crate::errors::{ChainError, ConfigError, RewardsError};
use crate::logger::{self, LogTag};
use crate::rpc::{ChainClient, ExponentialBackoff};
use crate::subgraph::SubgraphClient;
use crate::utils::now_unix_secs;

use super::reconcile::{refresh_cached, RewardSet};
use super::types::{BurnReward, RewardSource, RewardsSnapshot, RewardsStatus};

/// Ids requested per `viewGraveWindow` page, also the upper bound
pub const DEFAULT_PAGE_SIZE: u64 = 800;
/// Pages walked per enumeration, also the upper bound
pub const DEFAULT_MAX_PAGES: u32 = 10;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub reader_address: Option<Address>,
    pub core_address: Option<Address>,
    pub page_size: u64,
    pub max_pages: u32,
    /// Delay added to the schedule after consecutive failed fetches
    pub error_backoff: ExponentialBackoff,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reader_address: None,
            core_address: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            error_backoff: ExponentialBackoff::new(
                Duration::from_secs(5),
                Duration::from_secs(60),
                Duration::ZERO,
            ),
        }
    }
}

impl EngineSettings {
    pub fn from_config(contracts: &ContractsConfig, rewards: &RewardsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            reader_address: optional_address("contracts.reader_address", &contracts.reader_address)?,
            core_address: optional_address("contracts.core_address", &contracts.core_address)?,
            page_size: rewards.grave_page_size.clamp(1, DEFAULT_PAGE_SIZE),
            max_pages: rewards.grave_max_pages.clamp(1, DEFAULT_MAX_PAGES),
            error_backoff: ExponentialBackoff::new(
                Duration::from_secs(rewards.error_backoff_base_secs),
                Duration::from_secs(rewards.error_backoff_max_secs),
                Duration::ZERO,
            ),
        })
    }
}

/// Empty means "not deployed"
fn optional_address(field: &str, value: &str) -> Result<Option<Address>, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Address::from_str(value)
        .map(Some)
        .map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", field, value, e)))
}

#[derive(Clone)]
struct Session {
    account: Address,
    chain: Arc<dyn ChainClient>,
}

#[derive(Debug, Default)]
struct Generations {
    started: u64,
    applied: u64,
    /// Fetches started at or before this generation are dropped on completion
    discarded_through: u64,
}

struct FetchOutcome {
    rewards: Vec<BurnReward>,
    paused: Option<bool>,
}

pub struct RewardsEngine {
    settings: EngineSettings,
    cache: TtlCache,
    subgraph: Option<Arc<SubgraphClient>>,
    reader_support: ReaderSupport,
    session: RwLock<Option<Session>>,
    generations: Mutex<Generations>,
    backoff_level: AtomicU32,
    refreshing: AtomicUsize,
    state: watch::Sender<RewardsSnapshot>,
}

impl RewardsEngine {
    pub fn new(settings: EngineSettings, cache: TtlCache, subgraph: Option<Arc<SubgraphClient>>) -> Self {
        let (state, _) = watch::channel(RewardsSnapshot::idle());
        Self {
            settings,
            cache,
            subgraph: subgraph.filter(|client| client.is_configured()),
            reader_support: ReaderSupport::new(),
            session: RwLock::new(None),
            generations: Mutex::new(Generations::default()),
            backoff_level: AtomicU32::new(0),
            refreshing: AtomicUsize::new(0),
            state,
        }
    }

    /// Share the reader-unsupported flags with other engines of the process
    pub fn with_reader_support(mut self, support: ReaderSupport) -> Self {
        self.reader_support = support;
        self
    }

    pub fn parse_account(value: &str) -> Result<Address, RewardsError> {
        Address::from_str(value.trim()).map_err(|_| RewardsError::InvalidAccount(value.to_string()))
    }

    /// Start a session for `account`. Cached rewards, when fresh, are shown
    /// while the first fetch is in flight.
    pub fn connect(&self, account: Address, chain: Arc<dyn ChainClient>) {
        self.invalidate_in_flight();
        *self.session.write() = Some(Session { account, chain });
        self.backoff_level.store(0, Ordering::SeqCst);

        let cached = self.read_cache(&account);
        logger::info(
            LogTag::Rewards,
            &format!(
                "Connected {:#x}{}",
                account,
                match &cached {
                    Some(entry) => format!(" ({} cached rewards)", entry.data.len()),
                    None => String::new(),
                }
            ),
        );

        self.publish(|snapshot| {
            *snapshot = RewardsSnapshot::idle();
            snapshot.status = RewardsStatus::Loading;
            snapshot.account = Some(account);
            if let Some(entry) = cached {
                snapshot.rewards = entry.data;
                snapshot.last_updated = Some(entry.ts);
                snapshot.from_cache = true;
            }
        });
    }

    /// End the session: back to idle with no rewards, in-flight fetches dropped
    pub fn disconnect(&self) {
        self.invalidate_in_flight();
        let previous = self.session.write().take();
        self.backoff_level.store(0, Ordering::SeqCst);
        self.publish(|snapshot| *snapshot = RewardsSnapshot::idle());

        if let Some(session) = previous {
            logger::info(
                LogTag::Rewards,
                &format!("Disconnected {:#x}", session.account),
            );
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.session.read().as_ref().map(|s| s.account)
    }

    pub fn subscribe(&self) -> watch::Receiver<RewardsSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> RewardsSnapshot {
        self.state.borrow().clone()
    }

    pub fn reader_support(&self) -> &ReaderSupport {
        &self.reader_support
    }

    pub fn backoff_level(&self) -> u32 {
        self.backoff_level.load(Ordering::SeqCst)
    }

    /// Extra delay before the next scheduled fetch: zero after a success,
    /// then doubling from the base up to the cap
    pub fn backoff_delay(&self) -> Duration {
        match self.backoff_level() {
            0 => Duration::ZERO,
            level => self.settings.error_backoff.base_delay_for(level - 1),
        }
    }

    /// Drop the results of every fetch started so far
    pub fn invalidate_in_flight(&self) {
        let mut generations = self.generations.lock();
        generations.discarded_through = generations.started;
    }

    /// Run one full fetch for the connected account and return the snapshot
    /// that is current once it settled. Never fails: errors land in the
    /// snapshot.
    pub async fn fetch_rewards(&self) -> RewardsSnapshot {
        let current = self.session.read().clone();
        let session = match current {
            Some(session) => session,
            None => {
                self.publish(|snapshot| *snapshot = RewardsSnapshot::idle());
                return self.snapshot();
            }
        };

        let generation = {
            let mut generations = self.generations.lock();
            generations.started += 1;
            generations.started
        };
        logger::debug(
            LogTag::Rewards,
            &format!("Fetch #{} for {:#x}", generation, session.account),
        );

        let result = self.collect(&session).await;

        let mut generations = self.generations.lock();
        if generation <= generations.applied || generation <= generations.discarded_through {
            logger::debug(
                LogTag::Rewards,
                &format!("Dropping result of stale fetch #{}", generation),
            );
            drop(generations);
            return self.snapshot();
        }
        generations.applied = generation;

        let account = session.account;
        match result {
            Ok(outcome) => {
                let stamp = now_ms();
                if let Err(e) = self
                    .cache
                    .write(&pending_rewards_key(&account), &outcome.rewards, stamp)
                {
                    logger::warning(LogTag::Cache, &format!("Failed to cache rewards: {}", e));
                }
                self.backoff_level.store(0, Ordering::SeqCst);

                let claimable = outcome.rewards.iter().filter(|r| r.is_claimable).count();
                logger::info(
                    LogTag::Rewards,
                    &format!(
                        "{} rewards for {:#x}, {} claimable",
                        outcome.rewards.len(),
                        account,
                        claimable
                    ),
                );

                self.publish(|snapshot| {
                    snapshot.status = RewardsStatus::Ready;
                    snapshot.account = Some(account);
                    snapshot.rewards = outcome.rewards;
                    snapshot.error = None;
                    snapshot.last_updated = Some(stamp);
                    snapshot.paused = outcome.paused;
                    snapshot.from_cache = false;
                    snapshot.generation = generation;
                });
            }
            Err(e) => {
                let level = self.backoff_level().saturating_add(1);
                self.backoff_level.store(level, Ordering::SeqCst);

                let cached = self.read_cache(&account);
                logger::warning(
                    LogTag::Rewards,
                    &format!(
                        "Fetch failed for {:#x}: {} (backoff level {}, {})",
                        account,
                        e,
                        level,
                        if cached.is_some() { "showing cache" } else { "no fresh cache" }
                    ),
                );

                self.publish(|snapshot| {
                    snapshot.status = RewardsStatus::Error;
                    snapshot.account = Some(account);
                    snapshot.error = Some(e.to_string());
                    snapshot.from_cache = cached.is_some();
                    snapshot.rewards = cached.map(|entry| entry.data).unwrap_or_default();
                    snapshot.generation = generation;
                });
            }
        }
        drop(generations);

        self.snapshot()
    }

    /// Manual refresh: cached rewards are shown right away, then a fresh
    /// fetch runs. Returns the settled snapshot.
    pub async fn refresh(&self) -> RewardsSnapshot {
        let guard = RefreshGuard::enter(self);

        let cached = self.account().and_then(|account| self.read_cache(&account));
        self.publish(|snapshot| {
            if let Some(entry) = cached {
                snapshot.rewards = entry.data;
                snapshot.from_cache = true;
            }
        });

        self.fetch_rewards().await;
        drop(guard);
        self.snapshot()
    }

    async fn collect(&self, session: &Session) -> Result<FetchOutcome, RewardsError> {
        let chain = &session.chain;
        let account = session.account;

        let now = match chain.get_block_timestamp().await {
            Ok(timestamp) => timestamp,
            Err(e) => {
                logger::debug(
                    LogTag::Rewards,
                    &format!("Block timestamp unavailable, using local clock: {}", e),
                );
                now_unix_secs()
            }
        };

        let core = self
            .settings
            .core_address
            .map(|address| GraveCore::new(chain.clone(), address));
        let paused = match &core {
            Some(core) => match core.paused().await {
                Ok(paused) => Some(paused),
                Err(e) => {
                    logger::debug(LogTag::Rewards, &format!("paused() unavailable: {}", e));
                    None
                }
            },
            None => None,
        };

        let reader = GraveReader::new(
            chain.clone(),
            self.settings.reader_address,
            self.reader_support.clone(),
        );
        let mut set = RewardSet::new(account);

        let discovered = match &self.subgraph {
            Some(subgraph) => subgraph.burned_tokens(&account).await,
            None => Vec::new(),
        };
        set.insert_subgraph(&discovered);

        if !discovered.is_empty() && reader.is_available() {
            match reader.burn_infos(&set.ids()).await {
                Ok(infos) => {
                    set.apply_reader(&infos, RewardSource::Reader);
                }
                Err(ChainError::ReaderUnsupported(_)) => logger::debug(
                    LogTag::Rewards,
                    "Reader unavailable, keeping subgraph records as reported",
                ),
                Err(e) => return Err(e.into()),
            }
        }

        if reader.is_available() {
            let supplemental = !discovered.is_empty();
            if let Err(e) = self.enumerate(&reader, &mut set, supplemental).await {
                match e {
                    ChainError::ReaderUnsupported(_) => {}
                    e if supplemental => logger::warning(
                        LogTag::Rewards,
                        &format!("Supplemental enumeration failed: {}", e),
                    ),
                    e => return Err(e.into()),
                }
            }
        }

        if set.foreign_count() > 0 {
            logger::debug(
                LogTag::Rewards,
                &format!("Dropped {} tokens owned by other accounts", set.foreign_count()),
            );
        }

        if let Some(core) = &core {
            let tiers = set.wait_tiers();
            if !tiers.is_empty() {
                match core.burn_splits(&tiers).await {
                    Ok(splits) => set.apply_splits(&splits),
                    Err(e) => logger::warning(
                        LogTag::Rewards,
                        &format!("burnSplits unavailable: {}", e),
                    ),
                }
            }
        }

        let ids = set.ids();
        if !ids.is_empty() {
            let mut lp_infos = None;
            if reader.is_available() {
                match reader.lp_infos(&ids).await {
                    Ok(infos) => lp_infos = Some(infos),
                    Err(e) => logger::debug(LogTag::Rewards, &format!("getLPInfo unavailable: {}", e)),
                }
            }
            if lp_infos.is_none() && !reader.is_available() {
                if let Some(core) = &core {
                    match core.lp_infos(&ids).await {
                        Ok(infos) => lp_infos = Some(infos),
                        Err(e) => logger::debug(LogTag::Rewards, &format!("nftLP unavailable: {}", e)),
                    }
                }
            }
            if let Some(infos) = lp_infos {
                set.apply_lp(infos);
            }
        }

        Ok(FetchOutcome {
            rewards: set.into_sorted(now),
            paused,
        })
    }

    /// Walk the grave window and merge the ids not seen yet
    async fn enumerate(
        &self,
        reader: &GraveReader,
        set: &mut RewardSet,
        supplemental: bool,
    ) -> Result<(), ChainError> {
        let ids = reader
            .enumerate_ids(self.settings.page_size, self.settings.max_pages)
            .await?;
        let fresh: Vec<_> = ids.into_iter().filter(|id| !set.has_seen(id)).collect();
        if fresh.is_empty() {
            return Ok(());
        }

        let infos = reader.burn_infos(&fresh).await?;
        let kept = set.apply_reader(&infos, RewardSource::Enumeration);
        logger::debug(
            LogTag::Rewards,
            &format!(
                "{} enumeration: {} new ids, {} owned by account",
                if supplemental { "Supplemental" } else { "Primary" },
                fresh.len(),
                kept
            ),
        );
        Ok(())
    }

    fn read_cache(&self, account: &Address) -> Option<CacheEntry<Vec<BurnReward>>> {
        let mut entry = self
            .cache
            .read::<Vec<BurnReward>>(&pending_rewards_key(account), now_ms())?;
        refresh_cached(&mut entry.data, now_unix_secs());
        Some(entry)
    }

    fn publish(&self, update: impl FnOnce(&mut RewardsSnapshot)) {
        let refreshing = self.refreshing.load(Ordering::SeqCst) > 0;
        let backoff_level = self.backoff_level();
        self.state.send_modify(|snapshot| {
            update(snapshot);
            snapshot.refreshing = refreshing;
            snapshot.backoff_level = backoff_level;
        });
    }
}

/// Keeps `refreshing` set while any `refresh()` is running, including one
/// whose future was dropped
struct RefreshGuard<'a> {
    engine: &'a RewardsEngine,
}

impl<'a> RefreshGuard<'a> {
    fn enter(engine: &'a RewardsEngine) -> Self {
        engine.refreshing.fetch_add(1, Ordering::SeqCst);
        Self { engine }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.engine.refreshing.fetch_sub(1, Ordering::SeqCst);
        self.engine.publish(|_| {});
    }
}
