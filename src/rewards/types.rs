use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::contracts::{BurnInfo, BurnSplit, LpInfo, BPS_DENOMINATOR};
use crate::subgraph::SubgraphBurn;
use crate::utils::{address_hex, u256_decimal};

/// Discovery path that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardSource {
    /// Subgraph only, no reader data
    Subgraph,
    /// Subgraph id confirmed by the reader
    Reader,
    /// Found by walking the reader's grave window
    Enumeration,
}

/// One burned token's reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnReward {
    #[serde(with = "u256_decimal")]
    pub token_id: U256,
    #[serde(with = "address_hex")]
    pub owner: Address,
    #[serde(with = "u256_decimal")]
    pub total_amount: U256,
    #[serde(with = "u256_decimal")]
    pub player_amount: U256,
    #[serde(with = "u256_decimal")]
    pub pool_amount: U256,
    #[serde(with = "u256_decimal")]
    pub burned_amount: U256,
    pub claim_at: u64,
    pub grave_release_at: u64,
    pub wait_minutes: u64,
    pub claimed: bool,
    pub is_claimable: bool,
    pub player_bps: u64,
    pub pool_bps: u64,
    pub burn_bps: u64,
    #[serde(default)]
    pub lp_info: Option<LpInfo>,
    #[serde(default)]
    pub has_lp_payout: bool,
    pub source: RewardSource,
}

impl BurnReward {
    pub fn from_subgraph(burn: &SubgraphBurn, owner: Address) -> Self {
        Self {
            token_id: burn.token_id,
            owner,
            total_amount: burn.total_amount,
            player_amount: U256::ZERO,
            pool_amount: U256::ZERO,
            burned_amount: U256::ZERO,
            claim_at: burn.claim_at,
            grave_release_at: burn.grave_release_at,
            wait_minutes: burn.wait_minutes,
            claimed: burn.claimed,
            is_claimable: false,
            player_bps: 0,
            pool_bps: 0,
            burn_bps: 0,
            lp_info: None,
            has_lp_payout: false,
            source: RewardSource::Subgraph,
        }
    }

    pub fn from_burn_info(info: &BurnInfo, source: RewardSource) -> Self {
        Self {
            token_id: info.token_id,
            owner: info.owner,
            total_amount: info.total_amount,
            player_amount: info.player_amount,
            pool_amount: info.pool_amount,
            burned_amount: info.burned_amount,
            claim_at: info.claim_at,
            grave_release_at: info.grave_release_at,
            wait_minutes: info.wait_minutes,
            claimed: info.claimed,
            is_claimable: false,
            player_bps: 0,
            pool_bps: 0,
            burn_bps: 0,
            lp_info: None,
            has_lp_payout: false,
            source,
        }
    }

    /// Record the split and fill every zero amount as `total * bps / 10000`
    pub fn apply_split(&mut self, split: &BurnSplit) {
        self.player_bps = split.player_bps;
        self.pool_bps = split.pool_bps;
        self.burn_bps = split.burn_bps;

        let total = self.total_amount;
        let share = |bps: u64| total.saturating_mul(U256::from(bps)) / U256::from(BPS_DENOMINATOR);

        if self.player_amount.is_zero() {
            self.player_amount = share(split.player_bps);
        }
        if self.pool_amount.is_zero() {
            self.pool_amount = share(split.pool_bps);
        }
        if self.burned_amount.is_zero() {
            self.burned_amount = share(split.burn_bps);
        }
    }

    pub fn set_lp_info(&mut self, lp_info: Option<LpInfo>) {
        self.has_lp_payout = lp_info.as_ref().map(LpInfo::has_payout).unwrap_or(false);
        self.lp_info = lp_info;
    }

    pub fn refresh_claimability(&mut self, now: u64) {
        self.is_claimable = !self.claimed && now >= self.claim_at;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardsStatus {
    /// No account connected
    Idle,
    /// First fetch of a session in flight
    Loading,
    Ready,
    /// Last fetch failed; `rewards` holds cached data if any was fresh
    Error,
}

/// Everything a consumer renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardsSnapshot {
    pub status: RewardsStatus,
    pub account: Option<Address>,
    pub rewards: Vec<BurnReward>,
    pub error: Option<String>,
    /// Unix milliseconds of the last successful fetch
    pub last_updated: Option<u64>,
    /// `None` when the core contract could not be read
    pub paused: Option<bool>,
    pub refreshing: bool,
    /// True while `rewards` comes from the local cache
    pub from_cache: bool,
    pub backoff_level: u32,
    /// Generation of the fetch that produced this snapshot
    pub generation: u64,
}

impl RewardsSnapshot {
    pub fn idle() -> Self {
        Self {
            status: RewardsStatus::Idle,
            account: None,
            rewards: Vec::new(),
            error: None,
            last_updated: None,
            paused: None,
            refreshing: false,
            from_cache: false,
            backoff_level: 0,
            generation: 0,
        }
    }

    pub fn claimable(&self) -> impl Iterator<Item = &BurnReward> {
        self.rewards.iter().filter(|r| r.is_claimable)
    }

    /// Sum of the player share over claimable rewards
    pub fn claimable_total(&self) -> U256 {
        self.claimable()
            .fold(U256::ZERO, |acc, r| acc.saturating_add(r.player_amount))
    }
}

impl Default for RewardsSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
