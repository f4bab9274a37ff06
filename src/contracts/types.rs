use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::utils::{address_hex, u256_decimal};

/// Basis-point denominator of fee splits
pub const BPS_DENOMINATOR: u64 = 10_000;

/// `getBurnInfo` for one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnInfo {
    pub token_id: U256,
    pub owner: Address,
    pub total_amount: U256,
    pub claim_at: u64,
    pub grave_release_at: u64,
    pub claimed: bool,
    pub wait_minutes: u64,
    pub player_amount: U256,
    pub pool_amount: U256,
    pub burned_amount: U256,
}

/// Fee split for a wait tier (`burnSplits`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BurnSplit {
    pub player_bps: u64,
    pub pool_bps: u64,
    pub burn_bps: u64,
}

impl BurnSplit {
    pub fn new(player_bps: u64, pool_bps: u64, burn_bps: u64) -> Self {
        Self {
            player_bps,
            pool_bps,
            burn_bps,
        }
    }

    /// Sum of the three shares; a well-formed split totals `BPS_DENOMINATOR`
    pub fn total_bps(&self) -> u64 {
        self.player_bps
            .saturating_add(self.pool_bps)
            .saturating_add(self.burn_bps)
    }
}

/// LP position attached to a burned token (`getLPInfo` / `nftLP`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpInfo {
    #[serde(with = "address_hex")]
    pub helper: Address,
    #[serde(with = "address_hex")]
    pub pair: Address,
    #[serde(with = "u256_decimal")]
    pub lp_amount: U256,
    #[serde(with = "u256_decimal")]
    pub octa_deposited: U256,
    #[serde(with = "u256_decimal")]
    pub pair_deposited: U256,
}

impl LpInfo {
    pub fn has_payout(&self) -> bool {
        !self.lp_amount.is_zero()
    }
}

/// Saturating conversion for timestamps and minute counts
pub(crate) fn to_u64(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
