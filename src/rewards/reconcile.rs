//! Merging of discovery sources into one record per token
//!
//! Subgraph records are inserted first; reader data then replaces them field
//! for field. A reader record whose owner is not the account removes the
//! token for the rest of the fetch, so later passes cannot re-add it.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, U256};

use crate::contracts::{BurnInfo, BurnSplit, LpInfo};
use crate::subgraph::SubgraphBurn;

use super::types::{BurnReward, RewardSource};

#[derive(Debug)]
pub struct RewardSet {
    account: Address,
    records: HashMap<U256, BurnReward>,
    /// Insertion order, for stable output before sorting
    order: Vec<U256>,
    foreign: HashSet<U256>,
}

impl RewardSet {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            records: HashMap::new(),
            order: Vec::new(),
            foreign: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Kept or rejected already during this fetch
    pub fn has_seen(&self, token_id: &U256) -> bool {
        self.records.contains_key(token_id) || self.foreign.contains(token_id)
    }

    pub fn ids(&self) -> Vec<U256> {
        self.order
            .iter()
            .filter(|id| self.records.contains_key(*id))
            .copied()
            .collect()
    }

    pub fn foreign_count(&self) -> usize {
        self.foreign.len()
    }

    /// Add subgraph records for ids not present yet
    pub fn insert_subgraph(&mut self, burns: &[SubgraphBurn]) -> usize {
        let mut added = 0;
        for burn in burns {
            if self.has_seen(&burn.token_id) {
                continue;
            }
            self.order.push(burn.token_id);
            self.records
                .insert(burn.token_id, BurnReward::from_subgraph(burn, self.account));
            added += 1;
        }
        added
    }

    /// Merge reader data; reader fields win. Returns how many were kept.
    pub fn apply_reader(&mut self, infos: &[BurnInfo], source: RewardSource) -> usize {
        let mut kept = 0;
        for info in infos {
            if info.owner != self.account {
                self.records.remove(&info.token_id);
                self.foreign.insert(info.token_id);
                continue;
            }

            let reward = BurnReward::from_burn_info(info, source);
            if self.records.insert(info.token_id, reward).is_none() {
                self.order.push(info.token_id);
            }
            kept += 1;
        }
        kept
    }

    /// Distinct wait tiers present in the set
    pub fn wait_tiers(&self) -> Vec<u64> {
        let mut tiers: Vec<u64> = self.records.values().map(|r| r.wait_minutes).collect();
        tiers.sort_unstable();
        tiers.dedup();
        tiers
    }

    pub fn apply_splits(&mut self, splits: &HashMap<u64, BurnSplit>) {
        for reward in self.records.values_mut() {
            if let Some(split) = splits.get(&reward.wait_minutes) {
                reward.apply_split(split);
            }
        }
    }

    pub fn apply_lp(&mut self, lp_infos: Vec<(U256, LpInfo)>) {
        for (token_id, lp_info) in lp_infos {
            if let Some(reward) = self.records.get_mut(&token_id) {
                reward.set_lp_info(Some(lp_info));
            }
        }
    }

    /// Final list: claimability computed at `now`, then display order
    pub fn into_sorted(mut self, now: u64) -> Vec<BurnReward> {
        let mut rewards: Vec<BurnReward> = self
            .order
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect();
        for reward in &mut rewards {
            reward.refresh_claimability(now);
        }
        sort_rewards(&mut rewards);
        rewards
    }
}

/// Unclaimed first; among unclaimed, claimable first; then by `claim_at`
pub fn compare_rewards(a: &BurnReward, b: &BurnReward) -> Ordering {
    a.claimed
        .cmp(&b.claimed)
        .then_with(|| b.is_claimable.cmp(&a.is_claimable))
        .then_with(|| a.claim_at.cmp(&b.claim_at))
        .then_with(|| a.token_id.cmp(&b.token_id))
}

pub fn sort_rewards(rewards: &mut [BurnReward]) {
    rewards.sort_by(compare_rewards);
}

/// Recompute claimability of cached records against a newer clock
pub fn refresh_cached(rewards: &mut [BurnReward], now: u64) {
    for reward in rewards.iter_mut() {
        reward.refresh_claimability(now);
    }
    sort_rewards(rewards);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::testing::burn;

    fn account() -> Address {
        Address::repeat_byte(0x42)
    }

    fn subgraph_burn(id: u64, total: u64, claim_at: u64) -> SubgraphBurn {
        SubgraphBurn {
            token_id: U256::from(id),
            total_amount: U256::from(total),
            wait_minutes: 60,
            claim_at,
            grave_release_at: 0,
            claimed: false,
        }
    }

    #[test]
    fn test_reader_wins_and_ids_are_unique() {
        let mut set = RewardSet::new(account());
        set.insert_subgraph(&[subgraph_burn(1, 5, 10), subgraph_burn(2, 6, 20), subgraph_burn(1, 7, 30)]);
        assert_eq!(set.len(), 2);

        let mut info = burn(1, account(), 500);
        info.claim_at = 99;
        set.apply_reader(&[info.clone(), info], RewardSource::Reader);

        let rewards = set.into_sorted(0);
        assert_eq!(rewards.len(), 2);
        let one = rewards.iter().find(|r| r.token_id == U256::from(1)).unwrap();
        assert_eq!(one.total_amount, U256::from(500));
        assert_eq!(one.claim_at, 99);
        assert_eq!(one.source, RewardSource::Reader);

        let two = rewards.iter().find(|r| r.token_id == U256::from(2)).unwrap();
        assert_eq!(two.source, RewardSource::Subgraph);
        assert_eq!(two.total_amount, U256::from(6));
    }

    #[test]
    fn test_foreign_owner_is_dropped_and_not_readded() {
        let mut set = RewardSet::new(account());
        set.insert_subgraph(&[subgraph_burn(1, 5, 10)]);
        let kept = set.apply_reader(&[burn(1, Address::repeat_byte(0x99), 5)], RewardSource::Reader);

        assert_eq!(kept, 0);
        assert!(set.is_empty());
        assert!(set.has_seen(&U256::from(1)));
        assert_eq!(set.insert_subgraph(&[subgraph_burn(1, 5, 10)]), 0);
        assert_eq!(set.foreign_count(), 1);
    }

    #[test]
    fn test_sort_order() {
        let mut set = RewardSet::new(account());
        let mut infos = Vec::new();
        for (id, claim_at, claimed) in [(1u64, 50u64, true), (2, 500, false), (3, 40, false), (4, 10, false), (5, 5, true)] {
            let mut info = burn(id, account(), 1);
            info.claim_at = claim_at;
            info.claimed = claimed;
            infos.push(info);
        }
        set.apply_reader(&infos, RewardSource::Enumeration);

        let rewards = set.into_sorted(100);
        let ids: Vec<u64> = rewards.iter().map(|r| u64::try_from(r.token_id).unwrap()).collect();
        // claimable (10, 40), then pending (500), then claimed (5, 50)
        assert_eq!(ids, vec![4, 3, 2, 5, 1]);

        for pair in rewards.windows(2) {
            assert!(!(pair[0].claimed && !pair[1].claimed));
            if !pair[0].claimed && !pair[1].claimed {
                assert!(!(!pair[0].is_claimable && pair[1].is_claimable));
            }
        }
    }

    #[test]
    fn test_splits_and_lp_are_applied() {
        let mut set = RewardSet::new(account());
        set.apply_reader(&[burn(1, account(), 10_000), burn(2, account(), 20_000)], RewardSource::Reader);
        assert_eq!(set.wait_tiers(), vec![1440]);

        let mut splits = HashMap::new();
        splits.insert(1440, BurnSplit::new(7_000, 2_000, 1_000));
        set.apply_splits(&splits);
        set.apply_lp(vec![(U256::from(2), crate::contracts::testing::lp(5))]);

        let rewards = set.into_sorted(0);
        let one = rewards.iter().find(|r| r.token_id == U256::from(1)).unwrap();
        assert_eq!(one.player_amount, U256::from(7_000));
        assert!(!one.has_lp_payout);
        let two = rewards.iter().find(|r| r.token_id == U256::from(2)).unwrap();
        assert_eq!(two.pool_amount, U256::from(4_000));
        assert!(two.has_lp_payout);
    }
}
