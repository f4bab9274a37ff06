//! Core game contract binding

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};

use crate::errors::ChainError;
use crate::logger::{self, LogTag};
use crate::rpc::ChainClient;

use super::abi::IGraveCore;
use super::types::{to_u64, BurnSplit, LpInfo, BPS_DENOMINATOR};
use super::{batch_read, read_contract};

pub struct GraveCore {
    chain: Arc<dyn ChainClient>,
    address: Address,
}

impl GraveCore {
    pub fn new(chain: Arc<dyn ChainClient>, address: Address) -> Self {
        Self { chain, address }
    }

    pub async fn paused(&self) -> Result<bool, ChainError> {
        let result = read_contract(self.chain.as_ref(), self.address, &IGraveCore::pausedCall {}).await?;
        Ok(result._0)
    }

    /// `burnSplits` for each distinct wait tier; failed lookups are left out
    pub async fn burn_splits(&self, wait_minutes: &[u64]) -> Result<HashMap<u64, BurnSplit>, ChainError> {
        let mut tiers: Vec<u64> = wait_minutes.to_vec();
        tiers.sort_unstable();
        tiers.dedup();

        let calls: Vec<IGraveCore::burnSplitsCall> = tiers
            .iter()
            .map(|minutes| IGraveCore::burnSplitsCall {
                waitMinutes: U256::from(*minutes),
            })
            .collect();
        let results = batch_read(self.chain.as_ref(), self.address, &calls).await?;

        let mut splits = HashMap::with_capacity(tiers.len());
        for (minutes, result) in tiers.into_iter().zip(results) {
            match result {
                Ok(split) => {
                    let split = BurnSplit::new(
                        to_u64(split.playerBps),
                        to_u64(split.poolBps),
                        to_u64(split.burnBps),
                    );
                    if split.total_bps() != BPS_DENOMINATOR {
                        logger::warning(
                            LogTag::Reader,
                            &format!(
                                "burnSplits({}) sums to {} bps, expected {}",
                                minutes,
                                split.total_bps(),
                                BPS_DENOMINATOR
                            ),
                        );
                    }
                    splits.insert(minutes, split);
                }
                Err(e) => logger::debug(
                    LogTag::Reader,
                    &format!("burnSplits({}) skipped: {}", minutes, e),
                ),
            }
        }
        Ok(splits)
    }

    /// Batched `nftLP`, used when the reader cannot serve `getLPInfo`
    pub async fn lp_infos(&self, ids: &[U256]) -> Result<Vec<(U256, LpInfo)>, ChainError> {
        let calls: Vec<IGraveCore::nftLPCall> = ids
            .iter()
            .map(|id| IGraveCore::nftLPCall { tokenId: *id })
            .collect();
        let results = batch_read(self.chain.as_ref(), self.address, &calls).await?;

        Ok(ids
            .iter()
            .zip(results)
            .filter_map(|(token_id, result)| {
                result.ok().map(|lp| {
                    (
                        *token_id,
                        LpInfo {
                            helper: lp.helper,
                            pair: lp.pair,
                            lp_amount: lp.lpAmount,
                            octa_deposited: lp.octaDeposited,
                            pair_deposited: lp.pairDeposited,
                        },
                    )
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::testing::{lp, FakeChain};

    #[tokio::test]
    async fn test_paused_flag() {
        let mut fake = FakeChain::new();
        fake.paused = Some(true);
        let chain = Arc::new(fake);
        let core = GraveCore::new(chain.clone(), chain.core);
        assert!(core.paused().await.unwrap());

        let mut fake = FakeChain::new();
        fake.paused = None;
        let chain = Arc::new(fake);
        let core = GraveCore::new(chain.clone(), chain.core);
        assert!(core.paused().await.is_err());
    }

    #[tokio::test]
    async fn test_burn_splits_are_deduplicated() {
        let mut fake = FakeChain::new();
        fake.splits.insert(1440, BurnSplit::new(7_000, 2_000, 1_000));
        let chain = Arc::new(fake);
        let core = GraveCore::new(chain.clone(), chain.core);

        let splits = core.burn_splits(&[1440, 1440, 60]).await.unwrap();
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[&1440], BurnSplit::new(7_000, 2_000, 1_000));
        assert_eq!(splits[&1440].total_bps(), 10_000);
    }

    #[test]
    fn test_split_total_saturates() {
        assert_eq!(BurnSplit::new(u64::MAX, 1, 1).total_bps(), u64::MAX);
    }

    #[tokio::test]
    async fn test_nft_lp_fallback_reads() {
        let mut fake = FakeChain::new();
        fake.core_lp.insert(U256::from(9), lp(500));
        let chain = Arc::new(fake);
        let core = GraveCore::new(chain.clone(), chain.core);

        let infos = core.lp_infos(&[U256::from(9), U256::from(10)]).await.unwrap();
        assert_eq!(infos.len(), 1);
        assert!(infos[0].1.has_payout());
    }
}
