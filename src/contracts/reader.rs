//! Reader contract binding
//!
//! The reader is an optional read-only contract; older deployments lack it
//! or expose a different ABI. A failure that looks like an unknown selector
//! (or a revert carrying data) marks the reader unsupported for that chain id
//! until the process exits, and no further reader calls are made for it.
//! "Returned no data" and a bare revert are the normal end of an enumeration.
//! Per-token reverts only drop that token unless a whole batch of at least
//! `MIN_FLAGGING_BATCH` calls failed the same way.

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use parking_lot::RwLock;

use crate::errors::ChainError;
use crate::logger::{self, LogTag};
use crate::rpc::ChainClient;

use super::abi::IGraveReader;
use super::types::{to_u64, BurnInfo, LpInfo};
use super::{batch_read, read_contract};

/// Chain ids on which the reader contract has been found unusable
#[derive(Debug, Clone, Default)]
pub struct ReaderSupport {
    unsupported: Arc<RwLock<HashSet<u64>>>,
}

impl ReaderSupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        !self.unsupported.read().contains(&chain_id)
    }

    /// Returns true when the chain was not flagged before
    pub fn mark_unsupported(&self, chain_id: u64) -> bool {
        self.unsupported.write().insert(chain_id)
    }

    pub fn unsupported_chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.unsupported.read().iter().copied().collect();
        chains.sort_unstable();
        chains
    }
}

/// Smallest batch whose uniform failure flags the reader
pub const MIN_FLAGGING_BATCH: usize = 2;

pub struct GraveReader {
    chain: Arc<dyn ChainClient>,
    address: Option<Address>,
    support: ReaderSupport,
}

impl GraveReader {
    pub fn new(chain: Arc<dyn ChainClient>, address: Option<Address>, support: ReaderSupport) -> Self {
        Self {
            chain,
            address,
            support,
        }
    }

    /// Configured and not flagged for the current chain
    pub fn is_available(&self) -> bool {
        self.address.is_some() && self.support.is_supported(self.chain.chain_id())
    }

    fn address(&self) -> Result<Address, ChainError> {
        match self.address {
            Some(address) if self.support.is_supported(self.chain.chain_id()) => Ok(address),
            _ => Err(ChainError::ReaderUnsupported(self.chain.chain_id())),
        }
    }

    /// Flag the reader when `error` says it is not usable here
    fn note_failure(&self, error: &ChainError) -> bool {
        if !error.indicates_unsupported_reader() {
            return false;
        }

        let chain_id = self.chain.chain_id();
        if self.support.mark_unsupported(chain_id) {
            logger::warning(
                LogTag::Reader,
                &format!(
                    "Reader marked unsupported on chain {}: {}",
                    chain_id, error
                ),
            );
        }
        true
    }

    /// Walk `viewGraveWindow` pages and collect distinct token ids.
    /// Stops on an empty page, a zero cursor, "no data", or after `max_pages`.
    pub async fn enumerate_ids(&self, page_size: u64, max_pages: u32) -> Result<Vec<U256>, ChainError> {
        let address = self.address()?;
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = U256::ZERO;

        for page in 0..max_pages {
            let call = IGraveReader::viewGraveWindowCall {
                offset,
                limit: U256::from(page_size),
            };

            let window = match read_contract(self.chain.as_ref(), address, &call).await {
                Ok(window) => window,
                Err(e) if e.is_no_data() => {
                    logger::debug(
                        LogTag::Reader,
                        &format!("Grave window ended at page {} (no data)", page),
                    );
                    break;
                }
                Err(e) if page > 0 => {
                    logger::warning(
                        LogTag::Reader,
                        &format!(
                            "Grave window page {} failed, keeping {} ids: {}",
                            page,
                            ids.len(),
                            e
                        ),
                    );
                    break;
                }
                Err(e) => {
                    if self.note_failure(&e) {
                        return Err(ChainError::ReaderUnsupported(self.chain.chain_id()));
                    }
                    return Err(e);
                }
            };

            let page_len = window.ids.len();
            for id in window.ids {
                if seen.insert(id) {
                    ids.push(id);
                }
            }

            logger::verbose(
                LogTag::Reader,
                &format!(
                    "Grave window page {} at offset {}: {} ids, cursor {}",
                    page, offset, page_len, window.cursor
                ),
            );

            if page_len == 0 || window.cursor.is_zero() {
                break;
            }
            offset = window.cursor;
        }

        Ok(ids)
    }

    /// Batched `getBurnInfo`; tokens whose call failed are left out
    pub async fn burn_infos(&self, ids: &[U256]) -> Result<Vec<BurnInfo>, ChainError> {
        let calls: Vec<IGraveReader::getBurnInfoCall> = ids
            .iter()
            .map(|id| IGraveReader::getBurnInfoCall { tokenId: *id })
            .collect();
        let results = self.batch(&calls).await?;

        let mut infos = Vec::with_capacity(ids.len());
        for (token_id, result) in ids.iter().zip(results) {
            match result {
                Ok(info) => infos.push(BurnInfo {
                    token_id: *token_id,
                    owner: info.owner,
                    total_amount: info.totalAmount,
                    claim_at: to_u64(info.claimAt),
                    grave_release_at: to_u64(info.graveReleaseAt),
                    claimed: info.claimed,
                    wait_minutes: to_u64(info.waitMinutes),
                    player_amount: info.playerAmount,
                    pool_amount: info.poolAmount,
                    burned_amount: info.burnedAmount,
                }),
                Err(e) => logger::debug(
                    LogTag::Reader,
                    &format!("getBurnInfo({}) skipped: {}", token_id, e),
                ),
            }
        }
        Ok(infos)
    }

    /// Batched `getLPInfo`; tokens whose call failed are left out
    pub async fn lp_infos(&self, ids: &[U256]) -> Result<Vec<(U256, LpInfo)>, ChainError> {
        let calls: Vec<IGraveReader::getLPInfoCall> = ids
            .iter()
            .map(|id| IGraveReader::getLPInfoCall { tokenId: *id })
            .collect();
        let results = self.batch(&calls).await?;

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

    /// Batch against the reader. An unknown selector on any entry, or a batch
    /// of `MIN_FLAGGING_BATCH` or more where every call failed the
    /// "unsupported" way, flags the reader just like a failed batch does.
    async fn batch<C: SolCall + Sync>(
        &self,
        calls: &[C],
    ) -> Result<Vec<Result<C::Return, ChainError>>, ChainError> {
        let address = self.address()?;
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let results = match batch_read(self.chain.as_ref(), address, calls).await {
            Ok(results) => results,
            Err(e) => {
                if self.note_failure(&e) {
                    return Err(ChainError::ReaderUnsupported(self.chain.chain_id()));
                }
                return Err(e);
            }
        };

        let missing = results.iter().find_map(|r| match r {
            Err(e) if e.indicates_missing_function() => Some(e),
            _ => None,
        });
        let uniform = results.len() >= MIN_FLAGGING_BATCH
            && results
                .iter()
                .all(|r| matches!(r, Err(e) if e.indicates_unsupported_reader()));

        let flagging = match (missing, uniform) {
            (Some(error), _) => Some(error),
            (None, true) => results.first().and_then(|r| r.as_ref().err()),
            (None, false) => None,
        };
        if let Some(error) = flagging {
            self.note_failure(error);
            return Err(ChainError::ReaderUnsupported(self.chain.chain_id()));
        }

        Ok(results)
    }
}
