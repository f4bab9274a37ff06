//! In-memory chain answering reader, core and block queries for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::{ApiError, ChainError};
use crate::rpc::ChainClient;

use super::abi::{IGraveCore, IGraveReader};
use super::types::{BurnInfo, BurnSplit, LpInfo};

/// ABI-encode a return tuple
macro_rules! encode {
    ($value:expr) => {
        Bytes::from(SolValue::abi_encode_params(&$value))
    };
}

pub struct FakeChain {
    pub chain_id: u64,
    pub reader: Address,
    pub core: Address,
    pub timestamp: Option<u64>,
    pub paused: Option<bool>,
    pub burns: Mutex<HashMap<U256, BurnInfo>>,
    /// viewGraveWindow answers keyed by offset: (ids, cursor)
    pub pages: HashMap<U256, (Vec<U256>, U256)>,
    pub window_no_data: bool,
    /// viewGraveWindow failures keyed by offset
    pub window_errors: HashMap<U256, ChainError>,
    /// getBurnInfo failures keyed by token id
    pub burn_errors: HashMap<U256, ChainError>,
    /// Every reader call reverts with this payload
    pub reader_revert: Option<String>,
    pub splits: HashMap<u64, BurnSplit>,
    pub reader_lp: HashMap<U256, LpInfo>,
    pub core_lp: HashMap<U256, LpInfo>,
    /// Every call fails with a network error
    pub offline: AtomicBool,
    pub call_delay_ms: AtomicU64,
    pub calls: AtomicUsize,
    pub reader_calls: AtomicUsize,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            chain_id: 1,
            reader: Address::repeat_byte(0xaa),
            core: Address::repeat_byte(0xcc),
            timestamp: Some(1_700_000_000),
            paused: Some(false),
            burns: Mutex::new(HashMap::new()),
            pages: HashMap::new(),
            window_no_data: false,
            window_errors: HashMap::new(),
            burn_errors: HashMap::new(),
            reader_revert: None,
            splits: HashMap::new(),
            reader_lp: HashMap::new(),
            core_lp: HashMap::new(),
            offline: AtomicBool::new(false),
            call_delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            reader_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_burn(&self, info: BurnInfo) {
        self.burns.lock().insert(info.token_id, info);
    }

    pub fn add_page(&mut self, offset: u64, ids: &[u64], cursor: u64) {
        self.pages.insert(
            U256::from(offset),
            (ids.iter().map(|id| U256::from(*id)).collect(), U256::from(cursor)),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn reader_call(&self, data: &[u8]) -> Result<Bytes, ChainError> {
        self.reader_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(revert) = &self.reader_revert {
            return Err(ChainError::Revert(revert.clone()));
        }

        let selector = selector(data)?;
        if selector == IGraveReader::viewGraveWindowCall::SELECTOR {
            if self.window_no_data {
                return Err(ChainError::NoData);
            }
            let call = IGraveReader::viewGraveWindowCall::abi_decode(data, true).map_err(decode_err)?;
            if let Some(error) = self.window_errors.get(&call.offset) {
                return Err(error.clone());
            }
            let (ids, cursor) = self.pages.get(&call.offset).cloned().unwrap_or_default();
            return Ok(encode!((ids, U256::ZERO, cursor)));
        }
        if selector == IGraveReader::getBurnInfoCall::SELECTOR {
            let call = IGraveReader::getBurnInfoCall::abi_decode(data, true).map_err(decode_err)?;
            if let Some(error) = self.burn_errors.get(&call.tokenId) {
                return Err(error.clone());
            }
            let burns = self.burns.lock();
            let info = burns.get(&call.tokenId).ok_or(ChainError::NoData)?;
            return Ok(encode!((
                info.owner,
                info.total_amount,
                U256::from(info.claim_at),
                U256::from(info.grave_release_at),
                info.claimed,
                U256::from(info.wait_minutes),
                info.player_amount,
                info.pool_amount,
                info.burned_amount,
            )));
        }
        if selector == IGraveReader::getLPInfoCall::SELECTOR {
            let call = IGraveReader::getLPInfoCall::abi_decode(data, true).map_err(decode_err)?;
            return lp_response(self.reader_lp.get(&call.tokenId));
        }
        Err(ChainError::Revert("0x".to_string()))
    }

    fn core_call(&self, data: &[u8]) -> Result<Bytes, ChainError> {
        let selector = selector(data)?;
        if selector == IGraveCore::pausedCall::SELECTOR {
            return match self.paused {
                Some(paused) => Ok(encode!((paused,))),
                None => Err(ChainError::Api(ApiError::new("execution reverted", 3))),
            };
        }
        if selector == IGraveCore::burnSplitsCall::SELECTOR {
            let call = IGraveCore::burnSplitsCall::abi_decode(data, true).map_err(decode_err)?;
            let minutes = u64::try_from(call.waitMinutes).unwrap_or(u64::MAX);
            let split = self.splits.get(&minutes).ok_or(ChainError::NoData)?;
            return Ok(encode!((
                U256::from(split.player_bps),
                U256::from(split.pool_bps),
                U256::from(split.burn_bps),
            )));
        }
        if selector == IGraveCore::nftLPCall::SELECTOR {
            let call = IGraveCore::nftLPCall::abi_decode(data, true).map_err(decode_err)?;
            return lp_response(self.core_lp.get(&call.tokenId));
        }
        Err(ChainError::Revert("0x".to_string()))
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, ChainError> {
        Ok(U256::ZERO)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.call_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChainError::Api(ApiError::network("offline")));
        }

        if to == self.reader {
            self.reader_call(data.as_ref())
        } else if to == self.core {
            self.core_call(data.as_ref())
        } else {
            Err(ChainError::NoData)
        }
    }

    async fn get_block_number(&self) -> Result<u64, ChainError> {
        Ok(1)
    }

    async fn get_block_timestamp(&self) -> Result<u64, ChainError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChainError::Api(ApiError::network("offline")));
        }
        self.timestamp
            .ok_or_else(|| ChainError::Api(ApiError::new("block not found", -32000)))
    }
}

pub fn burn(token_id: u64, owner: Address, total: u64) -> BurnInfo {
    BurnInfo {
        token_id: U256::from(token_id),
        owner,
        total_amount: U256::from(total),
        claim_at: 0,
        grave_release_at: 0,
        claimed: false,
        wait_minutes: 1440,
        player_amount: U256::ZERO,
        pool_amount: U256::ZERO,
        burned_amount: U256::ZERO,
    }
}

pub fn lp(amount: u64) -> LpInfo {
    LpInfo {
        helper: Address::repeat_byte(0x01),
        pair: Address::repeat_byte(0x02),
        lp_amount: U256::from(amount),
        octa_deposited: U256::from(amount * 2),
        pair_deposited: U256::from(amount * 3),
    }
}

fn lp_response(info: Option<&LpInfo>) -> Result<Bytes, ChainError> {
    let info = info.ok_or(ChainError::NoData)?;
    Ok(encode!((
        info.helper,
        info.pair,
        info.lp_amount,
        info.octa_deposited,
        info.pair_deposited,
    )))
}

fn selector(data: &[u8]) -> Result<[u8; 4], ChainError> {
    data.get(..4)
        .and_then(|s| <[u8; 4]>::try_from(s).ok())
        .ok_or(ChainError::NoData)
}

fn decode_err(e: alloy::sol_types::Error) -> ChainError {
    ChainError::Decode(e.to_string())
}
