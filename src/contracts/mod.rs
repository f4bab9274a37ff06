//! Contract bindings
//!
//! ABI definitions (`abi`), decoded record types (`types`), the reader
//! contract with its per-chain support tracking (`reader`) and the core game
//! contract (`core_contract`). Every read goes through a `ChainClient`.

pub mod abi;
pub mod core_contract;
pub mod reader;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use core_contract::GraveCore;
pub use reader::{GraveReader, ReaderSupport};
pub use types::{BurnInfo, BurnSplit, LpInfo, BPS_DENOMINATOR};

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;

use crate::errors::ChainError;
use crate::rpc::ChainClient;

/// Single `eth_call` decoded into the call's return type
pub async fn read_contract<C: SolCall + Sync>(
    chain: &dyn ChainClient,
    to: Address,
    call: &C,
) -> Result<C::Return, ChainError> {
    let raw = chain.call(to, Bytes::from(call.abi_encode())).await?;
    decode_returns::<C>(raw.as_ref())
}

/// One multicall batch of the same function against one contract. The outer
/// error is a failure of the batch itself; inner errors are per call.
pub async fn batch_read<C: SolCall + Sync>(
    chain: &dyn ChainClient,
    to: Address,
    calls: &[C],
) -> Result<Vec<Result<C::Return, ChainError>>, ChainError> {
    if calls.is_empty() {
        return Ok(Vec::new());
    }

    let encoded: Vec<(Address, Bytes)> = calls
        .iter()
        .map(|call| (to, Bytes::from(call.abi_encode())))
        .collect();

    let results = chain.multicall(encoded).await?;
    Ok(results
        .into_iter()
        .map(|result| result.and_then(|raw| decode_returns::<C>(raw.as_ref())))
        .collect())
}

fn decode_returns<C: SolCall>(raw: &[u8]) -> Result<C::Return, ChainError> {
    if raw.is_empty() {
        return Err(ChainError::NoData);
    }
    C::abi_decode_returns(raw, true).map_err(|e| ChainError::Decode(format!("{}: {}", C::SIGNATURE, e)))
}
