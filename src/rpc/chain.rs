//! Chain client capability
//!
//! `ChainClient` is what the contract bindings and the rewards engine need
//! from a chain: balances, `eth_call`, the head block and batched calls.
//! `RpcChainClient` implements it over the JSON-RPC client, batching through
//! Multicall3 `aggregate3` with `allowFailure` set on every call.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::ContractsConfig;
use crate::contracts::abi::{aggregate3Call, Multicall3Call};
use crate::errors::{ApiError, ChainError, ConfigError};
use crate::logger::{self, LogTag};

use super::client::{RpcClient, RpcOptions};

/// Default number of calls per `aggregate3`
pub const DEFAULT_MULTICALL_CHUNK: usize = 200;

/// Per-call outcome of a batched read
pub type CallResult = Result<Bytes, ChainError>;

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    async fn get_block_number(&self) -> Result<u64, ChainError>;

    /// Timestamp (unix seconds) of the latest block
    async fn get_block_timestamp(&self) -> Result<u64, ChainError>;

    /// Execute calls as a batch. One entry per call, in order; a failed call
    /// never fails the batch. The default runs the calls one by one.
    async fn multicall(&self, calls: Vec<(Address, Bytes)>) -> Result<Vec<CallResult>, ChainError> {
        let mut results = Vec::with_capacity(calls.len());
        for (to, data) in calls {
            results.push(self.call(to, data).await);
        }
        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: String,
}

pub struct RpcChainClient {
    rpc: Arc<RpcClient>,
    chain_id: u64,
    multicall_address: Address,
    chunk_size: usize,
    options: RpcOptions,
}

impl RpcChainClient {
    pub fn new(rpc: Arc<RpcClient>, chain_id: u64, multicall_address: Address) -> Self {
        Self {
            rpc,
            chain_id,
            multicall_address,
            chunk_size: DEFAULT_MULTICALL_CHUNK,
            options: RpcOptions::default(),
        }
    }

    pub fn from_config(rpc: Arc<RpcClient>, config: &ContractsConfig) -> Result<Self, ConfigError> {
        let multicall_address = Address::from_str(&config.multicall_address).map_err(|e| {
            ConfigError::Invalid(format!(
                "contracts.multicall_address '{}': {}",
                config.multicall_address, e
            ))
        })?;
        Ok(Self::new(rpc, config.chain_id, multicall_address)
            .with_chunk_size(config.multicall_chunk_size))
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn aggregate_chunk(&self, chunk: &[(Address, Bytes)]) -> Result<Vec<CallResult>, ChainError> {
        let calls: Vec<Multicall3Call> = chunk
            .iter()
            .map(|(target, data)| Multicall3Call {
                target: *target,
                allowFailure: true,
                callData: data.clone(),
            })
            .collect();

        let raw = self
            .call(self.multicall_address, aggregate3Call { calls }.abi_encode().into())
            .await?;
        let decoded = <aggregate3Call as SolCall>::abi_decode_returns(raw.as_ref(), true)
            .map_err(|e| ChainError::Decode(format!("aggregate3: {}", e)))?;

        if decoded.returnData.len() != chunk.len() {
            return Err(ChainError::Decode(format!(
                "aggregate3 returned {} results for {} calls",
                decoded.returnData.len(),
                chunk.len()
            )));
        }

        Ok(decoded
            .returnData
            .into_iter()
            .map(|result| match (result.success, result.returnData.is_empty()) {
                (true, false) => Ok(result.returnData),
                (true, true) => Err(ChainError::NoData),
                (false, _) => Err(ChainError::Revert(result.returnData.to_string())),
            })
            .collect())
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        let value: String = self
            .rpc
            .typed_request(
                "eth_getBalance",
                json!([format!("{:#x}", address), "latest"]),
                &self.options,
            )
            .await?;
        parse_quantity_u256(&value)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let result = self
            .rpc
            .rpc_request(
                "eth_call",
                json!([{ "to": format!("{:#x}", to), "data": data.to_string() }, "latest"]),
                &self.options,
            )
            .await
            .map_err(classify_call_error)?;

        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_call result is not a string".to_string()))?;
        let bytes = Bytes::from_str(hex).map_err(|e| ChainError::Decode(format!("eth_call result: {}", e)))?;
        if bytes.is_empty() {
            return Err(ChainError::NoData);
        }
        Ok(bytes)
    }

    async fn get_block_number(&self) -> Result<u64, ChainError> {
        let value: String = self
            .rpc
            .typed_request("eth_blockNumber", json!([]), &self.options)
            .await?;
        parse_quantity_u64(&value)
    }

    async fn get_block_timestamp(&self) -> Result<u64, ChainError> {
        let header: BlockHeader = self
            .rpc
            .typed_request("eth_getBlockByNumber", json!(["latest", false]), &self.options)
            .await?;
        parse_quantity_u64(&header.timestamp)
    }

    async fn multicall(&self, calls: Vec<(Address, Bytes)>) -> Result<Vec<CallResult>, ChainError> {
        let mut results = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(self.chunk_size) {
            logger::debug(
                LogTag::Rpc,
                &format!("aggregate3 with {} calls", chunk.len()),
            );
            results.extend(self.aggregate_chunk(chunk).await?);
        }
        Ok(results)
    }
}

/// eth_call reverts come back as JSON-RPC errors; keep their payload
fn classify_call_error(error: ApiError) -> ChainError {
    if let Some(data) = error.data.as_ref().filter(|d| d.starts_with("0x")) {
        return ChainError::Revert(data.clone());
    }
    ChainError::Api(error)
}

pub fn parse_quantity_u64(value: &str) -> Result<u64, ChainError> {
    let digits = value.trim_start_matches("0x");
    u64::from_str_radix(if digits.is_empty() { "0" } else { digits }, 16)
        .map_err(|e| ChainError::Decode(format!("quantity '{}': {}", value, e)))
}

pub fn parse_quantity_u256(value: &str) -> Result<U256, ChainError> {
    let digits = value.trim_start_matches("0x");
    U256::from_str_radix(if digits.is_empty() { "0" } else { digits }, 16)
        .map_err(|e| ChainError::Decode(format!("quantity '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::abi::Multicall3Result;
    use crate::rpc::fetch::{EndpointTemplates, ResilientFetcher};
    use crate::rpc::registry::{KeyRegistry, DEFAULT_RESET_INTERVAL};
    use crate::rpc::retry::{ExponentialBackoff, RetryPolicy};
    use crate::rpc::transport::testing::{ok, ScriptedTransport};
    use alloy::sol_types::SolValue;
    use std::time::Duration;

    fn chain(transport: Arc<ScriptedTransport>, chunk_size: usize) -> RpcChainClient {
        let registry = Arc::new(
            KeyRegistry::new(
                vec!["k1".to_string()],
                vec!["https://public.example".to_string()],
                DEFAULT_RESET_INTERVAL,
            )
            .unwrap(),
        );
        let rpc = RpcClient::new(ResilientFetcher::new(
            registry,
            transport,
            EndpointTemplates {
                rpc_base: "https://alchemy.example".to_string(),
                nft_base: "https://nft.example".to_string(),
            },
            RetryPolicy {
                max_retries: 1,
                backoff: ExponentialBackoff::new(
                    Duration::from_millis(1),
                    Duration::from_millis(1),
                    Duration::ZERO,
                ),
            },
        ));
        RpcChainClient::new(
            Arc::new(rpc),
            1,
            Address::from_str(crate::config::MULTICALL3_ADDRESS).unwrap(),
        )
        .with_chunk_size(chunk_size)
    }

    fn rpc_result(hex: &str) -> String {
        format!(r#"{{"jsonrpc":"2.0","id":1,"result":"{}"}}"#, hex)
    }

    fn aggregate_response(results: Vec<Multicall3Result>) -> String {
        let encoded = Bytes::from((results,).abi_encode_params());
        rpc_result(&encoded.to_string())
    }

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_quantity_u64("0x2a").unwrap(), 42);
        assert_eq!(parse_quantity_u64("0x").unwrap(), 0);
        assert_eq!(
            parse_quantity_u256("0xde0b6b3a7640000").unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert!(parse_quantity_u64("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_block_timestamp() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            r#"{"jsonrpc":"2.0","id":1,"result":{"number":"0x10","timestamp":"0x6553f100"}}"#,
        )]));
        let client = chain(transport, 200);
        assert_eq!(client.get_block_timestamp().await.unwrap(), 0x6553f100);
    }

    #[tokio::test]
    async fn test_empty_call_result_is_no_data() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(&rpc_result("0x"))]));
        let client = chain(transport, 200);
        let err = client
            .call(Address::ZERO, Bytes::from(vec![1u8, 2, 3, 4]))
            .await
            .unwrap_err();
        assert_eq!(err, ChainError::NoData);
    }

    #[tokio::test]
    async fn test_revert_keeps_payload() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted","data":"0x08c379a0"}}"#,
        )]));
        let client = chain(transport, 200);
        let err = client
            .call(Address::ZERO, Bytes::from(vec![1u8, 2, 3, 4]))
            .await
            .unwrap_err();
        assert_eq!(err, ChainError::Revert("0x08c379a0".to_string()));
        assert!(err.indicates_unsupported_reader());
    }

    #[tokio::test]
    async fn test_dataless_revert_is_no_data() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
        )]));
        let client = chain(transport, 200);
        let err = client
            .call(Address::ZERO, Bytes::from(vec![1u8, 2, 3, 4]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Api(ref e) if e.code == -32000 && e.data.is_none()));
        assert!(err.is_no_data());
        assert!(!err.indicates_unsupported_reader());
    }

    #[tokio::test]
    async fn test_multicall_maps_each_result_and_chunks() {
        let first = aggregate_response(vec![
            Multicall3Result {
                success: true,
                returnData: Bytes::from(vec![0xaa; 32]),
            },
            Multicall3Result {
                success: false,
                returnData: Bytes::from(vec![0x08, 0xc3, 0x79, 0xa0]),
            },
        ]);
        let second = aggregate_response(vec![Multicall3Result {
            success: true,
            returnData: Bytes::new(),
        }]);
        let transport = Arc::new(ScriptedTransport::new(vec![ok(&first), ok(&second)]));
        let client = chain(transport.clone(), 2);

        let target = Address::repeat_byte(0x11);
        let calls = vec![
            (target, Bytes::from(vec![1u8])),
            (target, Bytes::from(vec![2u8])),
            (target, Bytes::from(vec![3u8])),
        ];
        let results = client.multicall(calls).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].clone().unwrap().to_vec(), vec![0xaa; 32]);
        assert!(matches!(results[1], Err(ChainError::Revert(_))));
        assert_eq!(results[2], Err(ChainError::NoData));
        assert_eq!(transport.requests.lock().len(), 2);
    }
}
