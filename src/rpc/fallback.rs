//! Tier-2 generic chain client
//!
//! When both the keyed and the public pools are exhausted the RPC client
//! answers the few methods it can from an injected client (typically a
//! wallet connector's own transport).

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

/// JSON-RPC methods the fallback client can serve
pub const FALLBACK_METHODS: [&str; 3] = ["eth_getBalance", "eth_call", "eth_blockNumber"];

pub fn is_fallback_method(method: &str) -> bool {
    FALLBACK_METHODS.contains(&method)
}

#[async_trait]
pub trait GenericFallbackClient: Send + Sync {
    async fn get_balance(&self, address: Address) -> Result<U256, String>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, String>;

    async fn get_block_number(&self) -> Result<u64, String>;
}
