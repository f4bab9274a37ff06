//! JSON-RPC 2.0 client
//!
//! Frames requests as `{jsonrpc, method, params, id}` on top of the resilient
//! fetch wrapper and unwraps the response envelope into `ApiError`s. When the
//! registry has run out of keyed and public endpoints, the three methods the
//! generic fallback client understands are answered from it instead.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::logger::{self, LogTag};

use super::fallback::{is_fallback_method, GenericFallbackClient};
use super::fetch::{FetchOptions, ResilientFetcher};
use super::registry::KeyRegistry;
use super::transport::HttpRequest;
use super::types::{EndpointKind, Tier};

/// JSON-RPC "invalid params"
const INVALID_PARAMS_CODE: i64 = -32602;

#[derive(Debug, Clone, Default)]
pub struct RpcOptions {
    pub fetch: FetchOptions,
    /// Overrides the fetcher's retry budget
    pub max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

pub struct RpcClient {
    fetcher: ResilientFetcher,
    fallback: Option<Arc<dyn GenericFallbackClient>>,
}

impl RpcClient {
    pub fn new(fetcher: ResilientFetcher) -> Self {
        Self {
            fetcher,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn GenericFallbackClient>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn registry(&self) -> &Arc<KeyRegistry> {
        self.fetcher.registry()
    }

    /// Send one JSON-RPC request and return its `result`
    pub async fn rpc_request(
        &self,
        method: &str,
        params: Value,
        options: &RpcOptions,
    ) -> Result<Value, ApiError> {
        if self.registry().select_generic_fallback() {
            match &self.fallback {
                Some(fallback) if is_fallback_method(method) => {
                    logger::debug(
                        LogTag::Rpc,
                        &format!("Serving {} from the generic fallback client", method),
                    );
                    return serve_from_fallback(fallback.as_ref(), method, &params).await;
                }
                _ => {
                    logger::debug(
                        LogTag::Rpc,
                        &format!("{} cannot use the generic fallback, retrying public endpoints", method),
                    );
                    self.registry().force_tier(Tier::Public);
                }
            }
        }

        let id: u64 = rand::thread_rng().gen_range(1..=u64::from(u32::MAX));
        let request = HttpRequest::post_json(json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        }));

        let response = match options.max_retries {
            Some(max_retries) => {
                self.fetcher
                    .fetch_with_retry(EndpointKind::Rpc, "", &request, max_retries, &options.fetch)
                    .await
            }
            None => {
                self.fetcher
                    .fetch(EndpointKind::Rpc, "", &request, &options.fetch)
                    .await
            }
        }
        .map_err(ApiError::from)?;

        parse_envelope(method, &response.body)
    }

    /// `rpc_request` with the result deserialized into `T`
    pub async fn typed_request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        options: &RpcOptions,
    ) -> Result<T, ApiError> {
        let value = self.rpc_request(method, params, options).await?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::new(
                format!("Failed to decode {} result: {}", method, e),
                ApiError::DEFAULT_CODE,
            )
        })
    }
}

fn parse_envelope(method: &str, body: &str) -> Result<Value, ApiError> {
    let envelope: JsonRpcResponse = serde_json::from_str(body).map_err(|e| {
        ApiError::new(
            format!("Invalid JSON-RPC response for {}: {}", method, e),
            ApiError::DEFAULT_CODE,
        )
    })?;

    if let Some(error) = envelope.error {
        let message = error
            .message
            .unwrap_or_else(|| "Unknown JSON-RPC error".to_string());
        let data = error.data.map(|data| match data {
            Value::String(s) => s,
            other => other.to_string(),
        });
        return Err(
            ApiError::new(message, error.code.unwrap_or(ApiError::DEFAULT_CODE)).with_data(data),
        );
    }

    envelope.result.ok_or_else(|| {
        ApiError::new(
            format!("JSON-RPC response for {} has no result", method),
            ApiError::DEFAULT_CODE,
        )
    })
}

async fn serve_from_fallback(
    fallback: &dyn GenericFallbackClient,
    method: &str,
    params: &Value,
) -> Result<Value, ApiError> {
    match method {
        "eth_blockNumber" => {
            let number = fallback
                .get_block_number()
                .await
                .map_err(ApiError::network)?;
            Ok(Value::String(format!("0x{:x}", number)))
        }
        "eth_getBalance" => {
            let address = params
                .get(0)
                .and_then(Value::as_str)
                .and_then(|s| Address::from_str(s).ok())
                .ok_or_else(|| invalid_params(method))?;
            let balance = fallback
                .get_balance(address)
                .await
                .map_err(ApiError::network)?;
            Ok(Value::String(format!("0x{:x}", balance)))
        }
        "eth_call" => {
            let tx = params.get(0).ok_or_else(|| invalid_params(method))?;
            let to = tx
                .get("to")
                .and_then(Value::as_str)
                .and_then(|s| Address::from_str(s).ok())
                .ok_or_else(|| invalid_params(method))?;
            let data = match tx.get("data").or_else(|| tx.get("input")).and_then(Value::as_str) {
                Some(hex) => Bytes::from_str(hex).map_err(|_| invalid_params(method))?,
                None => Bytes::new(),
            };
            let output = fallback.call(to, data).await.map_err(ApiError::network)?;
            Ok(Value::String(output.to_string()))
        }
        other => Err(ApiError::new(
            format!("{} is not served by the generic fallback client", other),
            ApiError::DEFAULT_CODE,
        )),
    }
}

fn invalid_params(method: &str) -> ApiError {
    ApiError::new(format!("Invalid params for {}", method), INVALID_PARAMS_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::fetch::EndpointTemplates;
    use crate::rpc::registry::DEFAULT_RESET_INTERVAL;
    use crate::rpc::retry::{ExponentialBackoff, RetryPolicy};
    use crate::rpc::transport::testing::{ok, ScriptedTransport};
    use crate::rpc::types::ProviderCredential;
    use alloy::primitives::U256;
    use async_trait::async_trait;
    use std::time::Duration;

    fn client(keys: &[&str], transport: Arc<ScriptedTransport>) -> RpcClient {
        let registry = Arc::new(
            KeyRegistry::new(
                keys.iter().map(|s| s.to_string()).collect(),
                vec!["https://public.example".to_string()],
                DEFAULT_RESET_INTERVAL,
            )
            .unwrap(),
        );
        RpcClient::new(ResilientFetcher::new(
            registry,
            transport,
            EndpointTemplates {
                rpc_base: "https://alchemy.example".to_string(),
                nft_base: "https://nft.example".to_string(),
            },
            RetryPolicy {
                max_retries: 5,
                backoff: ExponentialBackoff::new(
                    Duration::from_millis(1),
                    Duration::from_millis(2),
                    Duration::ZERO,
                ),
            },
        ))
    }

    struct FixedFallback;

    #[async_trait]
    impl GenericFallbackClient for FixedFallback {
        async fn get_balance(&self, _address: Address) -> Result<U256, String> {
            Ok(U256::from(1_000u64))
        }

        async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, String> {
            Ok(data)
        }

        async fn get_block_number(&self) -> Result<u64, String> {
            Ok(42)
        }
    }

    #[tokio::test]
    async fn test_envelope_and_result() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            r#"{"jsonrpc":"2.0","id":7,"result":"0x10"}"#,
        )]));
        let rpc = client(&["k1"], transport.clone());

        let result = rpc
            .rpc_request("eth_blockNumber", json!([]), &RpcOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!("0x10"));

        let requests = transport.requests.lock();
        let body = requests[0].1.body.clone().unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "eth_blockNumber");
        assert!(body["id"].as_u64().is_some());
        assert_eq!(requests[0].0, "https://alchemy.example/v2/k1");
    }

    #[tokio::test]
    async fn test_error_envelope_preserves_code_and_data() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted","data":"0x08c379a0"}}"#,
        )]));
        let rpc = client(&["k1"], transport);

        let err = rpc
            .rpc_request("eth_call", json!([]), &RpcOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "execution reverted");
        assert_eq!(err.data.as_deref(), Some("0x08c379a0"));
    }

    #[tokio::test]
    async fn test_error_without_code_defaults_to_500() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ok(r#"{"jsonrpc":"2.0","id":1,"error":{"message":"boom"}}"#),
            ok(r#"{"jsonrpc":"2.0","id":1}"#),
        ]));
        let rpc = client(&["k1"], transport);

        let err = rpc
            .rpc_request("eth_chainId", json!([]), &RpcOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "boom");

        let missing = rpc
            .rpc_request("eth_chainId", json!([]), &RpcOptions::default())
            .await
            .unwrap_err();
        assert_eq!(missing.code, 500);
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(
            "connection refused".to_string(),
        )]));
        let rpc = client(&["k1"], transport);

        let options = RpcOptions {
            max_retries: Some(0),
            ..Default::default()
        };
        let err = rpc
            .rpc_request("eth_blockNumber", json!([]), &options)
            .await
            .unwrap_err();
        assert_eq!(err.code, 503);
        assert_eq!(err.message, "Network error: connection refused");
    }

    #[tokio::test]
    async fn test_typed_request() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#,
        )]));
        let rpc = client(&[], transport);

        let chain_id: String = rpc
            .typed_request("eth_chainId", json!([]), &RpcOptions::default())
            .await
            .unwrap();
        assert_eq!(chain_id, "0x1");
    }

    #[tokio::test]
    async fn test_generic_fallback_answers_without_http() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let rpc = client(&[], transport.clone()).with_fallback(Arc::new(FixedFallback));
        rpc.registry()
            .mark_failed(&ProviderCredential::public("https://public.example"));
        assert_eq!(rpc.registry().current_tier(), Tier::Generic);

        let block = rpc
            .rpc_request("eth_blockNumber", json!([]), &RpcOptions::default())
            .await
            .unwrap();
        assert_eq!(block, json!("0x2a"));

        let balance = rpc
            .rpc_request(
                "eth_getBalance",
                json!(["0x00000000000000000000000000000000000000aa", "latest"]),
                &RpcOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(balance, json!("0x3e8"));

        let echoed = rpc
            .rpc_request(
                "eth_call",
                json!([{"to": "0x00000000000000000000000000000000000000bb", "data": "0xdeadbeef"}, "latest"]),
                &RpcOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(echoed, json!("0xdeadbeef"));

        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_method_forces_public_tier() {
        let transport = Arc::new(ScriptedTransport::new(vec![ok(
            r#"{"jsonrpc":"2.0","id":1,"result":[]}"#,
        )]));
        let rpc = client(&[], transport.clone()).with_fallback(Arc::new(FixedFallback));
        rpc.registry()
            .mark_failed(&ProviderCredential::public("https://public.example"));

        let logs = rpc
            .rpc_request("eth_getLogs", json!([{}]), &RpcOptions::default())
            .await
            .unwrap();
        assert_eq!(logs, json!([]));
        assert_eq!(rpc.registry().current_tier(), Tier::Public);
        assert_eq!(transport.urls(), vec!["https://public.example"]);
    }
}
