//! Resilient multi-provider request layer
//!
//! Bottom-up:
//! - `registry`: credential pool with tier escalation and periodic reset
//! - `retry`: exponential backoff and the retry loop
//! - `transport`: HTTP seam (reqwest in production)
//! - `fetch`: one logical HTTP call with rotation and backoff
//! - `client`: JSON-RPC framing and the tier-2 fallback path
//! - `chain`: `ChainClient` capability used by contracts and the engine

pub mod chain;
pub mod client;
pub mod fallback;
pub mod fetch;
pub mod registry;
pub mod retry;
pub mod transport;
pub mod types;

pub use chain::{ChainClient, RpcChainClient};
pub use client::{RpcClient, RpcOptions};
pub use fallback::GenericFallbackClient;
pub use fetch::{EndpointTemplates, FetchOptions, ResilientFetcher};
pub use registry::KeyRegistry;
pub use retry::{retry_with_backoff, ExponentialBackoff, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{CredentialStats, EndpointKind, ProviderCredential, Tier};
