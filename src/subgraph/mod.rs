//! Subgraph discovery client
//!
//! Queries a prioritized list of GraphQL endpoints for an account's burned
//! tokens. The first endpoint that answers with `data.tokens` is pinned and
//! tried first afterwards. Total failure is not an error for the caller: it
//! gets an empty list and the engine falls back to on-chain enumeration.
//!
//! Results are paged by entity id (`id_gt` on the last id of the previous
//! page) so accounts with more tokens than one page are read in full.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SubgraphConfig;
use crate::errors::SubgraphError;
use crate::logger::{self, LogTag};
use crate::rpc::{HttpRequest, HttpTransport};

pub const DEFAULT_PAGE_SIZE: usize = 1_000;
pub const DEFAULT_MAX_PAGES: usize = 10;

const BURNED_TOKENS_QUERY: &str = r#"query BurnedTokens($owner: String!, $lastId: String!, $first: Int!) {
  tokens(
    where: { owner: $owner, isBurned: true, id_gt: $lastId }
    orderBy: id
    orderDirection: asc
    first: $first
  ) {
    id
    burnEvent {
      totalAmount
      waitMinutes
      claimAvailableAt
      graveyardReleaseAt
    }
  }
}"#;

/// One burned token as the subgraph reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphBurn {
    pub token_id: U256,
    pub total_amount: U256,
    pub wait_minutes: u64,
    pub claim_at: u64,
    pub grave_release_at: u64,
    pub claimed: bool,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    #[serde(default)]
    data: Option<TokensData>,
}

#[derive(Debug, Deserialize)]
struct TokensData {
    #[serde(default)]
    tokens: Option<Vec<RawToken>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToken {
    id: String,
    #[serde(default)]
    burn_event: Option<RawBurnEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBurnEvent {
    #[serde(default)]
    total_amount: Option<Value>,
    #[serde(default)]
    wait_minutes: Option<Value>,
    #[serde(default)]
    claim_available_at: Option<Value>,
    #[serde(default)]
    graveyard_release_at: Option<Value>,
    #[serde(default)]
    claimed: Option<bool>,
}

pub struct SubgraphClient {
    endpoints: Vec<String>,
    transport: Arc<dyn HttpTransport>,
    pinned: Mutex<Option<usize>>,
    page_size: usize,
    max_pages: usize,
}

impl SubgraphClient {
    pub fn new(endpoints: Vec<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoints: endpoints
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            transport,
            pinned: Mutex::new(None),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn from_config(config: &SubgraphConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(config.endpoints.clone(), transport).with_paging(config.page_size, config.max_pages)
    }

    pub fn with_paging(mut self, page_size: usize, max_pages: usize) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub fn pinned_endpoint(&self) -> Option<&str> {
        let pinned = *self.pinned.lock();
        pinned.and_then(|i| self.endpoints.get(i)).map(String::as_str)
    }

    /// Burned tokens owned by `owner`; empty when every endpoint failed
    pub async fn burned_tokens(&self, owner: &Address) -> Vec<SubgraphBurn> {
        if !self.is_configured() {
            return Vec::new();
        }

        let owner_hex = format!("{:#x}", owner);
        for index in self.endpoint_order() {
            let endpoint = &self.endpoints[index];
            match self.query_all_pages(endpoint, &owner_hex).await {
                Ok(burns) => {
                    let mut pinned = self.pinned.lock();
                    if *pinned != Some(index) {
                        logger::debug(LogTag::Subgraph, &format!("Pinned {}", endpoint));
                        *pinned = Some(index);
                    }
                    drop(pinned);

                    logger::debug(
                        LogTag::Subgraph,
                        &format!("{} burned tokens for {:#x}", burns.len(), owner),
                    );
                    return burns;
                }
                Err(e) => logger::warning(LogTag::Subgraph, &e.to_string()),
            }
        }

        logger::warning(
            LogTag::Subgraph,
            &format!("All {} subgraph endpoints failed", self.endpoints.len()),
        );
        Vec::new()
    }

    /// Pinned endpoint first, then the rest in priority order
    fn endpoint_order(&self) -> Vec<usize> {
        let pinned = *self.pinned.lock();
        let mut order: Vec<usize> = pinned.into_iter().collect();
        order.extend((0..self.endpoints.len()).filter(|i| Some(*i) != pinned));
        order
    }

    /// Every page from one endpoint; any failed page fails the endpoint
    async fn query_all_pages(&self, endpoint: &str, owner: &str) -> Result<Vec<SubgraphBurn>, SubgraphError> {
        let mut burns = Vec::new();
        let mut last_id = String::new();

        for page in 0..self.max_pages {
            let request = HttpRequest::post_json(json!({
                "query": BURNED_TOKENS_QUERY,
                "variables": { "owner": owner, "lastId": last_id, "first": self.page_size },
            }));
            let tokens = self.query_page(endpoint, &request).await?;
            let full = tokens.len() >= self.page_size;
            if let Some(last) = tokens.last() {
                last_id = last.id.clone();
            }

            burns.extend(tokens.into_iter().filter_map(|token| match parse_token(token) {
                Ok(burn) => Some(burn),
                Err(e) => {
                    logger::debug(LogTag::Subgraph, &e.to_string());
                    None
                }
            }));

            if !full {
                return Ok(burns);
            }
            if page + 1 == self.max_pages {
                logger::warning(
                    LogTag::Subgraph,
                    &format!(
                        "{} filled all {} pages; results may be truncated at {}",
                        endpoint,
                        self.max_pages,
                        burns.len()
                    ),
                );
            }
        }

        Ok(burns)
    }

    async fn query_page(&self, endpoint: &str, request: &HttpRequest) -> Result<Vec<RawToken>, SubgraphError> {
        let response = self
            .transport
            .send(endpoint, request)
            .await
            .map_err(|message| SubgraphError::Transport {
                endpoint: endpoint.to_string(),
                message,
            })?;

        if !response.is_success() {
            return Err(SubgraphError::Http {
                endpoint: endpoint.to_string(),
                status: response.status,
            });
        }

        response
            .json::<GraphResponse>()
            .ok()
            .and_then(|r| r.data)
            .and_then(|d| d.tokens)
            .ok_or_else(|| SubgraphError::MissingData {
                endpoint: endpoint.to_string(),
            })
    }
}

fn parse_token(token: RawToken) -> Result<SubgraphBurn, SubgraphError> {
    let token_id = parse_token_id(&token.id)
        .ok_or_else(|| SubgraphError::InvalidRecord(format!("token id '{}'", token.id)))?;
    let event = token.burn_event.unwrap_or_default();

    Ok(SubgraphBurn {
        token_id,
        total_amount: event.total_amount.as_ref().and_then(value_to_u256).unwrap_or_default(),
        wait_minutes: event.wait_minutes.as_ref().and_then(value_to_u64).unwrap_or(0),
        claim_at: event.claim_available_at.as_ref().and_then(value_to_u64).unwrap_or(0),
        grave_release_at: event
            .graveyard_release_at
            .as_ref()
            .and_then(value_to_u64)
            .unwrap_or(0),
        claimed: event.claimed.unwrap_or(false),
    })
}

/// Entity ids are either the token id or `<contract>-<tokenId>`
fn parse_token_id(id: &str) -> Option<U256> {
    let raw = id.rsplit('-').next()?.trim();
    U256::from_str(raw).ok()
}

/// BigInt fields arrive as strings; tolerate plain numbers too
fn value_to_u256(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => U256::from_str(s.trim()).ok(),
        Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}

fn value_to_u64(value: &Value) -> Option<u64> {
    value_to_u256(value).map(|v| u64::try_from(v).unwrap_or(u64::MAX))
}
