/// Error types for every layer of the rewards stack
///
/// Each layer owns one enum; the engine aggregates them in `RewardsError`.
use thiserror::Error;

// =============================================================================
// HTTP / FETCH LAYER
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Rate limited (HTTP 429) by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("Server error (HTTP {status}) from {endpoint}")]
    Server { endpoint: String, status: u16 },

    #[error("HTTP {status}: {text}")]
    Http { status: u16, text: String },

    #[error("Network error: {0}")]
    Transport(String),
}

impl FetchError {
    /// 429, 5xx and transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Http { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RateLimited { .. } => Some(429),
            FetchError::Server { status, .. } | FetchError::Http { status, .. } => Some(*status),
            FetchError::Transport(_) => None,
        }
    }
}

// =============================================================================
// JSON-RPC LAYER
// =============================================================================

/// Uniform API error surfaced by the RPC client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct ApiError {
    pub message: String,
    pub code: i64,
    /// JSON-RPC `error.data` (revert payload for eth_call)
    pub data: Option<String>,
}

impl ApiError {
    pub const DEFAULT_CODE: i64 = 500;
    pub const NETWORK_CODE: i64 = 503;

    pub fn new(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Option<String>) -> Self {
        self.data = data;
        self
    }

    pub fn network(message: impl std::fmt::Display) -> Self {
        Self::new(format!("Network error: {}", message), Self::NETWORK_CODE)
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(msg) => ApiError::network(msg),
            FetchError::Http { status, text } => ApiError::new(text, i64::from(status)),
            other => {
                let code = other.status().map(i64::from).unwrap_or(Self::DEFAULT_CODE);
                ApiError::new(other.to_string(), code)
            }
        }
    }
}

// =============================================================================
// CHAIN / CONTRACT LAYER
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Execution reverted: {0}")]
    Revert(String),

    #[error("Call returned no data")]
    NoData,

    #[error("Reader contract unsupported on chain {0}")]
    ReaderUnsupported(u64),

    #[error("Batched call failed")]
    CallFailed,
}

impl ChainError {
    /// Bad selector or a revert carrying data: the reader is not deployed
    /// (or not this version) on the chain.
    pub fn indicates_unsupported_reader(&self) -> bool {
        if self.indicates_missing_function() {
            return true;
        }

        match self {
            ChainError::Api(e) => {
                let message = e.message.to_lowercase();
                !message.contains("returned no data")
                    && !is_bare_revert(&message)
                    && message.contains("revert")
                    && !message.contains("reverted without")
            }
            ChainError::Revert(reason) => {
                let reason = reason.trim();
                !reason.is_empty() && reason != "0x"
            }
            _ => false,
        }
    }

    /// The node rejected the selector: the contract lacks the function
    pub fn indicates_missing_function(&self) -> bool {
        match self {
            ChainError::Api(e) => {
                let message = e.message.to_lowercase();
                message.contains("function selector")
                    || message.contains("selector was not recognized")
                    || message.contains("unrecognized selector")
            }
            ChainError::ReaderUnsupported(_) => true,
            _ => false,
        }
    }

    /// "no data" style failures terminate enumeration without flagging the reader
    pub fn is_no_data(&self) -> bool {
        match self {
            ChainError::NoData => true,
            ChainError::Api(e) => {
                let message = e.message.to_lowercase();
                message.contains("returned no data")
                    || message.contains("reverted without")
                    || is_bare_revert(&message)
            }
            ChainError::Revert(reason) => {
                let reason = reason.trim();
                reason.is_empty() || reason == "0x"
            }
            _ => false,
        }
    }
}

/// Geth answers a revert without return data with a bare "execution reverted"
fn is_bare_revert(message: &str) -> bool {
    matches!(
        message.trim().trim_end_matches(':').trim_end(),
        "execution reverted" | "reverted" | "revert"
    )
}

// =============================================================================
// SUBGRAPH / CACHE / CONFIG
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubgraphError {
    #[error("Subgraph HTTP {status} from {endpoint}")]
    Http { endpoint: String, status: u16 },

    #[error("Subgraph request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Subgraph response from {endpoint} had no data.tokens")]
    MissingData { endpoint: String },

    #[error("Invalid subgraph record: {0}")]
    InvalidRecord(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Error, Debug)]
pub enum RewardsError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid account address: {0}")]
    InvalidAccount(String),
}
