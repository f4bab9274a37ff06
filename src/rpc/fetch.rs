//! Resilient fetch wrapper
//!
//! Performs one logical HTTP request against the registry's selected
//! credential, rotating credentials and backing off on 429 / 5xx / transport
//! failures. Non-retryable statuses return immediately.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ProvidersConfig;
use crate::errors::FetchError;
use crate::logger::{self, LogTag};

use super::registry::KeyRegistry;
use super::retry::{retry_with_backoff, ExponentialBackoff, RetryPolicy};
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use super::types::{EndpointKind, ProviderCredential, Tier};

/// Longest response body kept in a non-retryable error
const ERROR_TEXT_LIMIT: usize = 512;

/// Per-call credential pinning
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Key tried on the first attempt
    pub preferred_key: Option<String>,
    /// Use `preferred_key` on every attempt instead of rotating
    pub lock_to_preferred: bool,
}

impl FetchOptions {
    pub fn preferred(key: impl Into<String>) -> Self {
        Self {
            preferred_key: Some(key.into()),
            lock_to_preferred: false,
        }
    }

    pub fn locked(key: impl Into<String>) -> Self {
        Self {
            preferred_key: Some(key.into()),
            lock_to_preferred: true,
        }
    }
}

/// Base URLs for keyed endpoints
#[derive(Debug, Clone)]
pub struct EndpointTemplates {
    pub rpc_base: String,
    pub nft_base: String,
}

impl EndpointTemplates {
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self {
            rpc_base: config.rpc_base_url.trim_end_matches('/').to_string(),
            nft_base: config.nft_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Full URL for a credential. Public endpoints are complete URLs already.
    pub fn build_url(&self, kind: EndpointKind, credential: &ProviderCredential, path: &str) -> String {
        match (credential.tier, kind) {
            (Tier::Premium, EndpointKind::Rpc) => {
                format!("{}/v2/{}{}", self.rpc_base, credential.id, path)
            }
            (Tier::Premium, EndpointKind::Nft) => {
                format!("{}/nft/v3/{}{}", self.nft_base, credential.id, path)
            }
            _ => format!("{}{}", credential.id, path),
        }
    }
}

struct AttemptError {
    credential: ProviderCredential,
    error: FetchError,
}

pub struct ResilientFetcher {
    registry: Arc<KeyRegistry>,
    transport: Arc<dyn HttpTransport>,
    templates: EndpointTemplates,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(
        registry: Arc<KeyRegistry>,
        transport: Arc<dyn HttpTransport>,
        templates: EndpointTemplates,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            transport,
            templates,
            policy,
        }
    }

    pub fn from_config(
        config: &ProvidersConfig,
        registry: Arc<KeyRegistry>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            backoff: ExponentialBackoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_max_ms),
                Duration::from_millis(config.backoff_jitter_ms),
            ),
        };
        Self::new(
            registry,
            transport,
            EndpointTemplates::from_config(config),
            policy,
        )
    }

    pub fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }

    /// Fetch with the configured retry budget
    pub async fn fetch(
        &self,
        kind: EndpointKind,
        path: &str,
        request: &HttpRequest,
        options: &FetchOptions,
    ) -> Result<HttpResponse, FetchError> {
        self.fetch_with_retry(kind, path, request, self.policy.max_retries, options)
            .await
    }

    /// Execute one logical request with up to `max_retries` retries
    pub async fn fetch_with_retry(
        &self,
        kind: EndpointKind,
        path: &str,
        request: &HttpRequest,
        max_retries: u32,
        options: &FetchOptions,
    ) -> Result<HttpResponse, FetchError> {
        let policy = RetryPolicy {
            max_retries,
            backoff: self.policy.backoff.clone(),
        };

        let result = retry_with_backoff(
            &policy,
            |attempt| {
                let credential = self.credential_for_attempt(attempt, options);
                let url = self.templates.build_url(kind, &credential, path);
                async move {
                    logger::debug(
                        LogTag::Rpc,
                        &format!("Attempt {} via {}", attempt + 1, credential),
                    );
                    match self.transport.send(&url, request).await {
                        Ok(response) => classify(response, &credential)
                            .map_err(|error| AttemptError { credential, error }),
                        Err(message) => Err(AttemptError {
                            credential,
                            error: FetchError::Transport(message),
                        }),
                    }
                }
            },
            |failure: &AttemptError| failure.error.is_retryable(),
            |attempt: u32, failure: &AttemptError, delay: Option<Duration>| {
                self.registry.mark_failed(&failure.credential);
                match delay {
                    Some(delay) => logger::warning(
                        LogTag::Rpc,
                        &format!(
                            "{} on attempt {} via {}, retrying in {}ms",
                            failure.error,
                            attempt + 1,
                            failure.credential.masked(),
                            delay.as_millis()
                        ),
                    ),
                    None => logger::error(
                        LogTag::Rpc,
                        &format!(
                            "Giving up after {} attempts: {}",
                            attempt + 1,
                            failure.error
                        ),
                    ),
                }
            },
        )
        .await;

        result.map_err(|failure| failure.error)
    }

    fn credential_for_attempt(&self, attempt: u32, options: &FetchOptions) -> ProviderCredential {
        if let Some(key) = &options.preferred_key {
            if attempt == 0 || options.lock_to_preferred {
                return ProviderCredential::premium(key.clone());
            }
        }
        self.registry.select_credential()
    }
}

fn classify(response: HttpResponse, credential: &ProviderCredential) -> Result<HttpResponse, FetchError> {
    match response.status {
        200..=299 => Ok(response),
        429 => Err(FetchError::RateLimited {
            endpoint: credential.masked(),
        }),
        status if status >= 500 => Err(FetchError::Server {
            endpoint: credential.masked(),
            status,
        }),
        status => {
            let mut text = response.body;
            if text.len() > ERROR_TEXT_LIMIT {
                let mut cut = ERROR_TEXT_LIMIT;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            Err(FetchError::Http { status, text })
        }
    }
}
