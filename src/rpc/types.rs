use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Priority class of a provider credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Premium keyed API (Alchemy-style)
    Premium = 0,
    /// Public unkeyed RPC endpoints
    Public = 1,
    /// Injected generic chain client
    Generic = 2,
}

impl Tier {
    pub fn next(self) -> Tier {
        match self {
            Tier::Premium => Tier::Public,
            Tier::Public | Tier::Generic => Tier::Generic,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Premium => write!(f, "tier0/premium"),
            Tier::Public => write!(f, "tier1/public"),
            Tier::Generic => write!(f, "tier2/generic"),
        }
    }
}

/// An API key (tier 0) or a full endpoint URL (tier 1)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderCredential {
    pub id: String,
    pub tier: Tier,
}

impl ProviderCredential {
    pub fn premium(key: impl Into<String>) -> Self {
        Self {
            id: key.into(),
            tier: Tier::Premium,
        }
    }

    pub fn public(url: impl Into<String>) -> Self {
        Self {
            id: url.into(),
            tier: Tier::Public,
        }
    }

    /// Identifier safe to print: keys are shortened, URLs lose their path
    pub fn masked(&self) -> String {
        match self.tier {
            Tier::Premium => mask_key(&self.id),
            _ => mask_url(&self.id),
        }
    }
}

impl fmt::Display for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.masked(), self.tier)
    }
}

/// URL template used to turn a credential into a request URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// `<rpc_base>/v2/<key>`
    Rpc,
    /// `<nft_base>/nft/v3/<key><path>`
    Nft,
}

/// Per-credential usage counters
#[derive(Debug, Clone, Default)]
pub struct CredentialStats {
    pub uses: u64,
    pub fails: u64,
    pub last_used_at: Option<Instant>,
}

impl CredentialStats {
    pub fn failure_rate(&self) -> f64 {
        if self.uses == 0 {
            0.0
        } else {
            self.fails as f64 / self.uses as f64
        }
    }
}

fn mask_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}...{}", head, tail)
}

fn mask_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => format!("{}://{}", parsed.scheme(), host),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_escalation() {
        assert_eq!(Tier::Premium.next(), Tier::Public);
        assert_eq!(Tier::Public.next(), Tier::Generic);
        assert_eq!(Tier::Generic.next(), Tier::Generic);
    }

    #[test]
    fn test_masking_hides_secrets() {
        let key = ProviderCredential::premium("abcd1234efgh5678");
        assert_eq!(key.masked(), "abcd...5678");

        let url = ProviderCredential::public("https://rpc.example.org/secret/token");
        assert_eq!(url.masked(), "https://rpc.example.org");
    }
}
