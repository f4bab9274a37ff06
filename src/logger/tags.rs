/// Log tags identify the subsystem a message comes from.
///
/// Each tag maps to a `--debug-<key>` command-line flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Registry,
    Rpc,
    Subgraph,
    Reader,
    Rewards,
    Cache,
    Other(String),
}

impl LogTag {
    /// Key used by --debug-<key> / --verbose-<key> flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Registry => "registry".to_string(),
            LogTag::Rpc => "rpc".to_string(),
            LogTag::Subgraph => "subgraph".to_string(),
            LogTag::Reader => "reader".to_string(),
            LogTag::Rewards => "rewards".to_string(),
            LogTag::Cache => "cache".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Uncolored label used in the console prefix
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Other(s) => s.to_uppercase(),
            other => other.to_debug_key().to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
