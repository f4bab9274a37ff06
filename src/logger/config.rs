/// Logger configuration and command-line flag parsing
///
/// Debug output is opt-in per tag: `--debug-rpc` enables DEBUG for
/// `LogTag::Rpc`, `--debug-all` enables it for every tag.
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages above this level are dropped
    pub min_level: LogLevel,
    /// Tags with DEBUG enabled
    pub debug_tags: HashSet<String>,
    /// Tags with VERBOSE enabled
    pub verbose_tags: HashSet<String>,
    /// If non-empty, only these tags are logged (errors always pass)
    pub enabled_tags: HashSet<String>,
    /// --debug-all
    pub debug_all: bool,
    /// Print to stdout (tests turn this off)
    pub console: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            debug_all: false,
            console: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Snapshot of the active logger configuration
pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

/// Replace the logger configuration
pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Mutate the logger configuration in place
pub fn update_logger_config<F: FnOnce(&mut LoggerConfig)>(f: F) {
    f(&mut LOGGER_CONFIG.write());
}

/// Build the configuration from the captured command-line arguments
pub fn init_from_args() {
    let args = crate::arguments::get_cmd_args();
    set_logger_config(config_from_args(&args));
}

pub(crate) fn config_from_args(args: &[String]) -> LoggerConfig {
    let mut config = LoggerConfig::default();

    for arg in args {
        if arg == "--verbose" {
            config.min_level = LogLevel::Verbose;
        } else if arg == "--quiet" {
            config.min_level = LogLevel::Error;
        } else if arg == "--debug-all" {
            config.debug_all = true;
        } else if let Some(key) = arg.strip_prefix("--debug-") {
            config.debug_tags.insert(key.to_lowercase());
        } else if let Some(key) = arg.strip_prefix("--verbose-") {
            config.verbose_tags.insert(key.to_lowercase());
        } else if let Some(level) = arg.strip_prefix("--log-level=") {
            match level.parse::<LogLevel>() {
                Ok(level) => config.min_level = level,
                Err(e) => eprintln!("Ignoring --log-level: {}", e),
            }
        }
    }

    config
}

/// Whether DEBUG messages for this tag should be shown
pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = LOGGER_CONFIG.read();
    config.debug_all || config.debug_tags.contains(&tag.to_debug_key())
}
