//! Structured logging for grave-rewards
//!
//! This module provides a small, tag-based logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via --debug-<module> flags
//! - Colored console output with wrapped continuation lines
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grave_rewards::logger::{self, LogTag};
//!
//! logger::error(LogTag::Rpc, "All providers failed");
//! logger::warning(LogTag::Registry, "Tier 0 exhausted, escalating");
//! logger::info(LogTag::Rewards, "Fetched 12 rewards");
//! logger::debug(LogTag::Reader, "viewGraveWindow page 2"); // Only if --debug-reader
//! logger::verbose(LogTag::Subgraph, "Raw response: ..."); // Only if --verbose
//! ```
//!
//! ## Initialization
//!
//! Call once at startup:
//! ```rust,ignore
//! logger::init();
//! ```

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{
    get_logger_config, init_from_args, is_debug_enabled_for_tag, set_logger_config,
    update_logger_config, LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Scans command-line arguments for --debug-<module>, --verbose and --quiet
/// and installs the resulting configuration. Safe to call more than once.
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (shown unless --quiet)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (normal operation)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Debug logs are ONLY shown when the --debug-<module> flag for the tag is
/// present, e.g. `--debug-rpc` for `LogTag::Rpc`.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (only with --verbose or --verbose-<module>)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
