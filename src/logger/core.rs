/// Level/tag filtering in front of the console formatter
use super::config::{get_logger_config, LoggerConfig};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Decide whether a message is shown under `config`
///
/// - errors always pass
/// - DEBUG needs `--debug-<tag>` (or `--debug-all`)
/// - VERBOSE needs `--verbose` or `--verbose-<tag>`
/// - other levels pass the `min_level` threshold and the optional tag allowlist
pub(crate) fn passes_filter(config: &LoggerConfig, tag: &LogTag, level: LogLevel) -> bool {
    let key = tag.to_debug_key();

    match level {
        LogLevel::Error => true,
        LogLevel::Debug => {
            level <= config.min_level && (config.debug_all || config.debug_tags.contains(&key))
        }
        LogLevel::Verbose => {
            config.min_level == LogLevel::Verbose || config.verbose_tags.contains(&key)
        }
        LogLevel::Warning | LogLevel::Info => {
            level <= config.min_level
                && (config.enabled_tags.is_empty() || config.enabled_tags.contains(&key))
        }
    }
}

pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    passes_filter(&get_logger_config(), tag, level)
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    let config = get_logger_config();
    if !config.console || !passes_filter(&config, &tag, level) {
        return;
    }
    super::format::format_and_log(&tag, level, message);
}
