/// Configuration utilities - loading, reloading, and access helpers
///
/// The binary loads the TOML file once at startup into the global `CONFIG`;
/// library components receive their config sections by value instead of
/// reading the global.
use super::schemas::Config;
use crate::errors::ConfigError;
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::Path;

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

fn config_lock() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Load configuration from the default path
pub fn load_config() -> Result<(), ConfigError> {
    load_config_from_path(CONFIG_FILE_PATH)
}

/// Load configuration from a specific TOML file
///
/// A missing file is not an error: defaults are used and a warning is logged.
pub fn load_config_from_path(path: &str) -> Result<(), ConfigError> {
    let config = if Path::new(path).exists() {
        read_config_file(path)?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        Config::default()
    };

    config.validate()?;
    *config_lock().write() = config;
    Ok(())
}

/// Reload configuration from the default path
pub fn reload_config() -> Result<(), ConfigError> {
    reload_config_from_path(CONFIG_FILE_PATH)
}

/// Reload configuration from a file; the old config stays active on error
pub fn reload_config_from_path(path: &str) -> Result<(), ConfigError> {
    let config = read_config_file(path)?;
    config.validate()?;

    let mut current = config_lock().write();
    if *current == config {
        drop(current);
        logger::debug(LogTag::Config, &format!("Configuration in '{}' unchanged", path));
        return Ok(());
    }
    *current = config;
    drop(current);

    logger::info(LogTag::Config, &format!("Configuration reloaded from '{}'", path));
    Ok(())
}

fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    toml::from_str::<Config>(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Execute a function with read access to the configuration
///
/// # Example
/// ```ignore
/// let ttl = with_config(|cfg| cfg.rewards.cache_ttl_secs);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    f(&config_lock().read())
}

/// Clone of the entire configuration, for use across await points
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}
