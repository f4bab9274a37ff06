/// Centralized argument handling for the grave-rewards binary
///
/// Arguments are captured once into a global list so the logger and the
/// binary read the same values; tests override them with `set_cmd_args`.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        // Poisoned mutex: fall back to the process arguments
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value that follows a flag (`--flag value` or `--flag=value`)
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    let prefix = format!("{}=", flag);
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(value) = arg.strip_prefix(&prefix) {
            return Some(value.to_string());
        }
    }
    None
}

/// Account address to watch (`--account 0x...`)
pub fn get_account_arg() -> Option<String> {
    get_arg_value("--account")
}

/// Alternate configuration file (`--config path/to/config.toml`)
pub fn get_config_path_arg() -> Option<String> {
    get_arg_value("--config")
}

/// Run a single fetch and exit instead of watching
pub fn is_once_enabled() -> bool {
    has_arg("--once")
}

pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

pub fn print_help() {
    println!("grave-rewards - pending burn rewards watcher");
    println!();
    println!("USAGE:");
    println!("    grave-rewards --account <ADDRESS> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --account <ADDRESS>   Account whose burned tokens are tracked");
    println!("    --config <PATH>       Configuration file (default: data/config.toml)");
    println!("    --once                Fetch once, print, and exit");
    println!("    --debug-<module>      Enable debug logs (rpc, registry, subgraph, reader, rewards, cache)");
    println!("    --debug-all           Enable debug logs for every module");
    println!("    --verbose             Enable verbose logs");
    println!("    --quiet               Only log errors");
    println!("    -h, --help            Print this help");
    println!();
    println!("While watching, press Enter to refresh immediately.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_lookup() {
        set_cmd_args(vec![
            "grave-rewards".to_string(),
            "--account".to_string(),
            "0xabc".to_string(),
            "--config=custom.toml".to_string(),
            "--once".to_string(),
        ]);

        assert_eq!(get_account_arg().as_deref(), Some("0xabc"));
        assert_eq!(get_config_path_arg().as_deref(), Some("custom.toml"));
        assert!(is_once_enabled());
        assert!(!is_help_requested());
        assert_eq!(get_arg_value("--missing"), None);
    }
}
