//! Configuration system
//!
//! - `config_struct!` declares sections with embedded defaults
//! - `schemas` holds the section definitions
//! - `utils` loads the TOML file and exposes the global accessors

#[macro_use]
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{
    get_config_clone, load_config, load_config_from_path, reload_config, reload_config_from_path,
    with_config, CONFIG_FILE_PATH,
};
