//! Configuration for rehydra.
//!
//! TOML-based, layered:
//! - `~/.config/rehydra/rehydra.toml` (user config, or `REHYDRA_CONFIG_DIR`)
//! - `./rehydra.toml` (project-local, overrides the user config)
//! - CLI flags and environment variables (handled by the binary)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_FILE, ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
