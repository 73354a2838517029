//! Configuration system for shoal nodes.
//!
//! Provides TOML-based configuration with:
//! - `[node]` identity of this worker in the cluster
//! - `[session]` the deployment context and store behaviour
//! - `[cache]` the embedded cache
//! - `[logging]` console and file logging
//! - Config file layering (XDG user config + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
