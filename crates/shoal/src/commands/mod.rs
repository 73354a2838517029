//! CLI command handlers.

use std::path::PathBuf;

use shoal_config::ShoalConfig;

pub mod config;
pub mod key;
pub mod simulate;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Resolved configuration.
    pub config: ShoalConfig,
    /// Files the configuration was read from.
    pub loaded_from: Vec<PathBuf>,
}
