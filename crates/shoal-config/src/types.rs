//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [node]
//! worker_name = "node-a"
//!
//! [session]
//! context_path = "/app"
//! virtual_host = "www"
//! idle_timeout_secs = 1800
//! grace_period_secs = 3600
//! query = "embedded"
//!
//! [cache]
//! name = "sessions"
//! max_entries = 100000
//!
//! [logging]
//! level = "info"
//! dir = "/var/log/shoal"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every section has defaults so partial files (e.g. a project-local
/// override) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoalConfig {
    pub node: NodeConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl ShoalConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Overlay the tables present in `raw` on top of this config.
    ///
    /// Works on the raw TOML table so that only sections (and keys) that
    /// were actually written in the overriding file take effect.
    pub fn merge_toml(&mut self, raw: &str) -> Result<()> {
        let overlay: toml::Table = toml::from_str(raw)?;
        let mut base = toml::Table::try_from(&*self)?;
        for (section, value) in overlay {
            match (base.get_mut(&section), value) {
                (Some(toml::Value::Table(existing)), toml::Value::Table(table)) => {
                    existing.extend(table);
                }
                (_, value) => {
                    base.insert(section, value);
                }
            }
        }
        *self = base.try_into()?;
        Ok(())
    }

    /// Check values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.session.grace_period_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session.grace_period_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::Invalid {
                field: "cache.max_entries".to_string(),
                reason: "must be greater than zero when set".to_string(),
            });
        }
        if self.node.worker_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "node.worker_name".to_string(),
                reason: "must not be blank".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of this worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name written to `last_node` on every save. Generated
    /// (`node-<uuid>`) when unset.
    pub worker_name: Option<String>,
}

/// Which query capability the store gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Plain key-value access; no context-wide scans or orphan sweeps.
    None,
    /// In-process query against the embedded cache.
    #[default]
    Embedded,
    /// Query shipped to a networked cache.
    Networked,
}

/// Deployment context and store behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub context_path: String,
    /// Defaults to `0.0.0.0` when unset.
    pub virtual_host: Option<String>,
    /// Cache-level idle timeout for mortal sessions; 0 disables it.
    pub idle_timeout_secs: u64,
    pub grace_period_secs: u64,
    /// Force passivation instead of asking the cache.
    pub passivating: Option<bool>,
    pub query: QueryMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_path: "/".to_string(),
            virtual_host: None,
            idle_timeout_secs: 0,
            grace_period_secs: 3600,
            passivating: None,
            query: QueryMode::default(),
        }
    }
}

/// Embedded cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub name: String,
    /// LRU bound; unbounded when unset.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "sessions".to_string(),
            max_entries: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console filter directive, e.g. `info` or `shoal_session=debug`.
    pub level: String,
    /// Directory for daily-rolling JSON logs; no file logging when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}
