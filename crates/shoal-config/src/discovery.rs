//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/shoal/config.toml` (XDG user config)
//! 2. `./shoal.toml` (project-local)
//!
//! An explicit path (`--config`) replaces discovery entirely.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, ShoalConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "shoal.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "shoal";

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged, validated configuration.
    pub config: ShoalConfig,
    /// Files that were found and applied, lowest precedence first.
    pub loaded_from: Vec<PathBuf>,
}

/// Load configuration from an explicit file, or by discovery when `None`.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match explicit {
        Some(path) => {
            let config = load_config_file(path)?;
            config.validate()?;
            Ok(LoadedConfig {
                config,
                loaded_from: vec![path.to_path_buf()],
            })
        }
        None => load_config_with_options(None, None),
    }
}

/// Discover and merge config layers.
///
/// `config_dir` overrides the XDG user directory and `project_dir` the
/// current directory; both are mainly for tests.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = ShoalConfig::new();
    let mut loaded_from = Vec::new();

    let user_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));

    for path in user_path.into_iter().chain(Some(project_path)) {
        if !path.exists() {
            continue;
        }
        let contents = read(&path)?;
        config.merge_toml(&contents)?;
        loaded_from.push(path);
    }

    config.validate()?;
    Ok(LoadedConfig {
        config,
        loaded_from,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<ShoalConfig> {
    ShoalConfig::from_toml(&read(path)?)
}

/// `~/.config/shoal` (or the platform equivalent).
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_files_gives_defaults() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();

        let loaded = load_config_with_options(Some(project.path()), Some(user.path())).unwrap();
        assert!(loaded.loaded_from.is_empty());
        assert_eq!(loaded.config, ShoalConfig::default());
    }

    #[test]
    fn test_project_overrides_user() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(
            user.path().join(USER_CONFIG_FILE),
            "[session]\ncontext_path = \"/app\"\nidle_timeout_secs = 600\n",
        )
        .unwrap();
        std::fs::write(
            project.path().join(PROJECT_CONFIG_FILE),
            "[session]\nidle_timeout_secs = 60\n[node]\nworker_name = \"node-b\"\n",
        )
        .unwrap();

        let loaded = load_config_with_options(Some(project.path()), Some(user.path())).unwrap();
        assert_eq!(loaded.loaded_from.len(), 2);
        assert_eq!(loaded.config.session.context_path, "/app");
        assert_eq!(loaded.config.session.idle_timeout_secs, 60);
        assert_eq!(loaded.config.node.worker_name.as_deref(), Some("node-b"));
    }

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "[cache]\nname = \"shared\"\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.config.cache.name, "shared");
        assert_eq!(loaded.loaded_from, vec![path]);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_invalid_layer_is_rejected() {
        let user = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::write(
            project.path().join(PROJECT_CONFIG_FILE),
            "[session]\ngrace_period_secs = 0\n",
        )
        .unwrap();

        let result = load_config_with_options(Some(project.path()), Some(user.path()));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
