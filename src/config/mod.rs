use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

pub const DEFAULT_CONFIG_FILE: &str = ".fileagent.toml";

/// Top-level configuration from `.fileagent.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data directory; relative paths below resolve against it.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_rules_file")]
    pub rules_file: PathBuf,
    /// Defaults to `<directory>/backup`.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    /// History is disabled when unset.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_rules_file() -> PathBuf {
    PathBuf::from("local.rules")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            rules_file: default_rules_file(),
            backup_dir: None,
            history_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Fully resolved file locations handed to the store and history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub rules_file: PathBuf,
    pub backup_dir: PathBuf,
    pub history_file: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolve(&self) -> Result<StorePaths> {
        if self.rules_file.as_os_str().is_empty() {
            return Err(AgentError::Config("store.rules_file must not be empty".into()));
        }
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                self.directory.join(p)
            }
        };
        Ok(StorePaths {
            rules_file: join(&self.rules_file),
            backup_dir: self
                .backup_dir
                .as_deref()
                .map(join)
                .unwrap_or_else(|| self.directory.join("backup")),
            history_file: self.history_file.as_deref().map(join),
        })
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# FileAgent configuration

[store]
# Data directory. Relative paths below are resolved against it.
directory = "."

# Rule file to append to. Must already exist.
rules_file = "local.rules"

# Where timestamped backups go before every append (default: <directory>/backup).
# backup_dir = "backup"

# Record accepted submissions for the notifications view.
# history_file = "history.json"

[logging]
# Overridden by RUST_LOG when set.
level = "info"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_config_parses() {
        let config: Config = toml::from_str(Config::starter_toml()).unwrap();
        assert_eq!(config.store.rules_file, PathBuf::from("local.rules"));
        assert_eq!(config.logging.level, "info");
        assert!(config.store.history_file.is_none());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.store.directory, PathBuf::from("."));
    }

    #[test]
    fn resolves_relative_to_directory() {
        let store = StoreConfig {
            directory: PathBuf::from("/srv/snort/custom"),
            rules_file: PathBuf::from("local.rules"),
            backup_dir: None,
            history_file: Some(PathBuf::from("history.json")),
        };
        let paths = store.resolve().unwrap();
        assert_eq!(paths.rules_file, PathBuf::from("/srv/snort/custom/local.rules"));
        assert_eq!(paths.backup_dir, PathBuf::from("/srv/snort/custom/backup"));
        assert_eq!(
            paths.history_file,
            Some(PathBuf::from("/srv/snort/custom/history.json"))
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let store = StoreConfig {
            backup_dir: Some(PathBuf::from("/var/backups/rules")),
            ..Default::default()
        };
        let paths = store.resolve().unwrap();
        assert_eq!(paths.backup_dir, PathBuf::from("/var/backups/rules"));
        assert_eq!(paths.rules_file, PathBuf::from("./local.rules"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = toml::from_str("[store]\nrules_file = \"mock.local.rules\"\n").unwrap();
        assert_eq!(config.store.rules_file, PathBuf::from("mock.local.rules"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn empty_rules_file_is_config_error() {
        let store = StoreConfig {
            rules_file: PathBuf::new(),
            ..Default::default()
        };
        assert!(matches!(store.resolve(), Err(AgentError::Config(_))));
    }
}
