//! Configuration for iis-site
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/iis-site/iis-site.cfg)
//! - User configuration (~/.iis-site.cfg)
//! - Project configuration (./iis-site.cfg)
//! - Environment variables
//!
//! An explicit path (`-c` or `IIS_SITE_CONFIG`) replaces the standard
//! locations. Files are TOML unless their extension says YAML or JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::logging::LogFormat;
use crate::modules::windows::win_iis_website::MODULE_NAME;

const DEFAULT_FORKS: usize = 5;
const DEFAULT_TIMEOUT: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    pub executor: ExecutorConfig,
    pub colors: ColorsConfig,
    pub logging: LoggingConfig,
}

/// Default configuration values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Default inventory path
    pub inventory: Option<PathBuf>,

    /// Hosts handled concurrently
    pub forks: usize,

    /// Default module
    pub module_name: String,

    /// Timeout in seconds for each executor call
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            inventory: None,
            forks: DEFAULT_FORKS,
            module_name: MODULE_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Site executor settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Command used for hosts that do not set `iis_site_executor`
    pub command: Option<String>,

    /// Overrides `defaults.timeout` for executor calls
    pub timeout: Option<u64>,
}

/// Colors and output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub enabled: bool,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither RUST_LOG nor -v is given
    pub level: Option<String>,

    pub format: LogFormat,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Config::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                debug!(path = %path.display(), "Loading config file");
                config = config.merge_from_file(&path)?;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for when the files cannot be read
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit_path {
            return vec![path.to_path_buf()];
        }

        let mut paths = vec![PathBuf::from("/etc/iis-site/iis-site.cfg")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".iis-site.cfg"));
        }
        paths.push(PathBuf::from("iis-site.cfg"));
        paths
    }

    /// Load from a specific file, on top of the defaults
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Config::default().merge_from_file(path.as_ref())
    }

    fn merge_from_file(&self, path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let file_config: Config = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            "json" => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            _ => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        };

        Ok(self.merge(file_config))
    }

    /// Merge another config into this one; values that differ from the
    /// defaults win.
    fn merge(&self, other: Config) -> Config {
        let defaults = Defaults::default();
        Config {
            defaults: Defaults {
                inventory: other
                    .defaults
                    .inventory
                    .or_else(|| self.defaults.inventory.clone()),
                forks: if other.defaults.forks != defaults.forks {
                    other.defaults.forks
                } else {
                    self.defaults.forks
                },
                module_name: if other.defaults.module_name != defaults.module_name {
                    other.defaults.module_name
                } else {
                    self.defaults.module_name.clone()
                },
                timeout: if other.defaults.timeout != defaults.timeout {
                    other.defaults.timeout
                } else {
                    self.defaults.timeout
                },
            },
            executor: ExecutorConfig {
                command: other
                    .executor
                    .command
                    .or_else(|| self.executor.command.clone()),
                timeout: other.executor.timeout.or(self.executor.timeout),
            },
            colors: ColorsConfig {
                enabled: self.colors.enabled && other.colors.enabled,
            },
            logging: LoggingConfig {
                level: other.logging.level.or_else(|| self.logging.level.clone()),
                format: if other.logging.format != LogFormat::default() {
                    other.logging.format
                } else {
                    self.logging.format
                },
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(inventory) = lookup("IIS_SITE_INVENTORY") {
            self.defaults.inventory = Some(PathBuf::from(inventory));
        }

        if let Some(forks) = lookup("IIS_SITE_FORKS").and_then(|v| v.parse().ok()) {
            self.defaults.forks = forks;
        }

        if let Some(timeout) = lookup("IIS_SITE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.defaults.timeout = timeout;
        }

        if let Some(command) = lookup("IIS_SITE_EXECUTOR") {
            self.executor.command = Some(command);
        }

        if let Some(format) = lookup("IIS_SITE_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.logging.format = format;
        }

        if lookup("NO_COLOR").is_some() {
            self.colors.enabled = false;
        }
    }

    /// Effective timeout for executor calls
    pub fn executor_timeout(&self) -> u64 {
        self.executor.timeout.unwrap_or(self.defaults.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.forks, 5);
        assert_eq!(config.defaults.timeout, 30);
        assert_eq!(config.defaults.module_name, "win_iis_website");
        assert!(config.colors.enabled);
        assert_eq!(config.executor_timeout(), 30);
    }

    #[test]
    fn test_config_merge() {
        let base = Config {
            executor: ExecutorConfig {
                command: Some("base-exec".into()),
                timeout: None,
            },
            ..Config::default()
        };
        let other = Config {
            defaults: Defaults {
                forks: 10,
                ..Defaults::default()
            },
            executor: ExecutorConfig {
                command: None,
                timeout: Some(90),
            },
            ..Config::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.defaults.forks, 10);
        assert_eq!(merged.executor.command.as_deref(), Some("base-exec"));
        assert_eq!(merged.executor_timeout(), 90);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".cfg").tempfile().unwrap();
        writeln!(
            file,
            r#"
[defaults]
forks = 12
inventory = "hosts.ini"

[executor]
command = "pwsh -File site.ps1 {{host}}"

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.forks, 12);
        assert_eq!(config.defaults.inventory, Some(PathBuf::from("hosts.ini")));
        assert_eq!(config.executor.command.as_deref(), Some("pwsh -File site.ps1 {host}"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "defaults:\n  timeout: 45\ncolors:\n  enabled: false").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.timeout, 45);
        assert!(!config.colors.enabled);
    }

    #[test]
    fn test_bad_file_reports_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[defaults\nforks = ").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("IIS_SITE_FORKS", "20"),
            ("IIS_SITE_TIMEOUT", "not-a-number"),
            ("IIS_SITE_EXECUTOR", "exec"),
            ("IIS_SITE_LOG_FORMAT", "json"),
            ("NO_COLOR", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.defaults.forks, 20);
        assert_eq!(config.defaults.timeout, 30);
        assert_eq!(config.executor.command.as_deref(), Some("exec"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.colors.enabled);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("IIS_SITE_FORKS", "7");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.defaults.forks, 7);
        std::env::remove_var("IIS_SITE_FORKS");
    }

    #[test]
    #[serial]
    fn test_broken_file_still_honours_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iis-site.cfg");
        std::fs::write(&path, "[defaults\nforks = ").unwrap();
        assert!(Config::load(Some(&path)).is_err());

        std::env::set_var("IIS_SITE_EXECUTOR", "pwsh -File site.ps1 {host}");
        let config = Config::from_env();
        assert_eq!(config.executor.command.as_deref(), Some("pwsh -File site.ps1 {host}"));
        std::env::remove_var("IIS_SITE_EXECUTOR");
    }
}
