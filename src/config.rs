//! Configuration module for Caravan
//!
//! Configuration hierarchy:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (CARAVAN_*)
//! 3. Project config (./caravan.toml)
//! 4. Built-in defaults (lowest priority)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CaravanError, CaravanResult};
use crate::jobs::WaitPolicy;

/// Polling configuration for long-running remote operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval before the first status poll, in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Backoff ceiling, in seconds
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    /// Hard bound on one wait, in seconds
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    5
}

fn default_max_interval_secs() -> u64 {
    60
}

fn default_max_wait_secs() -> u64 {
    900
}

/// Target workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Capacity the workspace is assigned to on create, if any
    #[serde(default)]
    pub capacity_id: Option<String>,

    /// Prefix prepended to the customer name to form the workspace name
    #[serde(default = "default_workspace_prefix")]
    pub name_prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            capacity_id: None,
            name_prefix: default_workspace_prefix(),
        }
    }
}

fn default_workspace_prefix() -> String {
    "Tenant-".to_string()
}

/// Packaged solution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Directory packaged solutions are read from and exported to
    #[serde(default = "default_package_root")]
    pub root: PathBuf,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            root: default_package_root(),
        }
    }
}

fn default_package_root() -> PathBuf {
    PathBuf::from("solutions")
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub package: PackageConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> CaravanResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CaravanError::InvalidConfig {
            file: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from the project config or defaults, then apply env overrides
    pub fn load_or_default(project_root: Option<&Path>) -> Self {
        if let Some(root) = project_root {
            let project_config = root.join("caravan.toml");
            if project_config.exists() {
                if let Ok(config) = Self::load(&project_config) {
                    return config.with_env_overrides();
                }
            }
        }
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides (CARAVAN_* prefix)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("CARAVAN_POLL_INTERVAL") {
            if let Ok(secs) = value.parse() {
                self.polling.interval_secs = secs;
            }
        }

        if let Ok(value) = std::env::var("CARAVAN_MAX_WAIT") {
            if let Ok(secs) = value.parse() {
                self.polling.max_wait_secs = secs;
            }
        }

        if let Ok(value) = std::env::var("CARAVAN_CAPACITY_ID") {
            if !value.is_empty() {
                self.workspace.capacity_id = Some(value);
            }
        }

        if let Ok(value) = std::env::var("CARAVAN_PACKAGE_ROOT") {
            if !value.is_empty() {
                self.package.root = PathBuf::from(value);
            }
        }

        self
    }

    /// Wait policy derived from the polling section
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::from_secs(
            self.polling.interval_secs,
            self.polling.max_interval_secs,
            self.polling.max_wait_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.interval_secs, 5);
        assert_eq!(config.polling.max_wait_secs, 900);
        assert_eq!(config.workspace.name_prefix, "Tenant-");
        assert!(config.workspace.capacity_id.is_none());
        assert_eq!(config.package.root, PathBuf::from("solutions"));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [polling]
            max_wait_secs = 120

            [workspace]
            capacity_id = "cap-123"
            "#,
        )
        .unwrap();

        assert_eq!(config.polling.max_wait_secs, 120);
        assert_eq!(config.polling.interval_secs, 5);
        assert_eq!(config.workspace.capacity_id.as_deref(), Some("cap-123"));
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caravan.toml");
        fs::write(&path, "polling = \"not a table\"").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, CaravanError::InvalidConfig { .. }));
    }

    #[test]
    fn test_env_override_poll_interval() {
        // SAFETY: Single-threaded test, no concurrent access to env vars
        unsafe { std::env::set_var("CARAVAN_POLL_INTERVAL", "2") };
        let config = Config::default().with_env_overrides();
        assert_eq!(config.polling.interval_secs, 2);
        unsafe { std::env::remove_var("CARAVAN_POLL_INTERVAL") };
    }

    #[test]
    fn test_wait_policy_reflects_polling_section() {
        let mut config = Config::default();
        config.polling.interval_secs = 3;
        config.polling.max_wait_secs = 30;

        let policy = config.wait_policy();
        assert_eq!(policy.initial_interval.as_secs(), 3);
        assert_eq!(policy.max_wait.as_secs(), 30);
    }
}
