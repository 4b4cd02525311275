//! Configuration management for ceph-keyring

use crate::error::{KeyringError, Result};
use crate::layout::PathLayout;
use crate::version::ClusterVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CLUSTER_NAME: &str = "ceph";
pub const AUTHTOOL_NAME: &str = "ceph-authtool";
pub const CEPH_CLI_NAME: &str = "ceph";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cluster name substituted into keyring paths
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Pinned cluster version, skips detection (e.g. "0.94.5")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_version: Option<String>,

    /// Keyring locations
    #[serde(default)]
    pub paths: PathLayout,

    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ceph-authtool (None = search PATH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authtool: Option<PathBuf>,

    /// Path to the ceph CLI used for version detection (None = search PATH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceph: Option<PathBuf>,
}

fn default_cluster_name() -> String {
    DEFAULT_CLUSTER_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster_name: default_cluster_name(),
            cluster_version: None,
            paths: PathLayout::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("ceph-keyring").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Load configuration from file, falling back to defaults when it is missing.
    ///
    /// An explicitly given path must exist.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match config_path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if path.exists() {
            info!("Loading configuration from {:?}", path);
            let content = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else if explicit {
            Err(KeyringError::Config(format!(
                "Configuration file {:?} does not exist",
                path
            )))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that would resolve to nonsensical keyring paths
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.trim().is_empty() {
            return Err(KeyringError::Config("cluster_name must not be empty".into()));
        }
        if !self.paths.etc_dir.is_absolute() || !self.paths.lib_dir.is_absolute() {
            return Err(KeyringError::Config(format!(
                "keyring directories must be absolute: etc_dir={:?} lib_dir={:?}",
                self.paths.etc_dir, self.paths.lib_dir
            )));
        }
        let paths = [
            Some(&self.paths.etc_dir),
            Some(&self.paths.lib_dir),
            self.paths.staging_dir.as_ref(),
            self.tools.authtool.as_ref(),
        ];
        if let Some(path) = paths.into_iter().flatten().find(|p| p.to_str().is_none()) {
            return Err(KeyringError::Config(format!(
                "path {:?} is not valid UTF-8",
                path
            )));
        }
        self.pinned_version()?;
        Ok(())
    }

    /// The configured cluster version, if one is pinned
    pub fn pinned_version(&self) -> Result<Option<ClusterVersion>> {
        self.cluster_version
            .as_deref()
            .map(ClusterVersion::parse)
            .transpose()
    }
}
