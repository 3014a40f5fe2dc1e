//! IssueChat configuration file handling
//!
//! Loads and manages the ~/.config/issuechat/config.yaml file.

use super::repository::{LabelTaxonomy, RepositoryConfig};
use crate::transport::github::DEFAULT_API_URL;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no API key is configured
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// IssueChat configuration
///
/// Represents the complete ~/.config/issuechat/config.yaml file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Repository backing the chat room, as `owner/name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Poll interval in seconds
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,

    /// Poll in the background after the initial sync
    #[serde(default = "default_auto_sync")]
    pub auto_sync: bool,

    /// GitHub token; `GITHUB_TOKEN` is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub labels: LabelTaxonomy,

    /// GitHub REST endpoint (override for GitHub Enterprise)
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_sync_interval() -> u64 {
    30
}

fn default_auto_sync() -> bool {
    true
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl ChatConfig {
    /// Create a new configuration with defaults and no repository
    pub fn new() -> Self {
        Self {
            repository: None,
            sync_interval_seconds: default_sync_interval(),
            auto_sync: default_auto_sync(),
            api_key: None,
            labels: LabelTaxonomy::default(),
            api_url: default_api_url(),
        }
    }

    pub fn with_repository(mut self, slug: impl Into<String>) -> Self {
        self.repository = Some(slug.into());
        self
    }

    /// Load configuration from the default path (~/.config/issuechat/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::IssueChatError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading IssueChat configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            repository = config.repository.as_deref().unwrap_or("<unset>"),
            interval = config.sync_interval_seconds,
            auto_sync = config.auto_sync,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::new())
        }
    }

    /// Save configuration to the default path
    pub fn save_default(&self) -> Result<()> {
        let path = Self::default_path();
        self.save(&path)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving IssueChat configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/issuechat/config.yaml)
    pub fn default_path() -> PathBuf {
        // Always use ~/.config for consistency across platforms (macOS, Linux)
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("issuechat");
        path.push("config.yaml");
        path
    }

    /// Resolve the configured repository with this config's label taxonomy
    pub fn repository_config(&self) -> Result<RepositoryConfig> {
        let slug = self.repository.as_deref().ok_or_else(|| {
            crate::IssueChatError::Config(
                "No repository configured (run `issuechat config set-repo owner/name`)".to_string(),
            )
        })?;
        Ok(RepositoryConfig::parse(slug)?.with_labels(self.labels.clone()))
    }

    /// Configured key, or `GITHUB_TOKEN` from the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}
