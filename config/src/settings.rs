//! Application settings management

use crate::PathManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BRANCH: &str = "oss";
const DEFAULT_ROOT: &str = "images";
const DEFAULT_CDN_HOST: &str = "cdn.jsdelivr.net";
const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Application settings stored in settings.toml
///
/// Holds only non-secret values; the access token always comes from the
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    /// Repository owner (user or organization)
    pub owner: Option<String>,
    /// Repository name
    pub repo: Option<String>,
    /// Working branch images are committed to (default "oss")
    pub branch: Option<String>,
    /// Root folder inside the repository (default "images")
    pub root: Option<String>,
    /// CDN mirror host (default "cdn.jsdelivr.net")
    pub cdn_host: Option<String>,
    /// GitHub API base URL, for GitHub Enterprise
    pub api_base: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Compression relay endpoint, e.g. "http://127.0.0.1:8787/api/tinypng"
    pub relay_url: Option<String>,
}

/// Fully resolved configuration for building a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub root: String,
    pub cdn_host: String,
    pub api_base: String,
    pub timeout: Duration,
    pub relay_url: Option<String>,
}

/// Errors while resolving configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is neither in the environment nor in settings.toml
    Missing(&'static str),
    /// A value is present but unusable
    Invalid { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "Missing configuration: {}", name),
            ConfigError::Invalid { name, value } => {
                write!(f, "Invalid value for {}: {}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = PathManager::settings_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };

        toml::from_str(&content).unwrap_or_default()
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }

    /// Combine settings with environment variables; the environment wins.
    ///
    /// `env` is a lookup function so callers decide where variables come from
    /// (usually `crate::env_var`).
    pub fn resolve(&self, env: impl Fn(&str) -> Option<String>) -> Result<StoreConfig, ConfigError> {
        let lookup = |names: &[&str], fallback: &Option<String>| {
            names
                .iter()
                .find_map(|name| env(name))
                .or_else(|| fallback.clone())
        };

        let token = lookup(&["GITHUB_TOKEN", "VITE_GITHUB_TOKEN"], &None)
            .ok_or(ConfigError::Missing("GITHUB_TOKEN"))?;
        let owner = lookup(&["GITHUB_OWNER", "VITE_GITHUB_OWNER"], &self.owner)
            .ok_or(ConfigError::Missing("GITHUB_OWNER"))?;
        let repo = lookup(&["GITHUB_REPO", "VITE_GITHUB_REPO"], &self.repo)
            .ok_or(ConfigError::Missing("GITHUB_REPO"))?;
        let branch = lookup(&["IMGBED_BRANCH"], &self.branch)
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let root = lookup(&["IMGBED_ROOT"], &self.root)
            .map(|r| r.trim_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ROOT.to_string());
        if root.is_empty() {
            return Err(ConfigError::Invalid {
                name: "IMGBED_ROOT",
                value: root,
            });
        }
        let cdn_host = lookup(&["IMGBED_CDN_HOST"], &self.cdn_host)
            .unwrap_or_else(|| DEFAULT_CDN_HOST.to_string());
        let api_base = lookup(&["GITHUB_API_URL"], &self.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let timeout_secs = match env("IMGBED_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "IMGBED_TIMEOUT_SECS",
                value,
            })?,
            None => self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        Ok(StoreConfig {
            token,
            owner,
            repo,
            branch,
            root,
            cdn_host,
            api_base,
            timeout: Duration::from_secs(timeout_secs),
            relay_url: lookup(&["IMGBED_RELAY_URL"], &self.relay_url),
        })
    }
}
