//! Application configuration management.
//!
//! This module handles loading and saving the configuration: the API base
//! URL, the landing route, optional overrides of the public-route table
//! and which storage backend holds the credential.
//!
//! Configuration is stored at `~/.config/rentline/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::REQUEST_TIMEOUT_SECS;
use crate::routes::{RoutePattern, RouteTable, DEFAULT_LANDING_ROUTE};

/// Application name used for config/data directory paths
const APP_NAME: &str = "rentline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "RENTLINE_API_URL";

/// Default API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.rentline.app";

/// Where the bearer token is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file in the data directory.
    #[default]
    File,
    /// OS keychain.
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub landing_route: String,
    /// Replaces the built-in public-route list when set.
    pub public_routes: Option<Vec<RoutePattern>>,
    /// Replaces the built-in static asset prefixes when set.
    pub asset_prefixes: Option<Vec<String>>,
    pub storage: StorageBackend,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            landing_route: DEFAULT_LANDING_ROUTE.to_string(),
            public_routes: None,
            asset_prefixes: None,
            storage: StorageBackend::default(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults, then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file; using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                debug!(url = %url, "API base URL overridden from environment");
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for persisted client state (token, cookies, return path).
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The route table both the guard and the edge filter use.
    pub fn route_table(&self) -> RouteTable {
        let defaults = RouteTable::default();
        let public = self
            .public_routes
            .clone()
            .unwrap_or_else(|| defaults.public_routes().to_vec());
        let assets = self
            .asset_prefixes
            .clone()
            .unwrap_or_else(|| defaults.asset_prefixes().to_vec());
        RouteTable::new(&self.landing_route, public, assets)
    }
}
