// src/config.rs
use crate::application::{ClientSettings, Strategy};
use crate::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_STALE_AFTER_SECS, ENV_DATABASE_URL, ENV_SERVICE_KEY,
    ENV_SERVICE_URL, ENV_STALE_AFTER_SECS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// TOML configuration for noteflow
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// Remote notes service; both values are needed for the `rest` backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

// Default value functions
fn default_database_url() -> String { DEFAULT_DATABASE_URL.to_string() }
fn default_stale_after_secs() -> u64 { DEFAULT_STALE_AFTER_SECS }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl ServiceConfig {
    /// Endpoint and key, or an error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .with_context(|| format!("Service URL is not configured (set {ENV_SERVICE_URL})"))?;
        let key = self
            .key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| format!("Service key is not configured (set {ENV_SERVICE_KEY})"))?;
        Ok((url, key))
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse TOML config")?;

        Ok(config)
    }

    /// Load `path` when it exists, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                debug!(?path, "Loading config file");
                Self::load(path)
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Overlay values from the environment. `lookup` is `std::env::var`
    /// outside of tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(url) = lookup(ENV_SERVICE_URL) {
            self.service.url = Some(url);
        }
        if let Some(key) = lookup(ENV_SERVICE_KEY) {
            self.service.key = Some(key);
        }
        if let Some(secs) = lookup(ENV_STALE_AFTER_SECS) {
            self.client.stale_after_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{ENV_STALE_AFTER_SECS} must be a whole number of seconds"))?;
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            stale_after: Duration::from_secs(self.client.stale_after_secs),
        }
    }
}

/// Load a `.env` file from `path`, or search upward from the working
/// directory when `None`. A missing file is fine; a malformed one is not.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let result = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).context("Failed to load .env file"),
    }
}

/// `<config dir>/noteflow/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("noteflow").join("config.toml"))
}
