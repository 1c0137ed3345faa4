//! Configuration Management
//!
//! Handles persistent configuration storage for drcluster.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:15000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 1;

pub const ENDPOINT_ENV: &str = "DRCLUSTER_ENDPOINT";
pub const TOKEN_ENV: &str = "DRCLUSTER_TOKEN";

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base URL of the cluster service
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token sent with every service call
    #[serde(default)]
    pub token: Option<String>,
    /// Per-request timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Candidate fetches in flight at once
    #[serde(default)]
    pub fetch_concurrency: Option<usize>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("drcluster").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`; missing or malformed files give defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// `overrides` laid over this configuration, field by field
    pub fn merged(&self, overrides: &Config) -> Config {
        Config {
            endpoint: overrides.endpoint.clone().or_else(|| self.endpoint.clone()),
            token: overrides.token.clone().or_else(|| self.token.clone()),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            fetch_concurrency: overrides.fetch_concurrency.or(self.fetch_concurrency),
        }
    }

    /// Get effective endpoint (config > DRCLUSTER_ENDPOINT > default)
    pub fn effective_endpoint(&self) -> String {
        self.endpoint_or(std::env::var(ENDPOINT_ENV).ok())
    }

    /// Get effective token (config > DRCLUSTER_TOKEN)
    pub fn effective_token(&self) -> Option<String> {
        self.token_or(std::env::var(TOKEN_ENV).ok())
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn effective_fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
            .unwrap_or(DEFAULT_FETCH_CONCURRENCY)
            .max(1)
    }

    fn endpoint_or(&self, env: Option<String>) -> String {
        non_empty(self.endpoint.clone())
            .or_else(|| non_empty(env))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    fn token_or(&self, env: Option<String>) -> Option<String> {
        non_empty(self.token.clone()).or_else(|| non_empty(env))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
