//! Configuration for export and import runs
//!
//! Default config location: ./apisync.toml (optional, every field has a default)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub management: ManagementConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the control plane lives and how long to wait for it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagementConfig {
    /// Management endpoint, e.g. https://management.azure.com
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Value of the `api-version` query parameter sent on every call
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_api_version() -> String {
    "2022-08-01".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ManagementConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Format requested from the definition export endpoint
    #[serde(default = "default_definition_format")]
    pub definition_format: String,

    /// Upper bound on pages read from a single collection
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Resources of one kind processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Keep Key Vault references of secret named values in the snapshot.
    /// Plaintext secret values are never written either way.
    #[serde(default)]
    pub include_secret_references: bool,
}

fn default_definition_format() -> String {
    "openapi+json-link".to_string()
}

fn default_max_pages() -> usize {
    1000
}

fn default_concurrency() -> usize {
    4
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            definition_format: default_definition_format(),
            max_pages: default_max_pages(),
            concurrency: default_concurrency(),
            include_secret_references: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info,apisync=debug".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Addresses one API management service instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceCoordinates {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
}

impl ServiceCoordinates {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            service_name: service_name.into(),
        }
    }

    /// Path of the service resource below the management endpoint.
    pub fn resource_path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}",
            self.subscription_id, self.resource_group, self.service_name
        )
    }
}

impl std::fmt::Display for ServiceCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subscription_id, self.resource_group, self.service_name
        )
    }
}

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from file path, or fall back to defaults when it does not exist
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        let config_path = expand_tilde(config_path)?;
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", config_path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.concurrency == 0 {
            return Err(Error::Config("sync.concurrency must be at least 1".into()));
        }
        if self.sync.max_pages == 0 {
            return Err(Error::Config("sync.max_pages must be at least 1".into()));
        }
        if self.management.request_timeout_secs == 0 {
            return Err(Error::Config(
                "management.request_timeout_secs must be at least 1".into(),
            ));
        }
        url::Url::parse(&self.management.endpoint)?;
        Ok(())
    }
}
