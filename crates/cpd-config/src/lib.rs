//! change-primary-domain Configuration
//!
//! TOML-based configuration with environment variable override support.
//! Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub directory: DirectoryConfig,
    pub auth: AuthConfig,
    pub migration: MigrationSettings,
}

/// Directory API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Records requested per listing page
    pub page_size: u32,
    pub user_agent: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://admin.googleapis.com/admin/directory/v1".to_string(),
            timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_ms: 100,
            page_size: 50,
            user_agent: format!("change-primary-domain/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// OAuth2 installed-application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_secret_path: String,
    /// Empty means `$HOME/.credentials`
    pub token_cache_dir: String,
    pub token_file_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_secret_path: "client_secret.json".to_string(),
            token_cache_dir: String::new(),
            token_file_prefix: "changeprimarydomain".to_string(),
        }
    }
}

impl AuthConfig {
    /// Resolve the token cache directory, defaulting under the home directory.
    pub fn resolved_token_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        if !self.token_cache_dir.is_empty() {
            return Ok(PathBuf::from(&self.token_cache_dir));
        }
        dirs::home_dir()
            .map(|home| home.join(".credentials"))
            .ok_or_else(|| {
                ConfigError::ValidationError(
                    "Unable to determine home directory for the token cache".to_string(),
                )
            })
    }
}

/// Migration behaviour switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Customer key used for the customer lookup and the user listing
    pub customer_key: String,
    pub preserve_old_primary: bool,
    pub dry_run: bool,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            customer_key: "my_customer".to_string(),
            preserve_old_primary: false,
            dry_run: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Check values that would only fail later, deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "directory.base_url must not be empty".to_string(),
            ));
        }
        if self.directory.page_size == 0 || self.directory.page_size > 500 {
            return Err(ConfigError::ValidationError(format!(
                "directory.page_size must be between 1 and 500, got {}",
                self.directory.page_size
            )));
        }
        if self.directory.retry_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "directory.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.migration.customer_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "migration.customer_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# change-primary-domain configuration
# Environment variables (CPD_*) override these settings

[directory]
base_url = "https://admin.googleapis.com/admin/directory/v1"
timeout_secs = 30
retry_attempts = 3
retry_delay_ms = 100
page_size = 50

[auth]
client_secret_path = "client_secret.json"
token_cache_dir = ""  # defaults to ~/.credentials
token_file_prefix = "changeprimarydomain"

[migration]
customer_key = "my_customer"
preserve_old_primary = false
dry_run = false
"#
        .to_string()
    }
}
