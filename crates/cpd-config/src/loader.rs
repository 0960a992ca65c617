//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "change-primary-domain.toml",
    "./config/change-primary-domain.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file()? {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config)?;

        Ok(config)
    }

    /// Find the configuration file to use.
    ///
    /// An explicitly requested file that does not exist is an error; the
    /// standard search paths are optional.
    fn find_config_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Ok(Some(path.clone()));
            }
            return Err(ConfigError::ValidationError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        if let Ok(path) = env::var("CPD_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        // Directory
        if let Ok(val) = env::var("CPD_DIRECTORY_BASE_URL") {
            config.directory.base_url = val;
        }
        if let Some(val) = parse_env("CPD_DIRECTORY_TIMEOUT_SECS")? {
            config.directory.timeout_secs = val;
        }
        if let Some(val) = parse_env("CPD_DIRECTORY_RETRY_ATTEMPTS")? {
            config.directory.retry_attempts = val;
        }
        if let Some(val) = parse_env("CPD_DIRECTORY_RETRY_DELAY_MS")? {
            config.directory.retry_delay_ms = val;
        }
        if let Some(val) = parse_env("CPD_DIRECTORY_PAGE_SIZE")? {
            config.directory.page_size = val;
        }

        // Auth
        if let Ok(val) = env::var("CPD_CLIENT_SECRET_PATH") {
            config.auth.client_secret_path = val;
        }
        if let Ok(val) = env::var("CPD_TOKEN_CACHE_DIR") {
            config.auth.token_cache_dir = val;
        }

        // Migration
        if let Ok(val) = env::var("CPD_CUSTOMER_KEY") {
            config.migration.customer_key = val;
        }
        if let Some(val) = parse_env("CPD_PRESERVE_OLD_PRIMARY")? {
            config.migration.preserve_old_primary = val;
        }
        if let Some(val) = parse_env("CPD_DRY_RUN")? {
            config.migration.dry_run = val;
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvError(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[directory]\npage_size = 200").unwrap();

        let config = ConfigLoader::with_path(file.path()).load().unwrap();
        assert_eq!(config.directory.page_size, 200);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::with_path(dir.path().join("absent.toml")).load();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
