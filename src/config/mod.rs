//! Configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// API version date sent with every request.
pub const DEFAULT_API_VERSION: &str = "2024-08-07";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Hive API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the API version header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Response cache lifetime in seconds (0 disables caching)
    #[serde(default)]
    pub cache_ttl_secs: u64,

    /// Give up after this many rate-limit retries (unset = never give up)
    #[serde(default)]
    pub max_rate_limit_retries: Option<u32>,
}

fn default_base_url() -> String {
    "https://api.playhive.com/v0".to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_user_agent() -> String {
    format!("hive-stats/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            user_agent: default_user_agent(),
            cache_ttl_secs: 0,
            max_rate_limit_retries: None,
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "API base URL must not be empty".to_string(),
            ));
        }

        let url = Url::parse(&self.base_url).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid API base URL '{}': {}", self.base_url, e))
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::ValidationError(format!(
                "API base URL '{}' cannot carry a path",
                self.base_url
            )));
        }

        if self.api_version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "API version must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub api: ApiConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.api.base_url, "https://api.playhive.com/v0");
        assert_eq!(config.api.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.api.cache_ttl_secs, 0);
        assert!(config.api.max_rate_limit_retries.is_none());
        assert!(config.api.user_agent.starts_with("hive-stats/"));
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_base_url() {
        let mut config = AppConfig::default();
        config.api.base_url = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_base_url() {
        let mut config = AppConfig::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "mailto:admin@example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_api_version() {
        let mut config = AppConfig::default();
        config.api.api_version = String::new();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[api]
cache_ttl_secs = 300
max_rate_limit_retries = 5
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api.cache_ttl_secs, 300);
        assert_eq!(config.api.max_rate_limit_retries, Some(5));
        assert_eq!(config.api.base_url, "https://api.playhive.com/v0");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nbase_url = \"\"").unwrap();

        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unparseable_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = ").unwrap();

        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.api.base_url, parsed.api.base_url);
        assert_eq!(config.api.api_version, parsed.api.api_version);
    }
}
