use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{RetentionPolicy, StoreError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set in environment variables")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Retention(#[from] StoreError),
}

/// Root URL and credential for one upstream API
#[derive(Clone)]
pub struct ApiEndpoint {
    root: String,
    api_key: String,
}

impl ApiEndpoint {
    /// The root is normalized to end with exactly one `/`
    pub fn new(root: &str, api_key: &str) -> Result<Self, ConfigError> {
        let root = root.trim().trim_end_matches('/');
        if root.is_empty() {
            return Err(ConfigError::Invalid {
                name: "api root",
                value: String::new(),
            });
        }
        if api_key.trim().is_empty() {
            return Err(ConfigError::Missing("API key"));
        }
        Ok(Self {
            root: format!("{root}/"),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for ApiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEndpoint")
            .field("root", &self.root)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Application configuration
#[derive(Clone, Deserialize)]
pub struct Config {
    pub weather_api_root: String,
    pub geocoding_api_root: String,
    pub api_key: String,
    pub store_url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_retention_limit")]
    pub retention_limit: u64,
    #[serde(default = "default_retention_batch_size")]
    pub retention_batch_size: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database() -> String {
    "db_xd".to_string()
}

fn default_retention_limit() -> u64 {
    RetentionPolicy::DEFAULT_LIMIT
}

fn default_retention_batch_size() -> u64 {
    RetentionPolicy::DEFAULT_BATCH_SIZE
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Read `WEATHERKEEP_CONFIG` as TOML when set, else the environment
    pub fn load() -> Result<Self, ConfigError> {
        match env::var("WEATHERKEEP_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(path.trim()),
            _ => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: key,
                    value: raw,
                }),
                None => Ok(default),
            }
        };

        let config = Self {
            weather_api_root: required("OPEN_WEATHER_API")?,
            geocoding_api_root: required("GEOCODING_API")?,
            api_key: required("OPEN_WEATHER_API_KEY")?,
            store_url: required("MONGO_URL")?,
            database: lookup("MONGO_DB").unwrap_or_else(default_database),
            retention_limit: number("MONGO_DB_MAX_DOC_COUNT", default_retention_limit())?,
            retention_batch_size: number(
                "MONGO_DB_RETENTION_DELETION_COUNT",
                default_retention_batch_size(),
            )?,
            request_timeout_secs: number("WEATHERKEEP_TIMEOUT_SECS", default_request_timeout_secs())?,
            log_level: lookup("WEATHERKEEP_LOG_LEVEL").unwrap_or_else(default_log_level),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.retention_policy()?;
        self.weather_endpoint()?;
        self.geocoding_endpoint()?;
        Ok(())
    }

    pub fn retention_policy(&self) -> Result<RetentionPolicy, ConfigError> {
        Ok(RetentionPolicy::new(self.retention_limit, self.retention_batch_size)?)
    }

    pub fn weather_endpoint(&self) -> Result<ApiEndpoint, ConfigError> {
        ApiEndpoint::new(&self.weather_api_root, &self.api_key)
    }

    pub fn geocoding_endpoint(&self) -> Result<ApiEndpoint, ConfigError> {
        ApiEndpoint::new(&self.geocoding_api_root, &self.api_key)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("weather_api_root", &self.weather_api_root)
            .field("geocoding_api_root", &self.geocoding_api_root)
            .field("api_key", &"<redacted>")
            .field("store_url", &self.store_url)
            .field("database", &self.database)
            .field("retention_limit", &self.retention_limit)
            .field("retention_batch_size", &self.retention_batch_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}
