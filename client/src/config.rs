//! Configuration management for the client.

use roster_engine::Key;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL that relative route URLs are joined onto
    pub base_url: String,
    /// Path to the JSON route table
    pub routes_file: Option<PathBuf>,
    /// Key fields of the collection, in order
    pub key_fields: Vec<String>,
    /// Per-request timeout enforced by the HTTP transport
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("API_BASE_URL").ok_or(ConfigError::MissingBaseUrl)?;

        let routes_file = lookup("ROUTES_FILE").map(PathBuf::from);

        let key_fields = parse_key_fields(&lookup("KEY_FIELDS").unwrap_or_else(|| "id".to_string()))?;

        let timeout_secs = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url,
            routes_file,
            key_fields,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// The collection key described by `key_fields`.
    pub fn key(&self) -> Result<Key, ConfigError> {
        Key::new(self.key_fields.iter().cloned()).map_err(|_| ConfigError::EmptyKeyFields)
    }
}

/// Split a comma-separated list of key fields.
pub fn parse_key_fields(raw: &str) -> Result<Vec<String>, ConfigError> {
    let fields: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect();
    if fields.is_empty() {
        return Err(ConfigError::EmptyKeyFields);
    }
    Ok(fields)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API_BASE_URL environment variable is required")]
    MissingBaseUrl,

    #[error("Invalid HTTP_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),

    #[error("KEY_FIELDS must name at least one field")]
    EmptyKeyFields,
}
