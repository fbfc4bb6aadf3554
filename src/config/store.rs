//! Persisted key-value configuration.
//!
//! The configuration file is a flat JSON object of string keys to string
//! values. Registration code only ever writes the model id keys; the CLI
//! reads the connection keys when it builds the HTTP transport.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use super::XdgDirs;

/// Well-known configuration keys.
pub mod keys {
    pub const OPENSEARCH_ENDPOINT: &str = "opensearch_endpoint";
    pub const OPENSEARCH_USERNAME: &str = "opensearch_username";
    pub const OPENSEARCH_PASSWORD: &str = "opensearch_password";
    pub const SERVICE_TYPE: &str = "service_type";
    pub const REGION: &str = "region";
    pub const EMBEDDING_DIMENSION: &str = "embedding_dimension";
    pub const VERIFY_CERTS: &str = "verify_certs";
    pub const EMBEDDING_MODEL_ID: &str = "embedding_model_id";
    pub const LLM_MODEL_ID: &str = "llm_model_id";
}

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Flat string-to-string configuration mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedConfig {
    values: BTreeMap<String, String>,
}

impl PersistedConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a non-empty value by key.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Set a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Remove a value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate entries with secret-bearing values masked.
    pub fn masked(&self) -> impl Iterator<Item = (&str, String)> {
        self.iter().map(|(k, v)| {
            let shown = if is_secret_key(k) {
                mask(v)
            } else {
                v.to_string()
            };
            (k, shown)
        })
    }

    /// Deployment flavour of the cluster. Defaults to managed.
    pub fn service_type(&self) -> Result<ServiceType, ConfigError> {
        match self.get_non_empty(keys::SERVICE_TYPE) {
            Some(raw) => raw.parse(),
            None => Ok(ServiceType::Managed),
        }
    }

    /// Embedding dimension used by self-hosted model templates. Defaults to 768.
    pub fn embedding_dimension(&self) -> Result<u32, ConfigError> {
        match self.get_non_empty(keys::EMBEDDING_DIMENSION) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: keys::EMBEDDING_DIMENSION.to_string(),
                value: raw.to_string(),
            }),
            None => Ok(768),
        }
    }

    /// Whether TLS certificates should be verified. Defaults to true.
    pub fn verify_certs(&self) -> Result<bool, ConfigError> {
        match self.get_non_empty(keys::VERIFY_CERTS) {
            None => Ok(true),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: keys::VERIFY_CERTS.to_string(),
                    value: raw.to_string(),
                }),
            },
        }
    }
}

impl FromIterator<(String, String)> for PersistedConfig {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("password") || key.contains("api_key") || key.contains("secret")
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(2).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// How the target cluster is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    /// Managed domain; connectors use a secret store or an IAM role.
    Managed,
    /// Serverless collection; registers like a managed domain.
    Serverless,
    /// Self-hosted open-source cluster driven with raw REST calls.
    OpenSource,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Serverless => "serverless",
            Self::OpenSource => "open-source",
        }
    }

    /// True when registration goes through the connector helper.
    pub fn uses_helper(&self) -> bool {
        !matches!(self, Self::OpenSource)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "managed" => Ok(Self::Managed),
            "serverless" => Ok(Self::Serverless),
            "open-source" | "opensource" | "open_source" => Ok(Self::OpenSource),
            _ => Err(ConfigError::InvalidValue {
                key: keys::SERVICE_TYPE.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Loads and saves a [`PersistedConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default XDG location.
    pub fn default_location() -> Self {
        Self::new(XdgDirs::new().config_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration. A missing file yields an empty config.
    pub fn load(&self) -> Result<PersistedConfig, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Config file missing, starting empty");
            return Ok(PersistedConfig::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(PersistedConfig::new());
        }

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the configuration, creating parent directories as needed.
    pub fn save(&self, config: &PersistedConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), entries = config.len(), "Config saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("config.json"));

        let mut config = PersistedConfig::new();
        config.set(keys::OPENSEARCH_ENDPOINT, "https://localhost:9200");
        config.set(keys::EMBEDDING_MODEL_ID, "abc123");
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get(keys::EMBEDDING_MODEL_ID), Some("abc123"));
    }

    #[test]
    fn test_file_is_flat_json_object() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        let mut config = PersistedConfig::new();
        config.set("region", "us-west-2");
        store.save(&config).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"region": "us-west-2"}));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let err = ConfigStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_service_type_parsing() {
        let mut config = PersistedConfig::new();
        assert_eq!(config.service_type().unwrap(), ServiceType::Managed);

        config.set(keys::SERVICE_TYPE, "open-source");
        assert_eq!(config.service_type().unwrap(), ServiceType::OpenSource);
        assert!(!config.service_type().unwrap().uses_helper());

        config.set(keys::SERVICE_TYPE, "Serverless");
        assert!(config.service_type().unwrap().uses_helper());

        config.set(keys::SERVICE_TYPE, "on-prem");
        assert!(config.service_type().is_err());
    }

    #[test]
    fn test_embedding_dimension_default_and_invalid() {
        let mut config = PersistedConfig::new();
        assert_eq!(config.embedding_dimension().unwrap(), 768);

        config.set(keys::EMBEDDING_DIMENSION, "384");
        assert_eq!(config.embedding_dimension().unwrap(), 384);

        config.set(keys::EMBEDDING_DIMENSION, "wide");
        assert!(config.embedding_dimension().is_err());
    }

    #[test]
    fn test_verify_certs() {
        let mut config = PersistedConfig::new();
        assert!(config.verify_certs().unwrap());

        config.set(keys::VERIFY_CERTS, "false");
        assert!(!config.verify_certs().unwrap());
    }

    #[test]
    fn test_masked_hides_secrets() {
        let mut config = PersistedConfig::new();
        config.set(keys::OPENSEARCH_PASSWORD, "hunter2-long");
        config.set(keys::OPENSEARCH_USERNAME, "admin");

        let masked: BTreeMap<&str, String> = config.masked().collect();
        assert_eq!(masked[keys::OPENSEARCH_PASSWORD], "hu****");
        assert_eq!(masked[keys::OPENSEARCH_USERNAME], "admin");
    }
}
