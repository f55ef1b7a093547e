//! Configuration system for datum.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

use crate::error::{DatumError, DatumResult};

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// Volatile, lock-sharded maps.
    #[default]
    Memory,
    /// SQLite database at `db_path`.
    Sqlite,
}

/// How `get_latest` picks the head of a chain that has branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LatestPolicy {
    /// Walk forward from the root, taking the highest `(timestamp, hash)`
    /// successor at every step.
    #[default]
    ChainWalk,
    /// Take the highest `(timestamp, hash)` update anywhere in the chain.
    MostRecent,
}

/// Main store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage backend.
    pub backend: BackendKind,
    /// Path to the SQLite database (used by the sqlite backend).
    pub db_path: PathBuf,
    /// Head resolution rule for branched chains.
    pub latest_policy: LatestPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let datum_dir = dirs::home_dir()
            .map(|h| h.join(".datum"))
            .unwrap_or_else(|| PathBuf::from(".datum"));

        Self {
            backend: BackendKind::default(),
            db_path: datum_dir.join("datum.db"),
            latest_policy: LatestPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> DatumResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| DatumError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| DatumError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| DatumError::Configuration(e.to_string())),
            _ => Err(DatumError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults; unparseable values are errors.
    pub fn from_env() -> DatumResult<Self> {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var("DATUM_BACKEND") {
            config.backend = backend.parse().map_err(|_| {
                DatumError::Configuration(format!("Unknown DATUM_BACKEND '{}'", backend))
            })?;
        }

        if let Ok(path) = std::env::var("DATUM_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(policy) = std::env::var("DATUM_LATEST_POLICY") {
            config.latest_policy = policy.parse().map_err(|_| {
                DatumError::Configuration(format!("Unknown DATUM_LATEST_POLICY '{}'", policy))
            })?;
        }

        Ok(config)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for StoreConfig.
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the storage backend.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the SQLite database path.
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    /// Set the head resolution rule.
    pub fn latest_policy(mut self, policy: LatestPolicy) -> Self {
        self.config.latest_policy = policy;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> StoreConfig {
        self.config
    }
}
