//! Configuration file
//!
//! A single JSON object. Only `data_dir` is required; everything else has a
//! default. The file is validated on load and never rewritten by the engine.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{ActorProvider, EnvActor, FixedActor, RetryPolicy, TombstonePolicy};

pub const DEFAULT_CONFIG_PATH: &str = "./chronoset.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where snapshots are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Append-only logs under `data_dir`
    #[default]
    File,
    /// Process memory; gone on exit
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    #[serde(default)]
    pub storage: StorageMode,

    /// Attempts per mutation before giving up on conflicts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default)]
    pub tombstone_policy: TombstonePolicy,

    /// Fixed actor name. Falls back to `CHRONOSET_ACTOR` when absent.
    #[serde(default)]
    pub actor: Option<String>,

    #[serde(default)]
    pub log_enabled: bool,
}

fn default_max_attempts() -> u32 {
    RetryPolicy::DEFAULT_MAX_ATTEMPTS
}
fn default_base_backoff_ms() -> u64 {
    1
}
fn default_max_backoff_ms() -> u64 {
    50
}

impl Config {
    /// Defaults for everything but the data directory.
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            storage: StorageMode::default(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            tombstone_policy: TombstonePolicy::default(),
            actor: None,
            log_enabled: false,
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n").map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be > 0".into()));
        }
        if self.max_backoff_ms < self.base_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "max_backoff_ms ({}) must be >= base_backoff_ms ({})",
                self.max_backoff_ms, self.base_backoff_ms
            )));
        }
        if let Some(actor) = &self.actor {
            if actor.trim().is_empty() {
                return Err(ConfigError::Invalid("actor must not be blank".into()));
            }
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    pub fn actor_provider(&self) -> Arc<dyn ActorProvider> {
        match &self.actor {
            Some(name) => Arc::new(FixedActor::new(name.clone())),
            None => Arc::new(EnvActor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_takes_defaults() {
        let config = Config::from_json(r#"{"data_dir": "/tmp/chrono"}"#).unwrap();
        assert_eq!(config, Config::new("/tmp/chrono"));
        assert_eq!(config.storage, StorageMode::File);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.tombstone_policy, TombstonePolicy::AllowUndelete);
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_json(
            r#"{
                "data_dir": "data",
                "storage": "memory",
                "max_attempts": 3,
                "base_backoff_ms": 2,
                "max_backoff_ms": 8,
                "tombstone_policy": "require_restore",
                "actor": "Billy",
                "log_enabled": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageMode::Memory);
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.tombstone_policy, TombstonePolicy::RequireRestore);
        assert_eq!(config.actor_provider().current_actor().unwrap(), "Billy");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_json(r#"{"data_dir": "d", "max_attempts": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"data_dir": "d", "base_backoff_ms": 10, "max_backoff_ms": 5}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"data_dir": "d", "storage": "cloud"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(Config::from_json(r#"{}"#), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chronoset.json");
        let mut config = Config::new(dir.path().join("data").display().to_string());
        config.actor = Some("Sally".into());

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
