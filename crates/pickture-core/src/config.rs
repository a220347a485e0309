//! Engine configuration loaded from TOML.
//!
//! ```toml
//! workers = 4
//!
//! [cache]
//! capacity = 50
//! ttl_secs = 300
//!
//! [enhance]
//! discard_percent = 0.05
//! value_gamma = 1.15
//! ```
//!
//! Every field is optional and falls back to its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheConfig, MAX_TTL_SECS};
use crate::params::{EnhanceSettings, ParameterError};

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid cache setting: {0}")]
    InvalidCache(String),

    #[error("Worker count must be at least 1")]
    InvalidWorkers,

    #[error(transparent)]
    InvalidEnhance(#[from] ParameterError),
}

/// Top-level engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Precompute worker threads; `None` lets rayon decide.
    pub workers: Option<usize>,
    pub cache: CacheConfig,
    pub enhance: EnhanceSettings,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Like [`load`](Self::load), but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidCache(
                "capacity must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidCache(
                "ttl_secs must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::InvalidCache(format!(
                "ttl_secs must be at most {}",
                MAX_TTL_SECS
            )));
        }
        self.enhance.validate()?;
        Ok(())
    }
}
