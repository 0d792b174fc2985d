// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! Loaded from TOML. Durations use humantime syntax ("30s", "5m").

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding the write-ahead log; unset keeps state in memory
    pub state_dir: Option<PathBuf>,
    /// Recorded in every WAL entry
    pub machine_id: String,
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub interrupts: InterruptConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Wait used by retry advisers that list no waits
    #[serde(with = "humantime_serde")]
    pub default_wait: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Applied to step nodes that declare no timeout
    #[serde(with = "humantime_serde")]
    pub default_node_timeout: Option<Duration>,
    /// How often running steps are checked against their timeout
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterruptConfig {
    /// Interrupts processed per target before yielding to other work
    pub max_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            machine_id: uuid::Uuid::new_v4().to_string(),
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            interrupts: InterruptConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_wait: Duration::ZERO,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_node_timeout: None,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self { max_batch: 64 }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interrupts.max_batch == 0 {
            return Err(ConfigError::Invalid(
                "interrupts.max_batch must be at least 1".to_string(),
            ));
        }
        if self.timeouts.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "timeouts.sweep_interval must be positive".to_string(),
            ));
        }
        if self.machine_id.is_empty() {
            return Err(ConfigError::Invalid("machine_id must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
