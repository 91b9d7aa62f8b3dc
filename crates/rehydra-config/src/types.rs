//! Configuration types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default cache entry lifetime in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 5_000;

/// Default sweep period in milliseconds.
pub const DEFAULT_SWEEP_EVERY_MS: u64 = 1_000;

/// Root configuration, as read from `rehydra.toml`.
///
/// Every field is optional so layers can be merged; accessors apply defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RehydraConfig {
    /// `[cache]` table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSection>,

    /// `[logging]` table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSection>,
}

/// Cache timing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Entry lifetime in milliseconds. `0` disables caching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,

    /// Sweep period in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_every_ms: Option<u64>,
}

/// Log output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive for console output (e.g. `rehydra=debug,info`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Directory for daily-rotated JSON logs. Unset means no file logging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_dir: Option<PathBuf>,
}

impl RehydraConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config with every default spelled out, as written by `config init`.
    pub fn with_defaults() -> Self {
        Self {
            cache: Some(CacheSection {
                ttl_ms: Some(DEFAULT_TTL_MS),
                sweep_every_ms: Some(DEFAULT_SWEEP_EVERY_MS),
            }),
            logging: None,
        }
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority,
    /// field by field).
    pub fn merge(&mut self, other: RehydraConfig) {
        if let Some(cache) = other.cache {
            let base = self.cache.get_or_insert_with(CacheSection::default);
            if cache.ttl_ms.is_some() {
                base.ttl_ms = cache.ttl_ms;
            }
            if cache.sweep_every_ms.is_some() {
                base.sweep_every_ms = cache.sweep_every_ms;
            }
        }

        if let Some(logging) = other.logging {
            let base = self.logging.get_or_insert_with(LoggingSection::default);
            if logging.filter.is_some() {
                base.filter = logging.filter;
            }
            if logging.json_dir.is_some() {
                base.json_dir = logging.json_dir;
            }
        }
    }

    /// Effective entry lifetime in milliseconds.
    pub fn ttl_ms(&self) -> u64 {
        self.cache
            .as_ref()
            .and_then(|c| c.ttl_ms)
            .unwrap_or(DEFAULT_TTL_MS)
    }

    /// Effective sweep period in milliseconds.
    pub fn sweep_every_ms(&self) -> u64 {
        self.cache
            .as_ref()
            .and_then(|c| c.sweep_every_ms)
            .unwrap_or(DEFAULT_SWEEP_EVERY_MS)
    }

    /// Console log filter, if configured.
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.filter.as_deref())
    }

    /// JSON log directory, if configured.
    pub fn json_log_dir(&self) -> Option<&Path> {
        self.logging.as_ref().and_then(|l| l.json_dir.as_deref())
    }

    /// Check that the effective values can run together.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_ms() > 0 && self.sweep_every_ms() == 0 {
            return Err(ConfigError::Invalid(
                "cache.sweep_every_ms must be positive while caching is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
