//! Configuration for the rehydration cache.

use std::time::Duration;

/// Default lifetime of a cached entry (5 seconds).
///
/// Only needs to cover the gap between the disconnected render and the
/// connected mount that follows it.
pub const DEFAULT_TTL: Duration = Duration::from_millis(5_000);

/// Default period of the background sweep (1 second).
pub const DEFAULT_SWEEP_EVERY: Duration = Duration::from_millis(1_000);

/// Configuration for the rehydration cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of each cached entry. A zero TTL disables caching entirely:
    /// every fetch recomputes and the store is never touched.
    pub ttl: Duration,

    /// Period of the background sweep that drops expired entries.
    /// Independent of `ttl`, but should not exceed it for timely cleanup.
    pub sweep_every: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sweep_every: DEFAULT_SWEEP_EVERY,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from millisecond values, as found in config files.
    pub fn from_millis(ttl_ms: u64, sweep_every_ms: u64) -> Self {
        Self {
            ttl: Duration::from_millis(ttl_ms),
            sweep_every: Duration::from_millis(sweep_every_ms),
        }
    }

    /// A configuration with caching turned off.
    pub fn disabled() -> Self {
        Self::default().with_ttl(Duration::ZERO)
    }

    /// Set the entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the sweep period.
    pub fn with_sweep_every(mut self, period: Duration) -> Self {
        self.sweep_every = period;
        self
    }

    /// Whether caching is on (non-zero TTL).
    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert_eq!(config.sweep_every, DEFAULT_SWEEP_EVERY);
        assert!(config.is_enabled());
    }

    #[test]
    fn test_zero_ttl_disables() {
        assert!(!CacheConfig::disabled().is_enabled());
        assert!(!CacheConfig::from_millis(0, 1000).is_enabled());
    }

    #[test]
    fn test_from_millis() {
        let config = CacheConfig::from_millis(500, 250);
        assert_eq!(config.ttl, Duration::from_millis(500));
        assert_eq!(config.sweep_every, Duration::from_millis(250));
    }
}
