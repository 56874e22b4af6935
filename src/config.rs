//! Configuration Module
//!
//! Store parameters, passed programmatically to `DiskStore::open`. The binary
//! can also load them from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Eviction continues until size drops below `max_size * threshold`.
/// Used when a write pushes the store over capacity.
pub const DEFAULT_EXHAUSTION_THRESHOLD: f64 = 0.75;
/// Target of the periodic trimming pass.
pub const DEFAULT_PERIODIC_THRESHOLD: f64 = 0.95;
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SLOW_THROTTLE: Duration = Duration::from_millis(5);

/// Disk store configuration parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base directory; entries live under `<base_path>/data`
    pub base_path: PathBuf,
    /// Capacity bound in bytes (headers included)
    pub max_size_bytes: u64,
    /// Target fraction for the fast (over capacity) eviction path
    pub exhaustion_threshold: f64,
    /// Target fraction for the periodic eviction path
    pub periodic_threshold: f64,
    /// Period of the slow eviction pass
    pub eviction_interval: Duration,
    /// Pause after each entry evicted on the fast path
    pub fast_throttle: Duration,
    /// Pause after each entry evicted on the periodic path
    pub slow_throttle: Duration,
}

impl StoreConfig {
    /// Creates a config with default eviction tuning.
    pub fn new(base_path: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        Self {
            base_path: base_path.into(),
            max_size_bytes,
            exhaustion_threshold: DEFAULT_EXHAUSTION_THRESHOLD,
            periodic_threshold: DEFAULT_PERIODIC_THRESHOLD,
            eviction_interval: DEFAULT_EVICTION_INTERVAL,
            fast_throttle: Duration::ZERO,
            slow_throttle: DEFAULT_SLOW_THROTTLE,
        }
    }

    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DISKCACHE_PATH` - Base directory (default: `./cache`)
    /// - `DISKCACHE_MAX_SIZE` - Capacity in bytes (default: 1 GiB)
    /// - `DISKCACHE_EVICTION_INTERVAL` - Periodic eviction in seconds (default: 3600)
    pub fn from_env() -> Self {
        let base_path = env::var("DISKCACHE_PATH").unwrap_or_else(|_| "./cache".to_string());
        let max_size_bytes = env::var("DISKCACHE_MAX_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024 * 1024 * 1024);

        let mut config = Self::new(base_path, max_size_bytes);
        config.eviction_interval = env::var("DISKCACHE_EVICTION_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_EVICTION_INTERVAL);
        config
    }

    /// Rejects capacities and thresholds the eviction worker cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size_bytes must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("exhaustion_threshold", self.exhaustion_threshold),
            ("periodic_threshold", self.periodic_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(CacheError::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.eviction_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "eviction_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Size in bytes the fast path evicts down to.
    pub fn exhaustion_target(&self) -> u64 {
        (self.max_size_bytes as f64 * self.exhaustion_threshold) as u64
    }

    /// Size in bytes the periodic path evicts down to.
    pub fn periodic_target(&self) -> u64 {
        (self.max_size_bytes as f64 * self.periodic_threshold) as u64
    }

    /// Directory holding the sharded entry files.
    pub fn data_path(&self) -> PathBuf {
        self.base_path.join("data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::new("/tmp/x", 100 * 1024);
        assert_eq!(config.max_size_bytes, 100 * 1024);
        assert_eq!(config.exhaustion_threshold, 0.75);
        assert_eq!(config.periodic_threshold, 0.95);
        assert_eq!(config.eviction_interval, Duration::from_secs(3600));
        assert_eq!(config.fast_throttle, Duration::ZERO);
        assert_eq!(config.slow_throttle, Duration::from_millis(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_targets() {
        let config = StoreConfig::new("/tmp/x", 1000);
        assert_eq!(config.exhaustion_target(), 750);
        assert_eq!(config.periodic_target(), 950);
        assert_eq!(config.data_path(), PathBuf::from("/tmp/x/data"));
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        let config = StoreConfig::new("/tmp/x", 0);
        assert!(matches!(config.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_rejects_bad_threshold() {
        let mut config = StoreConfig::new("/tmp/x", 1000);
        config.periodic_threshold = 1.5;
        assert!(config.validate().is_err());

        config.periodic_threshold = 0.95;
        config.exhaustion_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("DISKCACHE_PATH");
        env::remove_var("DISKCACHE_MAX_SIZE");
        env::remove_var("DISKCACHE_EVICTION_INTERVAL");

        let config = StoreConfig::from_env();
        assert_eq!(config.base_path, PathBuf::from("./cache"));
        assert_eq!(config.max_size_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.eviction_interval, DEFAULT_EVICTION_INTERVAL);
    }
}
