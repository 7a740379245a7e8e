//! Configuration Module
//!
//! Cache tuning parameters and the server settings for the binary, loaded
//! from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{DRAIN_INTERVAL, MAX_BATCH_SIZE};
use crate::error::{CacheError, Result};

/// Cache tuning parameters shared by every instance of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Memory budget in bytes, None = unbounded
    pub max_memory_usage: Option<u64>,
    /// Delay before each drain batch
    pub drain_interval: Duration,
    /// Maximum number of actions flushed per drain batch
    pub max_batch_size: usize,
}

impl CacheConfig {
    /// Creates a CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_MEMORY_USAGE` - Memory budget in bytes (default: unbounded)
    /// - `DRAIN_INTERVAL_MS` - Drain interval in milliseconds (default: 100)
    /// - `MAX_BATCH_SIZE` - Actions per drain batch (default: 100)
    pub fn from_env() -> Self {
        Self {
            max_memory_usage: env::var("MAX_MEMORY_USAGE")
                .ok()
                .and_then(|v| v.parse().ok()),
            drain_interval: env::var("DRAIN_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DRAIN_INTERVAL),
            max_batch_size: env::var("MAX_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_BATCH_SIZE),
        }
    }

    /// Sets the memory budget in bytes.
    pub fn with_max_memory_usage(mut self, bytes: u64) -> Self {
        self.max_memory_usage = Some(bytes);
        self
    }

    /// Rejects values the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.max_memory_usage == Some(0) {
            return Err(CacheError::Config(
                "max_memory_usage must be greater than zero".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(CacheError::Config(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.drain_interval.is_zero() {
            return Err(CacheError::Config(
                "drain_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Memory budget expressed in serialized characters.
    ///
    /// Sizes are measured in UTF-16 code units, assumed to take two bytes
    /// each, so the byte budget is halved.
    pub fn char_budget(&self) -> Option<usize> {
        self.max_memory_usage
            .map(|bytes| usize::try_from(bytes / 2).unwrap_or(usize::MAX))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_usage: None,
            drain_interval: DRAIN_INTERVAL,
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

/// Server configuration parameters for the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
    /// Root directory of the filesystem backing store
    pub data_dir: PathBuf,
    /// Cache parameters
    pub cache: CacheConfig,
}

impl ServerConfig {
    /// Creates a ServerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_DIR` - Backing store directory (default: ./data)
    /// - plus everything read by [`CacheConfig::from_env`]
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            cache: CacheConfig::from_env(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            data_dir: PathBuf::from("./data"),
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_memory_usage, None);
        assert_eq!(config.drain_interval, Duration::from_millis(100));
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.char_budget(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_char_budget_is_half_the_byte_budget() {
        let config = CacheConfig::default().with_max_memory_usage(1000);
        assert_eq!(config.char_budget(), Some(500));

        let config = CacheConfig::default().with_max_memory_usage(7);
        assert_eq!(config.char_budget(), Some(3));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = CacheConfig::default().with_max_memory_usage(0);
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));

        let config = CacheConfig {
            max_batch_size: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));

        let config = CacheConfig {
            drain_interval: Duration::ZERO,
            ..CacheConfig::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MAX_MEMORY_USAGE");
        env::remove_var("DRAIN_INTERVAL_MS");
        env::remove_var("MAX_BATCH_SIZE");
        env::remove_var("SERVER_PORT");
        env::remove_var("DATA_DIR");

        let config = ServerConfig::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.cache, CacheConfig::default());
    }
}
