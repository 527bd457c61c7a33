//! Configuration for the wallet core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wallet core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Bounded wait for row-level locks (milliseconds)
    pub lock_wait_ms: u64,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/wallet"),
            lock_wait_ms: 500,
            rocksdb: RocksDBConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("WALLET_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(wait) = std::env::var("WALLET_LOCK_WAIT_MS") {
            config.lock_wait_ms = wait
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid WALLET_LOCK_WAIT_MS: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lock_wait_ms, 500);
        assert_eq!(config.rocksdb.max_write_buffer_number, 4);
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.toml");

        let mut config = Config::default();
        config.lock_wait_ms = 250;
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.lock_wait_ms, 250);
        assert_eq!(loaded.data_dir, config.data_dir);
    }
}
