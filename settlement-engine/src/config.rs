//! Configuration for the settlement engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settlement engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the wallet store
    pub data_dir: PathBuf,

    /// Bounded wait for user/job row locks (milliseconds)
    pub lock_wait_ms: u64,

    /// Default daily send limit for new users
    pub default_daily_limit: u32,

    /// Referral bonus tiers
    pub referral: ReferralConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/wallet"),
            lock_wait_ms: 500,
            default_daily_limit: 100,
            referral: ReferralConfig::default(),
        }
    }
}

/// Referral bonus percentages per level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Level 1 share of the earning rate
    pub level1: Decimal,

    /// Level 2 share of the earning rate
    pub level2: Decimal,

    /// Level 3 share of the earning rate
    pub level3: Decimal,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            level1: Decimal::new(10, 2), // 10%
            level2: Decimal::new(2, 2),  // 2%
            level3: Decimal::new(1, 2),  // 1%
        }
    }
}

impl ReferralConfig {
    /// Tier percentages in level order
    pub fn tiers(&self) -> [Decimal; 3] {
        [self.level1, self.level2, self.level3]
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

        if let Ok(data_dir) = std::env::var("SETTLEMENT_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(wait) = std::env::var("SETTLEMENT_LOCK_WAIT_MS") {
            config.lock_wait_ms = wait.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid SETTLEMENT_LOCK_WAIT_MS: {}", e))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let config = Config::default();
        assert_eq!(
            config.referral.tiers(),
            [
                Decimal::new(10, 2),
                Decimal::new(2, 2),
                Decimal::new(1, 2)
            ]
        );
        assert_eq!(config.default_daily_limit, 100);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let mut config = Config::default();
        config.lock_wait_ms = 100;
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.lock_wait_ms, 100);
        assert_eq!(loaded.referral.level1, Decimal::new(10, 2));
    }
}
