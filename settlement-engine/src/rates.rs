//! Earning rate policy
//!
//! Exactly one rate configuration is active at a time. Uniqueness comes
//! from the single-slot storage row, not from filtering a table by flag,
//! so a read can never observe zero-or-many "active" configs.

use crate::{Error, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use wallet_core::{types::RateConfig, Storage};

/// Single-active-config rate policy
#[derive(Clone)]
pub struct RatePolicy {
    storage: Arc<Storage>,
}

impl RatePolicy {
    /// Create a policy over storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Currently active rate config
    ///
    /// Absence is fatal to the calling operation, not to the process.
    pub fn active_rate(&self) -> Result<RateConfig> {
        self.storage
            .get_active_rate()?
            .ok_or(Error::NoActiveRateConfig)
    }

    /// Current per-job earning rate
    pub fn current_rate(&self) -> Result<Decimal> {
        Ok(self.active_rate()?.earning_rate)
    }

    /// Replace the active config
    pub fn set_active_rate(&self, config: RateConfig) -> Result<()> {
        self.storage.put_active_rate(&config)?;
        tracing::info!(rate = %config.earning_rate, "Active rate config replaced");
        Ok(())
    }
}
