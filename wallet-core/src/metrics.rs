//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `wallet_entries_total` - Total ledger entries appended
//! - `wallet_balance_reads_total` - Total balance computations
//! - `wallet_append_duration_seconds` - Histogram of append latencies
//! - `wallet_claims_total` - Jobs claimed
//! - `wallet_settlements_total` - Jobs settled (completed and credited)

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total entries appended
    pub entries_total: IntCounter,

    /// Total balance reads
    pub balance_reads_total: IntCounter,

    /// Append duration histogram
    pub append_duration: Histogram,

    /// Jobs claimed
    pub claims_total: IntCounter,

    /// Jobs settled
    pub settlements_total: IntCounter,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total = IntCounter::with_opts(Opts::new(
            "wallet_entries_total",
            "Total ledger entries appended",
        ))?;
        registry.register(Box::new(entries_total.clone()))?;

        let balance_reads_total = IntCounter::with_opts(Opts::new(
            "wallet_balance_reads_total",
            "Total balance computations",
        ))?;
        registry.register(Box::new(balance_reads_total.clone()))?;

        let append_duration = Histogram::with_opts(
            HistogramOpts::new(
                "wallet_append_duration_seconds",
                "Histogram of append latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        let claims_total =
            IntCounter::with_opts(Opts::new("wallet_claims_total", "Jobs claimed"))?;
        registry.register(Box::new(claims_total.clone()))?;

        let settlements_total = IntCounter::with_opts(Opts::new(
            "wallet_settlements_total",
            "Jobs settled and credited",
        ))?;
        registry.register(Box::new(settlements_total.clone()))?;

        Ok(Self {
            entries_total,
            balance_reads_total,
            append_duration,
            claims_total,
            settlements_total,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.entries_total.get(), 0);
        assert_eq!(metrics.claims_total.get(), 0);
    }

    #[test]
    fn test_counters_increment() {
        let metrics = Metrics::new().unwrap();
        metrics.entries_total.inc();
        metrics.entries_total.inc();
        assert_eq!(metrics.entries_total.get(), 2);
    }

    #[test]
    fn test_independent_registries() {
        // Two collectors must not collide on registration
        let _a = Metrics::new().unwrap();
        let _b = Metrics::new().unwrap();
    }
}
