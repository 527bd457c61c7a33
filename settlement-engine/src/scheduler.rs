//! Daily counter reset scheduler
//!
//! Sleeps until the next UTC midnight, zeroes every user's daily counter,
//! and repeats. Reset failures are logged and retried at the next
//! midnight; they never bring the task down.

use crate::engine::SettlementEngine;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Midnight reset loop over the engine
pub struct DailyResetScheduler {
    engine: SettlementEngine,
}

impl DailyResetScheduler {
    /// Create a scheduler over the engine
    pub fn new(engine: SettlementEngine) -> Self {
        Self { engine }
    }

    /// Run the reset loop until the task is aborted
    pub async fn run(self) {
        loop {
            let delay = next_midnight_delay();
            tracing::debug!(?delay, "Sleeping until next UTC midnight");
            tokio::time::sleep(delay).await;

            let today = Utc::now().date_naive();
            match self.engine.reset_all_daily_counters(today) {
                Ok(updated) => {
                    tracing::info!(%today, updated, "Midnight reset complete");
                }
                Err(e) => {
                    tracing::error!(%today, error = %e, "Midnight reset failed");
                }
            }
        }
    }
}

/// Duration until the next UTC midnight
fn next_midnight_delay() -> Duration {
    let now = Utc::now();
    let next_midnight = (now + ChronoDuration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();

    (next_midnight - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_delay_is_within_one_day() {
        let delay = next_midnight_delay();
        assert!(delay > Duration::ZERO);
        assert!(delay <= Duration::from_secs(24 * 60 * 60));
    }

    #[tokio::test]
    async fn test_reset_zeroes_counters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let engine = SettlementEngine::open(config).unwrap();

        engine.register_user("alice", None).unwrap();
        engine.register_user("bob", None).unwrap();

        let today = Utc::now().date_naive();
        let updated = engine.reset_all_daily_counters(today).unwrap();
        assert_eq!(updated, 2);

        let scheduler = DailyResetScheduler::new(engine);
        let handle = tokio::spawn(scheduler.run());
        // The loop sleeps until midnight; it must still be alive
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
