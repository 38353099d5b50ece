// src/services/scheduler.rs

//! Reset scheduling.
//!
//! Rolling counters reset at fixed intervals measured from the stored
//! `lastReset*` timestamps, not on calendar boundaries. Due resets are
//! always recomputed from storage, so a restart picks up where the previous
//! process left off.

use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};

use crate::models::{GlobalStats, Period, ScheduleConfig};
use crate::services::Aggregator;

/// Wait before retrying after a storage failure.
const RETRY_DELAY: StdDuration = StdDuration::from_secs(60);

/// Periods whose interval has fully elapsed at `now`.
pub fn due_periods(
    stats: &GlobalStats,
    now: DateTime<Utc>,
    schedule: &ScheduleConfig,
) -> Vec<Period> {
    Period::ALL
        .into_iter()
        .filter(|p| now - stats.last_reset(*p) >= schedule.interval(*p))
        .collect()
}

/// The earliest moment any period becomes due.
pub fn next_due(stats: &GlobalStats, schedule: &ScheduleConfig) -> DateTime<Utc> {
    Period::ALL
        .into_iter()
        .map(|p| stats.last_reset(p) + schedule.interval(p))
        .min()
        .unwrap_or_else(Utc::now)
}

/// Background loop applying due resets.
pub struct ResetScheduler {
    aggregator: Aggregator,
    schedule: ScheduleConfig,
}

impl ResetScheduler {
    pub fn new(aggregator: Aggregator, schedule: ScheduleConfig) -> Self {
        Self {
            aggregator,
            schedule,
        }
    }

    /// Apply every reset that is due now. Returns the periods reset.
    pub async fn run_due(&self, now: DateTime<Utc>) -> crate::error::Result<Vec<Period>> {
        self.aggregator.reset_due(now, &self.schedule).await
    }

    /// Run until `shutdown` completes, sleeping until the next due reset.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        log::info!("Reset scheduler started");

        loop {
            let wait = match self.tick().await {
                Ok(next) => (next - Utc::now()).to_std().unwrap_or(StdDuration::ZERO),
                Err(e) => {
                    log::error!("Reset scheduler failed: {}", e);
                    RETRY_DELAY
                }
            };
            log::debug!("Next reset check in {:?}", wait);

            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Reset scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn tick(&self) -> crate::error::Result<DateTime<Utc>> {
        let now = Utc::now();
        let reset = self.run_due(now).await?;
        if !reset.is_empty() {
            log::info!("Applied scheduled resets: {:?}", reset);
        }
        let stats = self.aggregator.load_stats().await?;
        Ok(next_due(&stats, &self.schedule))
    }
}
