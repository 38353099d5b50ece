// src/services/aggregator.rs

//! Aggregator.
//!
//! Maintains per-site and global running totals in the key-value store.
//! Every read-modify-write on a key is done while holding that key's lock
//! from [`KeyLocks`], so concurrent visits to the same domain never lose an
//! update. At most one key lock is held at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{GlobalStats, PageEmissionRecord, Period, ScheduleConfig, SiteAggregate};
use crate::services::due_periods;
use crate::storage::{
    self, KeyLocks, KeyValueStore, SITE_PREFIX, STATS_KEY, decode_or_default, site_key,
};

/// Running-total maintenance over a key-value store.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<KeyLocks>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn KeyValueStore>, locks: Arc<KeyLocks>) -> Self {
        Self { store, locks }
    }

    /// Fold one page visit into its site aggregate and the global stats.
    pub async fn record_page_visit(
        &self,
        record: &PageEmissionRecord,
    ) -> Result<(SiteAggregate, GlobalStats)> {
        let site = self.update_site(record).await?;
        let stats = self.update_stats(record).await?;

        log::debug!(
            "Recorded {:.3} g for {} (visits: {}, total pages: {})",
            record.estimated_grams,
            site.domain,
            site.visit_count,
            stats.total_pages
        );
        Ok((site, stats))
    }

    async fn update_site(&self, record: &PageEmissionRecord) -> Result<SiteAggregate> {
        let key = site_key(&record.domain);
        let _guard = self.locks.lock(&key).await;

        let mut site = storage::load_optional::<SiteAggregate>(self.store.as_ref(), &key)
            .await?
            .unwrap_or_else(|| SiteAggregate::new(record.domain.clone()));
        if site.domain.is_empty() {
            site.domain = record.domain.clone();
        }
        site.apply(record);

        storage::save(self.store.as_ref(), &key, &site).await?;
        Ok(site)
    }

    async fn update_stats(&self, record: &PageEmissionRecord) -> Result<GlobalStats> {
        let _guard = self.locks.lock(STATS_KEY).await;

        let mut stats = self.load_stats().await?;
        stats.apply(record);

        storage::save(self.store.as_ref(), STATS_KEY, &stats).await?;
        Ok(stats)
    }

    /// Zero the counter for `period` and restart its clock at `now`.
    pub async fn reset_period(&self, period: Period, now: DateTime<Utc>) -> Result<GlobalStats> {
        let _guard = self.locks.lock(STATS_KEY).await;

        let mut stats = self.load_stats().await?;
        let cleared = stats.emissions_for(period);
        stats.reset(period, now);

        storage::save(self.store.as_ref(), STATS_KEY, &stats).await?;
        log::info!("Reset {} emissions ({:.2} g cleared)", period, cleared);
        Ok(stats)
    }

    /// Reset every period whose interval has elapsed at `now`.
    ///
    /// The due check and the reset happen under the same `stats` lock, so a
    /// reset applied in between by an alarm is never repeated.
    pub async fn reset_due(
        &self,
        now: DateTime<Utc>,
        schedule: &ScheduleConfig,
    ) -> Result<Vec<Period>> {
        let _guard = self.locks.lock(STATS_KEY).await;

        let mut stats = self.load_stats().await?;
        let due = due_periods(&stats, now, schedule);
        if due.is_empty() {
            return Ok(due);
        }
        for period in &due {
            log::info!(
                "Reset {} emissions ({:.2} g cleared)",
                period,
                stats.emissions_for(*period)
            );
            stats.reset(*period, now);
        }

        storage::save(self.store.as_ref(), STATS_KEY, &stats).await?;
        Ok(due)
    }

    /// Overwrite the global stats with a fresh document.
    pub async fn reset_stats(&self, now: DateTime<Utc>) -> Result<GlobalStats> {
        let _guard = self.locks.lock(STATS_KEY).await;
        let stats = GlobalStats::new(now);
        storage::save(self.store.as_ref(), STATS_KEY, &stats).await?;
        Ok(stats)
    }

    pub async fn load_stats(&self) -> Result<GlobalStats> {
        storage::load_or_default(self.store.as_ref(), STATS_KEY).await
    }

    pub async fn load_site(&self, domain: &str) -> Result<Option<SiteAggregate>> {
        storage::load_optional(self.store.as_ref(), &site_key(domain)).await
    }

    /// Every stored site aggregate, in no particular order.
    pub async fn load_all_sites(&self) -> Result<Vec<SiteAggregate>> {
        let all = self.store.get_all().await?;
        Ok(all
            .into_iter()
            .filter_map(|(key, value)| {
                let domain = key.strip_prefix(SITE_PREFIX)?.to_string();
                let mut site: SiteAggregate = decode_or_default(&key, value);
                if site.domain.is_empty() {
                    site.domain = domain;
                }
                Some(site)
            })
            .collect())
    }

    /// Remove every site aggregate. Returns the number removed.
    ///
    /// Each key is removed under its own lock, one at a time, so an update
    /// in flight finishes before its site is removed.
    pub async fn remove_all_sites(&self) -> Result<usize> {
        let keys: Vec<String> = self
            .store
            .get_all()
            .await?
            .into_keys()
            .filter(|k| k.starts_with(SITE_PREFIX))
            .collect();

        for key in &keys {
            let _guard = self.locks.lock(key).await;
            self.store.remove(&[key.as_str()]).await?;
        }
        Ok(keys.len())
    }
}
