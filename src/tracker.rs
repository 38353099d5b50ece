// src/tracker.rs

//! Tracker application state.
//!
//! Owns the store, the event sink, the per-key locks and the per-tab session
//! cache, and wires inbound host events through the sampler, aggregator and
//! evaluator. Hosts construct one `Tracker` and share it behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::events::{BadgeUpdate, Broadcast, EventSink, OutboundEvent};
use crate::models::{
    Config, GamificationState, GlobalStats, NetworkType, PageEmissionRecord, PageLoad, Period,
    Settings, SiteAggregate, TabId,
};
use crate::services::{
    Aggregator, DashboardSnapshot, EmissionEstimator, Evaluator, ResetScheduler, SiteQuery,
    sampler,
};
use crate::storage::{
    self, GAMIFICATION_KEY, KeyLocks, KeyValueStore, MemoryStore, SETTINGS_KEY, STATS_KEY,
};

/// What the embedding host is able to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapabilities {
    /// Navigation and resource timing entries are available
    pub resource_timing: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            resource_timing: true,
        }
    }
}

/// Everything persisted, as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub stats: GlobalStats,
    pub settings: Settings,
    pub gamification: GamificationState,
    /// Site aggregates keyed by domain
    pub sites: BTreeMap<String, SiteAggregate>,
}

impl ExportDocument {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn tab_key(tab_id: TabId) -> String {
    format!("tab_{}", tab_id)
}

pub struct Tracker {
    store: Arc<dyn KeyValueStore>,
    session: MemoryStore,
    sink: Arc<dyn EventSink>,
    locks: Arc<KeyLocks>,
    config: Config,
    estimator: EmissionEstimator,
    aggregator: Aggregator,
    evaluator: Evaluator,
    tracking_enabled: AtomicBool,
}

impl Tracker {
    pub fn new(store: Arc<dyn KeyValueStore>, sink: Arc<dyn EventSink>, config: Config) -> Self {
        let locks = Arc::new(KeyLocks::new());
        Self {
            aggregator: Aggregator::new(Arc::clone(&store), Arc::clone(&locks)),
            evaluator: Evaluator::new(Arc::clone(&store), Arc::clone(&locks)),
            estimator: EmissionEstimator::from_config(&config.estimator),
            store,
            session: MemoryStore::new(),
            sink,
            locks,
            config,
            tracking_enabled: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// A reset scheduler over this tracker's store.
    pub fn scheduler(&self) -> ResetScheduler {
        ResetScheduler::new(self.aggregator.clone(), self.config.schedule.clone())
    }

    /// Whether `install` has run against this store.
    pub async fn is_installed(&self) -> Result<bool> {
        Ok(!self.store.get(&[STATS_KEY]).await?.is_empty())
    }

    /// Write default settings, fresh statistics and gamification state.
    pub async fn install(&self) -> Result<()> {
        let now = Utc::now();
        let mut items = std::collections::HashMap::new();
        items.insert(
            SETTINGS_KEY.to_string(),
            serde_json::to_value(Settings::default())?,
        );
        items.insert(
            STATS_KEY.to_string(),
            serde_json::to_value(GlobalStats::new(now))?,
        );
        items.insert(
            GAMIFICATION_KEY.to_string(),
            serde_json::to_value(GamificationState::default())?,
        );
        self.store.set(items).await?;

        log::info!("Tracker installed with default settings");
        Ok(())
    }

    /// Check host capabilities. Tracking is disabled when timing data is
    /// unavailable; this is not fatal.
    pub fn start(&self, capabilities: HostCapabilities) -> bool {
        let enabled = capabilities.resource_timing;
        if !enabled {
            log::warn!("Host provides no resource timing data, tracking disabled");
        }
        self.tracking_enabled.store(enabled, Ordering::SeqCst);
        enabled
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking_enabled.load(Ordering::SeqCst)
    }

    /// Handle a completed page load.
    ///
    /// Failures are logged and the visit is dropped.
    pub async fn handle_page_load(&self, load: PageLoad) -> Option<PageEmissionRecord> {
        match self.record_page_load(&load).await {
            Ok(record) => Some(record),
            Err(AppError::Validation(msg)) | Err(AppError::TrackingDisabled(msg)) => {
                log::debug!("Skipping tab {}: {}", load.tab_id, msg);
                None
            }
            Err(e) => {
                log::error!("Failed to record page load for tab {}: {}", load.tab_id, e);
                None
            }
        }
    }

    /// Sample, estimate, aggregate, evaluate and update the tab badge.
    pub async fn record_page_load(&self, load: &PageLoad) -> Result<PageEmissionRecord> {
        if !self.is_tracking() {
            return Err(AppError::TrackingDisabled(load.url.clone()));
        }

        let settings = self.settings().await?;
        let estimator = self.estimator.scaled(settings.energy_multiplier());
        let record = sampler::build_record(load, &estimator, settings.carbon_intensity_factor)?;
        let (_site, stats) = self.aggregator.record_page_visit(&record).await?;

        storage::save(&self.session, &tab_key(load.tab_id), &record).await?;

        for notification in self.evaluator.evaluate(&record, &stats, &settings).await? {
            self.sink.emit(notification.into());
        }
        self.sink
            .emit(BadgeUpdate::for_emissions(load.tab_id, record.estimated_grams).into());

        Ok(record)
    }

    /// Handle a named reset alarm.
    pub async fn handle_alarm(&self, name: &str) -> Result<GlobalStats> {
        let Some(period) = Period::from_alarm(name) else {
            log::warn!("Ignoring unknown alarm '{}'", name);
            return Err(AppError::UnknownAlarm(name.to_string()));
        };
        self.reset_period(period).await
    }

    pub async fn reset_period(&self, period: Period) -> Result<GlobalStats> {
        self.aggregator
            .reset_period(period, Utc::now())
            .await
            .inspect_err(|e| log::error!("Failed to reset {} emissions: {}", period, e))
    }

    /// Last record seen in a tab during this session.
    pub async fn tab_emissions(&self, tab_id: TabId) -> Result<Option<PageEmissionRecord>> {
        let key = tab_key(tab_id);
        let mut values = self.session.get(&[key.as_str()]).await?;
        Ok(values
            .remove(&key)
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    /// Drop the cached record of a closed tab.
    pub async fn forget_tab(&self, tab_id: TabId) -> Result<()> {
        self.session.remove(&[tab_key(tab_id).as_str()]).await
    }

    pub async fn settings(&self) -> Result<Settings> {
        storage::load_or_default(self.store.as_ref(), SETTINGS_KEY).await
    }

    /// Validate and persist new settings, then notify listeners.
    pub async fn update_settings(&self, settings: Settings) -> Result<Settings> {
        settings.validate()?;
        {
            let _guard = self.locks.lock(SETTINGS_KEY).await;
            storage::save(self.store.as_ref(), SETTINGS_KEY, &settings).await?;
        }
        log::info!(
            "Settings updated: region {}, intensity {} gCO2/kWh",
            settings.region,
            settings.carbon_intensity_factor
        );
        self.sink.emit(OutboundEvent::from(Broadcast::SettingsUpdated));
        Ok(settings)
    }

    /// Switch region, taking the intensity from the region table.
    pub async fn set_region(&self, region: &str) -> Result<Settings> {
        let mut settings = self.settings().await?;
        settings.apply_region(region);
        self.update_settings(settings).await
    }

    pub async fn set_network_type(&self, network_type: NetworkType) -> Result<Settings> {
        let mut settings = self.settings().await?;
        settings.network_type = network_type;
        self.update_settings(settings).await
    }

    pub async fn reset_settings(&self) -> Result<Settings> {
        self.update_settings(Settings::default()).await
    }

    /// Remove all site aggregates and reset statistics and gamification.
    /// Settings are kept.
    pub async fn clear_data(&self) -> Result<()> {
        let removed = self.aggregator.remove_all_sites().await?;
        self.aggregator.reset_stats(Utc::now()).await?;
        self.evaluator.reset().await?;
        self.session.clear().await?;

        log::info!("Cleared data for {} sites", removed);
        Ok(())
    }

    pub async fn gamification(&self) -> Result<GamificationState> {
        self.evaluator.load_state().await
    }

    pub async fn sites(&self, query: &SiteQuery) -> Result<Vec<SiteAggregate>> {
        Ok(query.apply(self.aggregator.load_all_sites().await?))
    }

    pub async fn export(&self) -> Result<ExportDocument> {
        let sites = self
            .aggregator
            .load_all_sites()
            .await?
            .into_iter()
            .map(|site| (site.domain.clone(), site))
            .collect();

        Ok(ExportDocument {
            exported_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            stats: self.aggregator.load_stats().await?,
            settings: self.settings().await?,
            gamification: self.gamification().await?,
            sites,
        })
    }

    /// Dashboard view model, optionally focused on a tab's last page.
    pub async fn snapshot(&self, tab_id: Option<TabId>) -> Result<DashboardSnapshot> {
        let current_page = match tab_id {
            Some(id) => self.tab_emissions(id).await?,
            None => None,
        };
        let settings = self.settings().await?;

        Ok(DashboardSnapshot::build(
            self.aggregator.load_stats().await?,
            self.gamification().await?,
            &settings,
            self.aggregator.load_all_sites().await?,
            current_page.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelSink, NotificationKind};
    use crate::models::ResourceTiming;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Reads work, every write fails.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
            self.0.get(keys).await
        }

        async fn get_all(&self) -> Result<HashMap<String, Value>> {
            self.0.get_all().await
        }

        async fn set(&self, items: HashMap<String, Value>) -> Result<()> {
            let key = items.keys().next().cloned().unwrap_or_default();
            Err(AppError::storage(key, "disk full"))
        }

        async fn remove(&self, keys: &[&str]) -> Result<()> {
            Err(AppError::storage(keys.join(","), "disk full"))
        }

        async fn clear(&self) -> Result<()> {
            Err(AppError::storage("*", "disk full"))
        }
    }

    fn read_only_tracker() -> (Tracker, UnboundedReceiver<OutboundEvent>) {
        let (sink, rx) = ChannelSink::channel();
        let tracker = Tracker::new(
            Arc::new(ReadOnlyStore(MemoryStore::new())),
            Arc::new(sink),
            Config::default(),
        );
        (tracker, rx)
    }

    fn tracker() -> (Tracker, UnboundedReceiver<OutboundEvent>) {
        let (sink, rx) = ChannelSink::channel();
        let tracker = Tracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(sink),
            Config::default(),
        );
        (tracker, rx)
    }

    /// A page load of exactly `bytes` in the navigation document.
    fn page_load(tab_id: TabId, url: &str, bytes: u64) -> PageLoad {
        PageLoad {
            tab_id,
            url: url.to_string(),
            title: None,
            navigation: Some(ResourceTiming {
                name: url.to_string(),
                initiator_type: "navigation".to_string(),
                transfer_size: Some(bytes),
                encoded_body_size: None,
            }),
            resources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_install_writes_defaults() {
        let (tracker, _rx) = tracker();
        assert!(!tracker.is_installed().await.unwrap());

        tracker.install().await.unwrap();
        assert!(tracker.is_installed().await.unwrap());
        assert_eq!(tracker.settings().await.unwrap(), Settings::default());
        assert_eq!(tracker.gamification().await.unwrap().level, 1);
    }

    #[tokio::test]
    async fn test_page_load_emits_badge_and_caches_tab() {
        let (tracker, mut rx) = tracker();
        tracker.install().await.unwrap();

        // 50 000 bytes * 0.000006 * 475 = 142.5 g
        let record = tracker
            .handle_page_load(page_load(3, "https://Example.com/a", 50_000))
            .await
            .unwrap();
        assert_eq!(record.domain, "example.com");
        assert!((record.estimated_grams - 142.5).abs() < 1e-9);

        let events = drain(&mut rx);
        assert!(events.contains(&OutboundEvent::Badge(BadgeUpdate {
            tab_id: 3,
            text: "143g".to_string(),
            color: "#F44336".to_string(),
        })));
        assert!(events.iter().any(|e| matches!(
            e,
            OutboundEvent::Notification(n) if n.kind == NotificationKind::HighEmissionPage
        )));

        let cached = tracker.tab_emissions(3).await.unwrap().unwrap();
        assert_eq!(cached, record);
        assert!(tracker.tab_emissions(4).await.unwrap().is_none());

        tracker.forget_tab(3).await.unwrap();
        assert!(tracker.tab_emissions(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_drops_the_visit() {
        let (tracker, mut rx) = read_only_tracker();

        let record = tracker
            .handle_page_load(page_load(1, "https://example.com/", 100))
            .await;
        assert!(record.is_none());
        assert!(drain(&mut rx).is_empty());
        assert!(tracker.tab_emissions(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_fails_the_alarm() {
        let (tracker, _rx) = read_only_tracker();
        assert!(matches!(
            tracker.handle_alarm("weeklyReset").await,
            Err(AppError::Storage { .. })
        ));
    }

    #[tokio::test]
    async fn test_huge_resource_sizes_saturate() {
        let (tracker, mut rx) = tracker();
        tracker.install().await.unwrap();

        let huge = u64::MAX / 2 + 1;
        let mut load = page_load(1, "https://huge.example/", 0);
        load.resources = vec![
            ResourceTiming {
                name: "https://huge.example/a.png".to_string(),
                initiator_type: "img".to_string(),
                transfer_size: Some(huge),
                encoded_body_size: None,
            },
            ResourceTiming {
                name: "https://huge.example/b.png".to_string(),
                initiator_type: "img".to_string(),
                transfer_size: Some(huge),
                encoded_body_size: None,
            },
        ];

        let record = tracker.handle_page_load(load.clone()).await.unwrap();
        assert_eq!(record.total_bytes, u64::MAX);
        assert!(record.estimated_grams.is_finite());
        assert!(tracker.handle_page_load(load).await.is_some());

        let sites = tracker.sites(&SiteQuery::default()).await.unwrap();
        assert_eq!(sites[0].total_bytes, u64::MAX);
        assert_eq!(sites[0].visit_count, 2);
        assert!(!drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_network_type_scales_emissions() {
        let (tracker, _rx) = tracker();
        tracker.install().await.unwrap();

        let wifi = tracker
            .handle_page_load(page_load(1, "https://example.com/", 10_000))
            .await
            .unwrap();
        let settings = tracker.set_network_type(NetworkType::Cellular3g).await.unwrap();
        assert_eq!(settings.network_type, NetworkType::Cellular3g);

        let cellular = tracker
            .handle_page_load(page_load(1, "https://example.com/", 10_000))
            .await
            .unwrap();
        let ratio = cellular.estimated_grams / wifi.estimated_grams;
        assert!((ratio - NetworkType::Cellular3g.energy_factor()).abs() < 1e-9);
        assert!(cellular.estimated_grams > wifi.estimated_grams);
    }

    #[tokio::test]
    async fn test_tab_cache_keeps_title() {
        let (tracker, _rx) = tracker();
        let mut load = page_load(5, "https://example.com/post", 100);
        load.title = Some("A post".to_string());
        tracker.handle_page_load(load).await.unwrap();

        let cached = tracker.tab_emissions(5).await.unwrap().unwrap();
        assert_eq!(cached.title.as_deref(), Some("A post"));
    }

    #[tokio::test]
    async fn test_internal_pages_are_skipped() {
        let (tracker, mut rx) = tracker();
        assert!(
            tracker
                .handle_page_load(page_load(1, "chrome://settings", 10))
                .await
                .is_none()
        );
        assert!(drain(&mut rx).is_empty());
        assert_eq!(tracker.aggregator().load_stats().await.unwrap().total_pages, 0);
    }

    #[tokio::test]
    async fn test_tracking_disabled_without_resource_timing() {
        let (tracker, _rx) = tracker();
        assert!(!tracker.start(HostCapabilities {
            resource_timing: false
        }));
        assert!(
            tracker
                .handle_page_load(page_load(1, "https://example.com/", 10))
                .await
                .is_none()
        );
        assert!(tracker.start(HostCapabilities::default()));
    }

    #[tokio::test]
    async fn test_alarms() {
        let (tracker, _rx) = tracker();
        tracker.install().await.unwrap();
        tracker
            .handle_page_load(page_load(1, "https://example.com/", 100))
            .await
            .unwrap();

        let stats = tracker.handle_alarm("dailyReset").await.unwrap();
        assert_eq!(stats.daily_emissions_grams, 0.0);
        assert!(stats.weekly_emissions_grams > 0.0);

        assert!(matches!(
            tracker.handle_alarm("hourlyReset").await,
            Err(AppError::UnknownAlarm(_))
        ));
    }

    #[tokio::test]
    async fn test_update_settings_broadcasts() {
        let (tracker, mut rx) = tracker();

        let settings = tracker.set_region("fr").await.unwrap();
        assert_eq!(settings.region, "FR");
        assert_eq!(settings.carbon_intensity_factor, 60.0);
        assert_eq!(
            drain(&mut rx),
            vec![OutboundEvent::Broadcast {
                message: Broadcast::SettingsUpdated
            }]
        );

        let invalid = Settings {
            carbon_intensity_factor: -1.0,
            ..Settings::default()
        };
        assert!(tracker.update_settings(invalid).await.is_err());
        assert_eq!(tracker.settings().await.unwrap().region, "FR");

        tracker.reset_settings().await.unwrap();
        assert_eq!(tracker.settings().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_clear_data_keeps_settings() {
        let (tracker, _rx) = tracker();
        tracker.install().await.unwrap();
        tracker.set_region("NO").await.unwrap();
        tracker
            .handle_page_load(page_load(1, "https://a.com/", 100))
            .await
            .unwrap();
        tracker
            .handle_page_load(page_load(2, "https://b.com/", 100))
            .await
            .unwrap();

        tracker.clear_data().await.unwrap();

        assert!(tracker.sites(&SiteQuery::default()).await.unwrap().is_empty());
        let stats = tracker.aggregator().load_stats().await.unwrap();
        assert_eq!(stats.total_pages, 0);
        assert_eq!(stats.total_emissions_grams, 0.0);
        assert_eq!(tracker.gamification().await.unwrap().points, 0);
        assert!(tracker.tab_emissions(1).await.unwrap().is_none());
        assert_eq!(tracker.settings().await.unwrap().region, "NO");
    }

    #[tokio::test]
    async fn test_export_through_local_store() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::open(tmp.path()).await.unwrap());
        let (sink, _rx) = ChannelSink::channel();
        let tracker = Tracker::new(store, Arc::new(sink), Config::default());
        tracker.install().await.unwrap();
        tracker
            .handle_page_load(page_load(1, "https://example.com/", 100))
            .await
            .unwrap();

        let json = tracker.export().await.unwrap().to_json_pretty().unwrap();

        // A fresh tracker over the same directory sees the same data.
        let reopened = Arc::new(LocalStore::open(tmp.path()).await.unwrap());
        let (sink, _rx) = ChannelSink::channel();
        let tracker = Tracker::new(reopened, Arc::new(sink), Config::default());
        let exported = tracker.export().await.unwrap();

        let parsed: ExportDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.sites.keys().collect::<Vec<_>>(),
            exported.sites.keys().collect::<Vec<_>>()
        );
        assert_eq!(parsed.stats.total_pages, exported.stats.total_pages);
        assert_eq!(parsed.sites["example.com"].visit_count, 1);
        assert_eq!(exported.sites["example.com"].total_bytes, 100);
        assert_eq!(parsed.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_snapshot_uses_tab_page() {
        let (tracker, _rx) = tracker();
        tracker.install().await.unwrap();
        tracker
            .handle_page_load(page_load(9, "https://small.example/", 10))
            .await
            .unwrap();

        let snapshot = tracker.snapshot(Some(9)).await.unwrap();
        assert_eq!(snapshot.stats.total_pages, 1);
        assert_eq!(snapshot.top_sites.len(), 1);
        assert_eq!(snapshot.gamification.points, 10);
        assert!(!snapshot.tips.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_page_loads() {
        let (sink, _rx) = ChannelSink::channel();
        let tracker = Arc::new(Tracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(sink),
            Config::default(),
        ));
        tracker.install().await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move {
                    tracker
                        .handle_page_load(page_load(i, "https://same.example/", 10))
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }

        let sites = tracker.sites(&SiteQuery::default()).await.unwrap();
        assert_eq!(sites[0].visit_count, 20);
        assert_eq!(tracker.gamification().await.unwrap().points, 200);
    }
}
