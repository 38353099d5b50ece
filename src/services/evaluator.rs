// src/services/evaluator.rs

//! Threshold and achievement evaluation.
//!
//! Runs once per recorded page visit, after aggregation. Threshold checks
//! are pure; gamification is a read-modify-write of the `gamification` key
//! under its lock.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::events::Notification;
use crate::models::{
    ECO_WARRIOR, GamificationState, GlobalStats, PageEmissionRecord, Settings, level_for,
};
use crate::storage::{self, GAMIFICATION_KEY, KeyLocks, KeyValueStore};

/// Points awarded for a page visit of the given emissions.
pub fn points_for(grams: f64) -> u64 {
    if grams < 0.5 {
        10
    } else if grams < 1.0 {
        5
    } else {
        0
    }
}

/// Notifications for crossed page and daily thresholds.
///
/// The daily notification fires on every visit while the total stays above
/// the threshold.
pub fn threshold_notifications(
    record: &PageEmissionRecord,
    stats: &GlobalStats,
    settings: &Settings,
) -> Vec<Notification> {
    if !settings.notifications_enabled {
        return Vec::new();
    }

    let thresholds = &settings.thresholds;
    let mut notifications = Vec::new();
    if record.estimated_grams > thresholds.page {
        notifications.push(Notification::high_emission_page(
            record.estimated_grams,
            thresholds.page,
        ));
    }
    if stats.daily_emissions_grams > thresholds.daily {
        notifications.push(Notification::daily_limit_exceeded(
            stats.daily_emissions_grams,
        ));
    }
    notifications
}

/// Apply one visit to a gamification state, returning what was earned.
pub fn apply_visit(
    state: &mut GamificationState,
    record: &PageEmissionRecord,
) -> Vec<Notification> {
    let mut notifications = Vec::new();

    state.points += points_for(record.estimated_grams);
    state.record_activity(record.timestamp);

    let level = level_for(state.points);
    if level > state.level {
        state.level = level;
        notifications.push(Notification::level_up(level));
    }

    if state.points >= 100 && state.grant_badge(ECO_WARRIOR) {
        notifications.push(Notification::eco_warrior_badge());
    }

    notifications
}

/// Evaluates thresholds and gamification against the store.
#[derive(Clone)]
pub struct Evaluator {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<KeyLocks>,
}

impl Evaluator {
    pub fn new(store: Arc<dyn KeyValueStore>, locks: Arc<KeyLocks>) -> Self {
        Self { store, locks }
    }

    /// All notifications produced by one recorded visit.
    pub async fn evaluate(
        &self,
        record: &PageEmissionRecord,
        stats: &GlobalStats,
        settings: &Settings,
    ) -> Result<Vec<Notification>> {
        let mut notifications = threshold_notifications(record, stats, settings);
        if settings.gamification_enabled {
            notifications.extend(self.update_gamification(record).await?);
        }
        Ok(notifications)
    }

    async fn update_gamification(
        &self,
        record: &PageEmissionRecord,
    ) -> Result<Vec<Notification>> {
        let _guard = self.locks.lock(GAMIFICATION_KEY).await;

        let mut state: GamificationState =
            storage::load_or_default(self.store.as_ref(), GAMIFICATION_KEY).await?;
        let notifications = apply_visit(&mut state, record);
        storage::save(self.store.as_ref(), GAMIFICATION_KEY, &state).await?;

        if !notifications.is_empty() {
            log::info!(
                "Gamification: {} points, level {}, {} badge(s)",
                state.points,
                state.level,
                state.badges.len()
            );
        }
        Ok(notifications)
    }

    pub async fn load_state(&self) -> Result<GamificationState> {
        storage::load_or_default(self.store.as_ref(), GAMIFICATION_KEY).await
    }

    /// Replace the gamification state with a fresh one.
    pub async fn reset(&self) -> Result<GamificationState> {
        let _guard = self.locks.lock(GAMIFICATION_KEY).await;
        let state = GamificationState::default();
        storage::save(self.store.as_ref(), GAMIFICATION_KEY, &state).await?;
        log::debug!("Gamification state reset at {}", Utc::now());
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NotificationKind;
    use crate::storage::MemoryStore;

    fn record(grams: f64) -> PageEmissionRecord {
        PageEmissionRecord::simple("example.com", 1_000, grams, Utc::now())
    }

    fn stats_with_daily(daily: f64) -> GlobalStats {
        GlobalStats {
            daily_emissions_grams: daily,
            ..GlobalStats::default()
        }
    }

    fn kinds(notifications: &[Notification]) -> Vec<NotificationKind> {
        notifications.iter().map(|n| n.kind).collect()
    }

    #[test]
    fn test_points_for() {
        assert_eq!(points_for(0.0), 10);
        assert_eq!(points_for(0.49), 10);
        assert_eq!(points_for(0.5), 5);
        assert_eq!(points_for(0.99), 5);
        assert_eq!(points_for(1.0), 0);
    }

    #[test]
    fn test_page_threshold_is_strictly_greater() {
        let settings = Settings::default();
        let at_threshold = threshold_notifications(&record(1.0), &stats_with_daily(0.0), &settings);
        assert!(at_threshold.is_empty());

        let above = threshold_notifications(&record(1.5), &stats_with_daily(0.0), &settings);
        assert_eq!(kinds(&above), vec![NotificationKind::HighEmissionPage]);
    }

    #[test]
    fn test_daily_threshold_fires_repeatedly() {
        let settings = Settings::default();
        for _ in 0..3 {
            let n = threshold_notifications(&record(0.1), &stats_with_daily(25.0), &settings);
            assert_eq!(kinds(&n), vec![NotificationKind::DailyLimitExceeded]);
        }
    }

    #[test]
    fn test_notifications_disabled() {
        let settings = Settings {
            notifications_enabled: false,
            ..Settings::default()
        };
        let n = threshold_notifications(&record(5.0), &stats_with_daily(50.0), &settings);
        assert!(n.is_empty());
    }

    #[test]
    fn test_level_up_from_95_points() {
        let mut state = GamificationState {
            points: 95,
            ..GamificationState::default()
        };

        let n = apply_visit(&mut state, &record(0.3));
        assert_eq!(state.points, 105);
        assert_eq!(state.level, 2);
        assert_eq!(
            kinds(&n)
                .iter()
                .filter(|k| **k == NotificationKind::LevelUp)
                .count(),
            1
        );
        assert!(state.has_badge(ECO_WARRIOR));

        // Next visit stays on level 2: no second level-up, no second badge.
        let n = apply_visit(&mut state, &record(0.3));
        assert_eq!(state.points, 115);
        assert!(n.is_empty());
    }

    #[test]
    fn test_high_emission_visit_earns_nothing() {
        let mut state = GamificationState::default();
        let n = apply_visit(&mut state, &record(2.0));
        assert_eq!(state.points, 0);
        assert_eq!(state.level, 1);
        assert!(n.is_empty());
        assert_eq!(state.streak, 1);
    }

    #[tokio::test]
    async fn test_evaluate_persists_gamification() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let evaluator = Evaluator::new(Arc::clone(&store), Arc::new(KeyLocks::new()));
        storage::save(
            store.as_ref(),
            GAMIFICATION_KEY,
            &GamificationState {
                points: 95,
                ..GamificationState::default()
            },
        )
        .await
        .unwrap();

        let n = evaluator
            .evaluate(&record(0.3), &stats_with_daily(0.3), &Settings::default())
            .await
            .unwrap();
        assert_eq!(
            kinds(&n),
            vec![NotificationKind::LevelUp, NotificationKind::BadgeEarned]
        );

        let state = evaluator.load_state().await.unwrap();
        assert_eq!(state.points, 105);
        assert_eq!(state.level, 2);
    }

    #[tokio::test]
    async fn test_gamification_disabled_leaves_state_alone() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let evaluator = Evaluator::new(Arc::clone(&store), Arc::new(KeyLocks::new()));
        let settings = Settings {
            gamification_enabled: false,
            ..Settings::default()
        };

        evaluator
            .evaluate(&record(0.1), &stats_with_daily(0.1), &settings)
            .await
            .unwrap();
        assert!(store.get(&[GAMIFICATION_KEY]).await.unwrap().is_empty());
    }
}
