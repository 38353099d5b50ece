//! Gamification state: points, level, badges and daily streak.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Badge granted once points first reach [`POINTS_PER_LEVEL`].
pub const ECO_WARRIOR: &str = "eco_warrior";

pub const POINTS_PER_LEVEL: u64 = 100;

/// Level for a point total: `floor(points / 100) + 1`.
pub fn level_for(points: u64) -> u64 {
    points / POINTS_PER_LEVEL + 1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GamificationState {
    pub points: u64,
    pub level: u64,
    pub badges: BTreeSet<String>,
    pub streak: u32,
    pub last_active_day: Option<DateTime<Utc>>,
}

impl Default for GamificationState {
    fn default() -> Self {
        Self {
            points: 0,
            level: 1,
            badges: BTreeSet::new(),
            streak: 0,
            last_active_day: None,
        }
    }
}

impl GamificationState {
    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.contains(badge)
    }

    /// Grant a badge. Returns `true` only the first time.
    pub fn grant_badge(&mut self, badge: &str) -> bool {
        self.badges.insert(badge.to_string())
    }

    /// Progress towards the next level in points (0..100).
    pub fn level_progress(&self) -> u64 {
        self.points % POINTS_PER_LEVEL
    }

    /// Record activity at `at` and update the daily streak.
    ///
    /// Same UTC day keeps the streak, the next day extends it, anything
    /// else starts over at 1.
    pub fn record_activity(&mut self, at: DateTime<Utc>) {
        let today = at.date_naive();
        self.streak = match self.last_active_day.map(|d| d.date_naive()) {
            Some(last) if last == today => self.streak.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.streak + 1,
            _ => 1,
        };
        self.last_active_day = Some(at);
    }
}
