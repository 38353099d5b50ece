// src/services/insights.rs

//! Read-only view models for a presentation layer.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{
    GamificationState, GlobalStats, PageEmissionRecord, ResourceCategory, Settings,
    SiteAggregate,
};
use crate::services::EmissionLevel;

/// Maximum number of tips shown at once.
pub const MAX_TIPS: usize = 3;

/// Number of sites in a dashboard snapshot.
pub const TOP_SITES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteSort {
    /// Highest total emissions first
    #[default]
    Emissions,
    /// Most visits first
    Visits,
    Alphabetical,
}

impl FromStr for SiteSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emissions" => Ok(SiteSort::Emissions),
            "visits" => Ok(SiteSort::Visits),
            "alphabetical" | "name" => Ok(SiteSort::Alphabetical),
            _ => Err(AppError::validation(format!("Unknown sort order '{}'", s))),
        }
    }
}

impl fmt::Display for SiteSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SiteSort::Emissions => "emissions",
            SiteSort::Visits => "visits",
            SiteSort::Alphabetical => "alphabetical",
        })
    }
}

/// Filter, order and truncate site aggregates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteQuery {
    /// Keep only sites whose average falls in this level
    pub level: Option<EmissionLevel>,
    pub sort: SiteSort,
    pub limit: Option<usize>,
}

impl SiteQuery {
    pub fn top(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn apply(&self, mut sites: Vec<SiteAggregate>) -> Vec<SiteAggregate> {
        if let Some(level) = self.level {
            sites.retain(|s| EmissionLevel::from_grams(s.average_emissions_grams) == level);
        }

        match self.sort {
            SiteSort::Emissions => sites.sort_by(|a, b| {
                b.total_emissions_grams
                    .partial_cmp(&a.total_emissions_grams)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.domain.cmp(&b.domain))
            }),
            SiteSort::Visits => sites.sort_by(|a, b| {
                b.visit_count
                    .cmp(&a.visit_count)
                    .then_with(|| a.domain.cmp(&b.domain))
            }),
            SiteSort::Alphabetical => sites.sort_by(|a, b| a.domain.cmp(&b.domain)),
        }

        if let Some(limit) = self.limit {
            sites.truncate(limit);
        }
        sites
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalStatus {
    OnTrack,
    CloseToLimit,
    OverLimit,
}

impl GoalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            GoalStatus::OnTrack => "On track",
            GoalStatus::CloseToLimit => "Close to limit",
            GoalStatus::OverLimit => "Over limit",
        }
    }
}

/// Progress of a period total against its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub current_grams: f64,
    pub limit_grams: f64,
    /// Capped at 100
    pub percent: f64,
    pub status: GoalStatus,
}

impl GoalProgress {
    pub fn new(current_grams: f64, limit_grams: f64) -> Self {
        let raw = if limit_grams > 0.0 {
            current_grams / limit_grams * 100.0
        } else if current_grams > 0.0 {
            100.0
        } else {
            0.0
        };
        let status = if raw < 80.0 {
            GoalStatus::OnTrack
        } else if raw < 100.0 {
            GoalStatus::CloseToLimit
        } else {
            GoalStatus::OverLimit
        };

        Self {
            current_grams,
            limit_grams,
            percent: raw.min(100.0),
            status,
        }
    }
}

/// Up to [`MAX_TIPS`] suggestions for the current browsing.
///
/// `top_site` is the site with the highest total emissions.
pub fn eco_tips(
    stats: &GlobalStats,
    current_page: Option<&PageEmissionRecord>,
    top_site: Option<&SiteAggregate>,
) -> Vec<String> {
    let mut tips = Vec::new();

    if stats.daily_emissions_grams > 15.0 {
        tips.push("Consider using an ad blocker to reduce page emissions".to_string());
    }

    if let Some(page) = current_page {
        let breakdown = &page.breakdown_by_category;
        if breakdown.percentage(ResourceCategory::Images) > 40.0 {
            tips.push("This page loads many images - try disabling auto-play media".to_string());
        }
        if breakdown.percentage(ResourceCategory::Javascript) > 30.0 {
            tips.push("Heavy JavaScript detected - consider using reader mode".to_string());
        }
    }

    if let Some(site) = top_site.filter(|s| s.average_emissions_grams > 1.0) {
        tips.push(format!(
            "{} has high emissions - try visiting less frequently",
            site.domain
        ));
    }

    if tips.is_empty() {
        tips.push("Great job! Your browsing has low environmental impact".to_string());
    }

    tips.truncate(MAX_TIPS);
    tips
}

/// Everything a dashboard needs in one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub stats: GlobalStats,
    pub gamification: GamificationState,
    pub daily_goal: GoalProgress,
    pub weekly_goal: GoalProgress,
    pub level_progress: u64,
    pub top_sites: Vec<SiteAggregate>,
    pub tips: Vec<String>,
}

impl DashboardSnapshot {
    pub fn build(
        stats: GlobalStats,
        gamification: GamificationState,
        settings: &Settings,
        sites: Vec<SiteAggregate>,
        current_page: Option<&PageEmissionRecord>,
    ) -> Self {
        let top_sites = SiteQuery::top(TOP_SITES).apply(sites);
        let tips = eco_tips(&stats, current_page, top_sites.first());

        Self {
            daily_goal: GoalProgress::new(stats.daily_emissions_grams, settings.thresholds.daily),
            weekly_goal: GoalProgress::new(
                stats.weekly_emissions_grams,
                settings.thresholds.weekly,
            ),
            level_progress: gamification.level_progress(),
            stats,
            gamification,
            top_sites,
            tips,
        }
    }
}
