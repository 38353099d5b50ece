// src/pipeline/report.rs

//! Console report of the current dashboard state.

use crate::error::Result;
use crate::services::{DashboardSnapshot, EmissionLevel, Equivalents, GoalProgress, SiteQuery};
use crate::tracker::Tracker;
use crate::utils::log;

const BAR_WIDTH: usize = 20;

/// Print statistics, goals, gamification, sites and tips.
pub async fn run_report(tracker: &Tracker, query: &SiteQuery) -> Result<DashboardSnapshot> {
    let snapshot = tracker.snapshot(None).await?;
    let sites = tracker.sites(query).await?;
    let stats = &snapshot.stats;

    log::header("LeafByte report");

    let equivalents = Equivalents::from_grams(stats.total_emissions_grams);
    log::summary(
        "Emissions",
        &[
            ("Total", format!("{:.2} g CO2e", stats.total_emissions_grams)),
            ("Pages", stats.total_pages.to_string()),
            ("Today", format!("{:.2} g", stats.daily_emissions_grams)),
            ("This week", format!("{:.2} g", stats.weekly_emissions_grams)),
            ("This month", format!("{:.2} g", stats.monthly_emissions_grams)),
            ("Car equivalent", format!("{:.3} km", equivalents.car_km)),
            (
                "Smartphone charges",
                format!("{:.2}", equivalents.smartphone_charges),
            ),
        ],
    );

    log::summary(
        "Goals",
        &[
            ("Daily", goal_line(&snapshot.daily_goal)),
            ("Weekly", goal_line(&snapshot.weekly_goal)),
        ],
    );

    let gamification = &snapshot.gamification;
    log::summary(
        "Progress",
        &[
            ("Level", gamification.level.to_string()),
            ("Points", gamification.points.to_string()),
            (
                "Next level",
                format!("{}/100", snapshot.level_progress),
            ),
            ("Streak", format!("{} day(s)", gamification.streak)),
            (
                "Badges",
                if gamification.badges.is_empty() {
                    "none".to_string()
                } else {
                    gamification
                        .badges
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                },
            ),
        ],
    );

    println!();
    log::info(&format!("Sites ({}, sorted by {})", sites.len(), query.sort));
    if sites.is_empty() {
        log::sub_item("No sites recorded yet");
    }
    for site in &sites {
        let level = EmissionLevel::from_grams(site.average_emissions_grams);
        log::sub_item(&format!(
            "{:<32} {:>5} visits {:>10.2} g  avg {:.2} g  {}",
            site.domain,
            site.visit_count,
            site.total_emissions_grams,
            site.average_emissions_grams,
            level.label()
        ));
    }

    println!();
    log::info("Tips");
    for tip in &snapshot.tips {
        log::sub_item(tip);
    }

    Ok(snapshot)
}

fn goal_line(goal: &GoalProgress) -> String {
    format!(
        "{} {:>5.1}% ({:.2} / {} g) {}",
        log::bar(goal.percent, BAR_WIDTH),
        goal.percent,
        goal.current_grams,
        goal.limit_grams,
        goal.status.label()
    )
}
