//! Running per-site and global emission aggregates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::PageEmissionRecord;

/// Running totals for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteAggregate {
    pub domain: String,
    pub visit_count: u64,
    pub total_emissions_grams: f64,
    pub total_bytes: u64,
    pub last_visit_timestamp: Option<DateTime<Utc>>,
    pub average_emissions_grams: f64,
}

impl Default for SiteAggregate {
    fn default() -> Self {
        Self::new("")
    }
}

impl SiteAggregate {
    /// An empty aggregate for a domain that has not been visited yet.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            visit_count: 0,
            total_emissions_grams: 0.0,
            total_bytes: 0,
            last_visit_timestamp: None,
            average_emissions_grams: 0.0,
        }
    }

    /// Fold one page visit into the aggregate.
    pub fn apply(&mut self, record: &PageEmissionRecord) {
        self.visit_count += 1;
        self.total_bytes = self.total_bytes.saturating_add(record.total_bytes);
        self.total_emissions_grams += record.estimated_grams;
        self.average_emissions_grams = self.total_emissions_grams / self.visit_count as f64;
        self.last_visit_timestamp = Some(record.timestamp);
    }
}

/// Global totals plus the period counters that reset on a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalStats {
    pub total_emissions_grams: f64,
    pub total_pages: u64,
    pub daily_emissions_grams: f64,
    pub weekly_emissions_grams: f64,
    pub monthly_emissions_grams: f64,
    pub last_reset_daily: DateTime<Utc>,
    pub last_reset_weekly: DateTime<Utc>,
    pub last_reset_monthly: DateTime<Utc>,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl GlobalStats {
    /// Fresh statistics whose reset clocks start at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_emissions_grams: 0.0,
            total_pages: 0,
            daily_emissions_grams: 0.0,
            weekly_emissions_grams: 0.0,
            monthly_emissions_grams: 0.0,
            last_reset_daily: now,
            last_reset_weekly: now,
            last_reset_monthly: now,
        }
    }

    /// Add one page visit to every counter.
    pub fn apply(&mut self, record: &PageEmissionRecord) {
        let grams = record.estimated_grams;
        self.total_emissions_grams += grams;
        self.daily_emissions_grams += grams;
        self.weekly_emissions_grams += grams;
        self.monthly_emissions_grams += grams;
        self.total_pages += 1;
    }

    /// Zero the counter for a period and restart its clock.
    pub fn reset(&mut self, period: Period, now: DateTime<Utc>) {
        match period {
            Period::Daily => {
                self.daily_emissions_grams = 0.0;
                self.last_reset_daily = now;
            }
            Period::Weekly => {
                self.weekly_emissions_grams = 0.0;
                self.last_reset_weekly = now;
            }
            Period::Monthly => {
                self.monthly_emissions_grams = 0.0;
                self.last_reset_monthly = now;
            }
        }
    }

    pub fn emissions_for(&self, period: Period) -> f64 {
        match period {
            Period::Daily => self.daily_emissions_grams,
            Period::Weekly => self.weekly_emissions_grams,
            Period::Monthly => self.monthly_emissions_grams,
        }
    }

    pub fn last_reset(&self, period: Period) -> DateTime<Utc> {
        match period {
            Period::Daily => self.last_reset_daily,
            Period::Weekly => self.last_reset_weekly,
            Period::Monthly => self.last_reset_monthly,
        }
    }
}

/// Reset period for the rolling counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

    /// Name of the host alarm that triggers this reset.
    pub fn alarm_name(&self) -> &'static str {
        match self {
            Period::Daily => "dailyReset",
            Period::Weekly => "weeklyReset",
            Period::Monthly => "monthlyReset",
        }
    }

    /// Map a host alarm name back to its period.
    pub fn from_alarm(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.alarm_name() == name)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            _ => Period::from_alarm(s)
                .ok_or_else(|| AppError::validation(format!("Unknown period '{}'", s))),
        }
    }
}
