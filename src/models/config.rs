//! Application configuration structures.

use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Period;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Byte to energy conversion
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Rolling counter reset intervals
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Page load replay behavior
    #[serde(default)]
    pub replay: ReplayConfig,

    /// On-disk key-value store
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Write configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let energy = self.estimator.energy_per_byte_kwh;
        if !energy.is_finite() || energy <= 0.0 {
            return Err(AppError::validation(
                "estimator.energy_per_byte_kwh must be > 0",
            ));
        }
        if self.schedule.daily_hours == 0 {
            return Err(AppError::validation("schedule.daily_hours must be > 0"));
        }
        if self.schedule.weekly_days == 0 {
            return Err(AppError::validation("schedule.weekly_days must be > 0"));
        }
        if self.schedule.monthly_days == 0 {
            return Err(AppError::validation("schedule.monthly_days must be > 0"));
        }
        if self.replay.max_concurrent == 0 {
            return Err(AppError::validation("replay.max_concurrent must be > 0"));
        }
        if self.store.file_name.trim().is_empty() {
            return Err(AppError::validation("store.file_name is empty"));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// Estimator constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// kWh consumed per transferred byte
    #[serde(default = "defaults::energy_per_byte")]
    pub energy_per_byte_kwh: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            energy_per_byte_kwh: defaults::energy_per_byte(),
        }
    }
}

/// Fixed reset intervals, measured from install or the last reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::daily_hours")]
    pub daily_hours: u32,

    #[serde(default = "defaults::weekly_days")]
    pub weekly_days: u32,

    #[serde(default = "defaults::monthly_days")]
    pub monthly_days: u32,
}

impl ScheduleConfig {
    /// Interval after which a period's counter is reset.
    pub fn interval(&self, period: Period) -> Duration {
        match period {
            Period::Daily => Duration::hours(i64::from(self.daily_hours)),
            Period::Weekly => Duration::days(i64::from(self.weekly_days)),
            Period::Monthly => Duration::days(i64::from(self.monthly_days)),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_hours: defaults::daily_hours(),
            weekly_days: defaults::weekly_days(),
            monthly_days: defaults::monthly_days(),
        }
    }
}

/// Replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Maximum page loads processed at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// File name of the store document inside the storage directory
    #[serde(default = "defaults::store_file")]
    pub file_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file_name: defaults::store_file(),
        }
    }
}

mod defaults {
    use crate::services::ENERGY_PER_BYTE_KWH;

    pub fn log_level() -> String {
        "info".into()
    }
    pub fn energy_per_byte() -> f64 {
        ENERGY_PER_BYTE_KWH
    }
    pub fn daily_hours() -> u32 {
        24
    }
    pub fn weekly_days() -> u32 {
        7
    }
    pub fn monthly_days() -> u32 {
        30
    }
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn store_file() -> String {
        "store.json".into()
    }
}
