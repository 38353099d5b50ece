//! User settings stored under the `settings` key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Grid carbon intensity per region in gCO2/kWh.
pub const REGION_INTENSITY: &[(&str, f64)] = &[
    ("global", 475.0),
    ("US", 400.0),
    ("DE", 350.0),
    ("FR", 60.0),
    ("NO", 20.0),
    ("CN", 650.0),
    ("IN", 700.0),
];

/// Look up the intensity for a region code (case-insensitive).
pub fn region_intensity(region: &str) -> Option<f64> {
    REGION_INTENSITY
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(region))
        .map(|(_, intensity)| *intensity)
}

/// Network the browser is connected over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    #[default]
    #[serde(rename = "wifi")]
    Wifi,
    #[serde(rename = "ethernet")]
    Ethernet,
    #[serde(rename = "4g")]
    Cellular4g,
    #[serde(rename = "5g")]
    Cellular5g,
    #[serde(rename = "3g")]
    Cellular3g,
}

/// Network energy in kWh per GB. Wifi is the reference the base energy
/// factor is calibrated against.
const NETWORK_ENERGY: &[(NetworkType, f64)] = &[
    (NetworkType::Wifi, 0.0038),
    (NetworkType::Ethernet, 0.0035),
    (NetworkType::Cellular4g, 0.0065),
    (NetworkType::Cellular5g, 0.0058),
    (NetworkType::Cellular3g, 0.0082),
];

impl NetworkType {
    pub const ALL: [NetworkType; 5] = [
        NetworkType::Wifi,
        NetworkType::Ethernet,
        NetworkType::Cellular4g,
        NetworkType::Cellular5g,
        NetworkType::Cellular3g,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Wifi => "wifi",
            NetworkType::Ethernet => "ethernet",
            NetworkType::Cellular4g => "4g",
            NetworkType::Cellular5g => "5g",
            NetworkType::Cellular3g => "3g",
        }
    }

    fn energy_per_gb(&self) -> f64 {
        NETWORK_ENERGY
            .iter()
            .find(|(network, _)| network == self)
            .map(|(_, kwh)| *kwh)
            .unwrap_or(defaults::WIFI_ENERGY_PER_GB)
    }

    /// Energy use relative to wifi.
    pub fn energy_factor(&self) -> f64 {
        self.energy_per_gb() / defaults::WIFI_ENERGY_PER_GB
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown network type '{}'", s)))
    }
}

/// User-configurable estimation and notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Grams CO2e per kWh
    pub carbon_intensity_factor: f64,

    /// Region code the intensity was taken from
    pub region: String,

    pub network_type: NetworkType,

    /// Multiplier for the efficiency of the user's device, 0.5 to 2.0
    pub device_factor: f64,

    pub thresholds: Thresholds,

    pub notifications_enabled: bool,

    pub gamification_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            carbon_intensity_factor: defaults::GLOBAL_INTENSITY,
            region: defaults::REGION.to_string(),
            network_type: NetworkType::default(),
            device_factor: defaults::DEVICE_FACTOR,
            thresholds: Thresholds::default(),
            notifications_enabled: true,
            gamification_enabled: true,
        }
    }
}

impl Settings {
    /// Default settings with the intensity of a region.
    ///
    /// Unknown regions fall back to the global average.
    pub fn for_region(region: &str) -> Self {
        let mut settings = Self::default();
        settings.apply_region(region);
        settings
    }

    /// Switch region and take its intensity from the table.
    pub fn apply_region(&mut self, region: &str) {
        match REGION_INTENSITY
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(region))
        {
            Some((code, intensity)) => {
                self.region = code.to_string();
                self.carbon_intensity_factor = *intensity;
            }
            None => {
                log::warn!(
                    "Unknown region '{}', using global intensity {}",
                    region,
                    defaults::GLOBAL_INTENSITY
                );
                self.region = defaults::REGION.to_string();
                self.carbon_intensity_factor = defaults::GLOBAL_INTENSITY;
            }
        }
    }

    /// Scale applied to the base energy per byte.
    pub fn energy_multiplier(&self) -> f64 {
        self.network_type.energy_factor() * self.device_factor
    }

    /// Validate values before persisting user input.
    pub fn validate(&self) -> Result<()> {
        if !self.carbon_intensity_factor.is_finite() || self.carbon_intensity_factor <= 0.0 {
            return Err(AppError::validation(
                "carbonIntensityFactor must be a positive number",
            ));
        }
        if !(defaults::DEVICE_FACTOR_MIN..=defaults::DEVICE_FACTOR_MAX).contains(&self.device_factor)
        {
            return Err(AppError::validation(format!(
                "deviceFactor must be between {} and {}",
                defaults::DEVICE_FACTOR_MIN,
                defaults::DEVICE_FACTOR_MAX
            )));
        }
        self.thresholds.validate()
    }
}

/// Emission thresholds in grams CO2e.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub page: f64,
    pub daily: f64,
    pub weekly: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            page: 1.0,
            daily: 20.0,
            weekly: 140.0,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("page", self.page),
            ("daily", self.daily),
            ("weekly", self.weekly),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "thresholds.{} must be a non-negative number",
                    name
                )));
            }
        }
        Ok(())
    }
}

mod defaults {
    pub const GLOBAL_INTENSITY: f64 = 475.0;
    pub const REGION: &str = "global";
    pub const WIFI_ENERGY_PER_GB: f64 = 0.0038;
    pub const DEVICE_FACTOR: f64 = 1.0;
    pub const DEVICE_FACTOR_MIN: f64 = 0.5;
    pub const DEVICE_FACTOR_MAX: f64 = 2.0;
}
