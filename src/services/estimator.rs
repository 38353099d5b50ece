// src/services/estimator.rs

//! Emission estimator.
//!
//! Converts transferred bytes into energy and then into grams CO2e using
//! static factors: `kWh = bytes * energy_per_byte`, `g = kWh * intensity`.
//! There is no live grid data and no hidden state, so the same inputs always
//! give the same output.

use serde::{Deserialize, Serialize};

use crate::models::{EstimatorConfig, ResourceBreakdown, ResourceCategory};

/// Energy consumed per transferred byte in kWh.
pub const ENERGY_PER_BYTE_KWH: f64 = 0.000006;

/// Grams CO2e for `total_bytes` at the default energy factor.
pub fn estimate(total_bytes: u64, carbon_intensity_factor: f64) -> f64 {
    EmissionEstimator::default().grams(total_bytes, carbon_intensity_factor)
}

/// Byte to CO2e converter with a configurable energy factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionEstimator {
    energy_per_byte_kwh: f64,
}

impl Default for EmissionEstimator {
    fn default() -> Self {
        Self::new(ENERGY_PER_BYTE_KWH)
    }
}

impl EmissionEstimator {
    /// Non-positive or non-finite factors are treated as zero.
    pub fn new(energy_per_byte_kwh: f64) -> Self {
        Self {
            energy_per_byte_kwh: non_negative(energy_per_byte_kwh),
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(config.energy_per_byte_kwh)
    }

    /// The same estimator with its energy factor multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.energy_per_byte_kwh * non_negative(factor))
    }

    pub fn energy_per_byte_kwh(&self) -> f64 {
        self.energy_per_byte_kwh
    }

    /// Energy in kWh for a byte count.
    pub fn energy_kwh(&self, total_bytes: u64) -> f64 {
        total_bytes as f64 * self.energy_per_byte_kwh
    }

    /// Grams CO2e for a byte count.
    pub fn grams(&self, total_bytes: u64, carbon_intensity_factor: f64) -> f64 {
        self.energy_kwh(total_bytes) * non_negative(carbon_intensity_factor)
    }

    /// Grams CO2e per category, in breakdown order.
    pub fn breakdown_grams(
        &self,
        breakdown: &ResourceBreakdown,
        carbon_intensity_factor: f64,
    ) -> Vec<(ResourceCategory, f64)> {
        ResourceCategory::ALL
            .iter()
            .map(|c| (*c, self.grams(breakdown.get(*c), carbon_intensity_factor)))
            .collect()
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Everyday equivalents for an emission figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equivalents {
    pub car_km: f64,
    pub tree_days: f64,
    pub smartphone_charges: f64,
    pub flight_km: f64,
    pub beef_kg: f64,
}

mod factors {
    // grams CO2e per unit
    pub const CAR_PER_KM: f64 = 192.0;
    pub const TREE_PER_YEAR: f64 = 21_770.0;
    pub const SMARTPHONE_CHARGE: f64 = 85.0;
    pub const FLIGHT_PER_KM: f64 = 115.0;
    pub const BEEF_PER_KG: f64 = 26_000.0;
}

impl Equivalents {
    pub fn from_grams(grams: f64) -> Self {
        let grams = non_negative(grams);
        Self {
            car_km: grams / factors::CAR_PER_KM,
            tree_days: grams / (factors::TREE_PER_YEAR / 365.0),
            smartphone_charges: grams / factors::SMARTPHONE_CHARGE,
            flight_km: grams / factors::FLIGHT_PER_KM,
            beef_kg: grams / factors::BEEF_PER_KG,
        }
    }
}

/// Coarse impact class of a page or site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionLevel {
    Low,
    Medium,
    High,
}

impl EmissionLevel {
    pub const LOW_BELOW_GRAMS: f64 = 0.5;
    pub const MEDIUM_BELOW_GRAMS: f64 = 1.0;

    pub fn from_grams(grams: f64) -> Self {
        if grams < Self::LOW_BELOW_GRAMS {
            EmissionLevel::Low
        } else if grams < Self::MEDIUM_BELOW_GRAMS {
            EmissionLevel::Medium
        } else {
            EmissionLevel::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmissionLevel::Low => "Low Impact",
            EmissionLevel::Medium => "Medium Impact",
            EmissionLevel::High => "High Impact",
        }
    }

    /// Badge background colour.
    pub fn color(&self) -> &'static str {
        match self {
            EmissionLevel::Low => "#4CAF50",
            EmissionLevel::Medium => "#FF9800",
            EmissionLevel::High => "#F44336",
        }
    }
}

impl std::str::FromStr for EmissionLevel {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(EmissionLevel::Low),
            "medium" => Ok(EmissionLevel::Medium),
            "high" => Ok(EmissionLevel::High),
            _ => Err(crate::error::AppError::validation(format!(
                "Unknown emission level '{}'",
                s
            ))),
        }
    }
}
