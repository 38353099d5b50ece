// src/models/mod.rs

//! Domain models for the emission tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod aggregate;
mod config;
mod gamification;
mod record;
mod resource;
mod settings;

// Re-export all public types
pub use aggregate::{GlobalStats, Period, SiteAggregate};
pub use config::{
    Config, EstimatorConfig, LoggingConfig, ReplayConfig, ScheduleConfig, StoreConfig,
};
pub use gamification::{ECO_WARRIOR, GamificationState, POINTS_PER_LEVEL, level_for};
pub use record::{PageEmissionRecord, PageLoad, TabId};
pub use resource::{ResourceBreakdown, ResourceCategory, ResourceSample, ResourceTiming};
pub use settings::{NetworkType, REGION_INTENSITY, Settings, Thresholds, region_intensity};
