//! Service layer for the emission tracker.
//!
//! This module contains the business logic for:
//! - Byte to CO2e conversion (`EmissionEstimator`)
//! - Resource categorisation and page records (`sampler`)
//! - Per-site and global running totals (`Aggregator`)
//! - Threshold notifications and gamification (`Evaluator`)
//! - Periodic counter resets (`ResetScheduler`)
//! - Dashboard view models (`insights`)

mod aggregator;
mod estimator;
mod evaluator;
pub mod insights;
pub mod sampler;
mod scheduler;

pub use aggregator::Aggregator;
pub use estimator::{ENERGY_PER_BYTE_KWH, EmissionEstimator, EmissionLevel, Equivalents, estimate};
pub use evaluator::{Evaluator, apply_visit, points_for, threshold_notifications};
pub use insights::{DashboardSnapshot, GoalProgress, GoalStatus, SiteQuery, SiteSort};
pub use scheduler::{ResetScheduler, due_periods, next_due};
