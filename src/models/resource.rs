//! Resource timing entries and their categorised samples.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category a fetched resource is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Html,
    Css,
    Javascript,
    Images,
    Videos,
    Fonts,
    Other,
}

impl ResourceCategory {
    /// All categories in breakdown order.
    pub const ALL: [ResourceCategory; 7] = [
        ResourceCategory::Html,
        ResourceCategory::Css,
        ResourceCategory::Javascript,
        ResourceCategory::Images,
        ResourceCategory::Videos,
        ResourceCategory::Fonts,
        ResourceCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Html => "html",
            ResourceCategory::Css => "css",
            ResourceCategory::Javascript => "javascript",
            ResourceCategory::Images => "images",
            ResourceCategory::Videos => "videos",
            ResourceCategory::Fonts => "fonts",
            ResourceCategory::Other => "other",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource-timing entry as reported by the host browser.
///
/// The navigation entry for the page document has the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceTiming {
    /// Resource URL
    pub name: String,

    /// What triggered the fetch (`script`, `img`, `fetch`, ...)
    pub initiator_type: String,

    /// Bytes transferred over the wire, 0 when served from cache
    pub transfer_size: Option<u64>,

    /// Encoded body size, used when no transfer size is reported
    pub encoded_body_size: Option<u64>,
}

impl ResourceTiming {
    /// Effective byte size: transfer size, falling back to encoded body size.
    pub fn byte_size(&self) -> u64 {
        match self.transfer_size {
            Some(size) if size > 0 => size,
            _ => self.encoded_body_size.unwrap_or(0),
        }
    }
}

/// A single categorised resource captured for a page load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSample {
    pub url: String,
    pub byte_size: u64,
    pub category: ResourceCategory,
    pub timestamp: DateTime<Utc>,
}

/// Bytes per resource category for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBreakdown {
    pub html: u64,
    pub css: u64,
    pub javascript: u64,
    pub images: u64,
    pub videos: u64,
    pub fonts: u64,
    pub other: u64,
}

impl ResourceBreakdown {
    /// Build a breakdown by summing samples per category.
    pub fn from_samples(samples: &[ResourceSample]) -> Self {
        let mut breakdown = Self::default();
        for sample in samples {
            breakdown.add(sample.category, sample.byte_size);
        }
        breakdown
    }

    /// Byte counts saturate at `u64::MAX`.
    pub fn add(&mut self, category: ResourceCategory, bytes: u64) {
        let slot = self.slot_mut(category);
        *slot = slot.saturating_add(bytes);
    }

    pub fn get(&self, category: ResourceCategory) -> u64 {
        match category {
            ResourceCategory::Html => self.html,
            ResourceCategory::Css => self.css,
            ResourceCategory::Javascript => self.javascript,
            ResourceCategory::Images => self.images,
            ResourceCategory::Videos => self.videos,
            ResourceCategory::Fonts => self.fonts,
            ResourceCategory::Other => self.other,
        }
    }

    fn slot_mut(&mut self, category: ResourceCategory) -> &mut u64 {
        match category {
            ResourceCategory::Html => &mut self.html,
            ResourceCategory::Css => &mut self.css,
            ResourceCategory::Javascript => &mut self.javascript,
            ResourceCategory::Images => &mut self.images,
            ResourceCategory::Videos => &mut self.videos,
            ResourceCategory::Fonts => &mut self.fonts,
            ResourceCategory::Other => &mut self.other,
        }
    }

    pub fn total(&self) -> u64 {
        ResourceCategory::ALL
            .iter()
            .fold(0u64, |total, c| total.saturating_add(self.get(*c)))
    }

    /// Share of a category in percent (0.0 when the page has no bytes).
    pub fn percentage(&self, category: ResourceCategory) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.get(category) as f64 / total as f64 * 100.0
    }

    /// Shares of all categories in percent, in breakdown order.
    pub fn percentages(&self) -> Vec<(ResourceCategory, f64)> {
        ResourceCategory::ALL
            .iter()
            .map(|c| (*c, self.percentage(*c)))
            .collect()
    }
}
