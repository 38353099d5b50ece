//! Page loads and the emission records derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ResourceBreakdown, ResourceTiming};

/// Browser tab identifier.
pub type TabId = i64;

/// A completed page load reported by the host browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoad {
    pub tab_id: TabId,

    /// Final URL after redirects
    pub url: String,

    /// Tab title at load time
    #[serde(default)]
    pub title: Option<String>,

    /// Navigation entry for the document itself
    #[serde(default)]
    pub navigation: Option<ResourceTiming>,

    /// Resource entries fetched during the load
    #[serde(default)]
    pub resources: Vec<ResourceTiming>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Estimated emissions for one page visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEmissionRecord {
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub domain: String,
    pub total_bytes: u64,
    pub estimated_grams: f64,
    pub breakdown_by_category: ResourceBreakdown,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
impl PageEmissionRecord {
    /// A record attributing all bytes to html.
    pub(crate) fn simple(
        domain: impl Into<String>,
        total_bytes: u64,
        estimated_grams: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let domain = domain.into();
        let breakdown = ResourceBreakdown {
            html: total_bytes,
            ..ResourceBreakdown::default()
        };
        Self {
            page_url: format!("https://{}/", domain),
            title: None,
            domain,
            total_bytes,
            estimated_grams,
            breakdown_by_category: breakdown,
            timestamp,
        }
    }
}
