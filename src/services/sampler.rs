// src/services/sampler.rs

//! Resource sampler.
//!
//! Turns the navigation and resource-timing entries of a completed page
//! load into categorised samples and a [`PageEmissionRecord`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::models::{
    PageEmissionRecord, PageLoad, ResourceBreakdown, ResourceCategory, ResourceSample,
    ResourceTiming,
};
use crate::services::EmissionEstimator;
use crate::utils::{trackable_domain, url_path};

/// Checked top to bottom; the first match wins, unmatched is html.
///
/// Each entry is `(category, path pattern, initiator types)`.
const RULES: &[(ResourceCategory, Option<&str>, &[&str])] = &[
    (ResourceCategory::Css, Some(r"(?i)\.css$"), &[]),
    (
        ResourceCategory::Javascript,
        Some(r"(?i)\.(js|jsx|ts|tsx)$"),
        &["script"],
    ),
    (
        ResourceCategory::Images,
        Some(r"(?i)\.(jpg|jpeg|png|gif|webp|svg|ico|bmp)$"),
        &["img"],
    ),
    (
        ResourceCategory::Videos,
        Some(r"(?i)\.(mp4|webm|avi|mov|wmv|flv)$"),
        &["video"],
    ),
    (
        ResourceCategory::Fonts,
        Some(r"(?i)\.(woff|woff2|ttf|otf|eot)$"),
        &[],
    ),
    (ResourceCategory::Other, None, &["xmlhttprequest", "fetch"]),
];

struct CategoryRule {
    category: ResourceCategory,
    path_pattern: Option<Regex>,
    initiators: &'static [&'static str],
}

impl CategoryRule {
    fn matches(&self, path: &str, initiator: &str) -> bool {
        self.path_pattern.as_ref().is_some_and(|re| re.is_match(path))
            || self.initiators.contains(&initiator)
    }
}

static COMPILED_RULES: LazyLock<Vec<CategoryRule>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(category, pattern, initiators)| CategoryRule {
            category: *category,
            path_pattern: pattern.and_then(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    log::error!("Invalid category pattern {}: {}", p, e);
                    None
                }
            }),
            initiators,
        })
        .collect()
});

/// Assign exactly one category to a resource.
pub fn categorize(url: &str, initiator_type: &str) -> ResourceCategory {
    let path = url_path(url);
    let initiator = initiator_type.to_lowercase();
    COMPILED_RULES
        .iter()
        .find(|rule| rule.matches(&path, &initiator))
        .map(|rule| rule.category)
        .unwrap_or(ResourceCategory::Html)
}

/// Samples for every resource of a page load, navigation document first.
pub fn sample(load: &PageLoad) -> Vec<ResourceSample> {
    let navigation = load.navigation.iter().map(|nav| ResourceSample {
        url: if nav.name.is_empty() {
            load.url.clone()
        } else {
            nav.name.clone()
        },
        byte_size: nav.byte_size(),
        category: ResourceCategory::Html,
        timestamp: load.timestamp,
    });

    let resources = load.resources.iter().map(|entry: &ResourceTiming| ResourceSample {
        url: entry.name.clone(),
        byte_size: entry.byte_size(),
        category: categorize(&entry.name, &entry.initiator_type),
        timestamp: load.timestamp,
    });

    navigation.chain(resources).collect()
}

/// Build the emission record for a page load.
///
/// Fails for pages that are not tracked (non-http schemes, no host).
pub fn build_record(
    load: &PageLoad,
    estimator: &EmissionEstimator,
    carbon_intensity_factor: f64,
) -> Result<PageEmissionRecord> {
    let domain = trackable_domain(&load.url)?;
    let samples = sample(load);
    let breakdown = ResourceBreakdown::from_samples(&samples);
    let total_bytes = breakdown.total();

    log::debug!(
        "Sampled {} resources ({} bytes) for {}",
        samples.len(),
        total_bytes,
        domain
    );

    Ok(PageEmissionRecord {
        page_url: load.url.clone(),
        title: load.title.clone(),
        domain,
        total_bytes,
        estimated_grams: estimator.grams(total_bytes, carbon_intensity_factor),
        breakdown_by_category: breakdown,
        timestamp: load.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(name: &str, initiator: &str, transfer: u64) -> ResourceTiming {
        ResourceTiming {
            name: name.to_string(),
            initiator_type: initiator.to_string(),
            transfer_size: Some(transfer),
            encoded_body_size: None,
        }
    }

    fn page_load(resources: Vec<ResourceTiming>) -> PageLoad {
        PageLoad {
            tab_id: 1,
            url: "https://example.com/article".to_string(),
            title: None,
            navigation: Some(ResourceTiming {
                name: "https://example.com/article".to_string(),
                initiator_type: "navigation".to_string(),
                transfer_size: Some(0),
                encoded_body_size: Some(5_000),
            }),
            resources,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_categorize_by_extension() {
        assert_eq!(categorize("https://a.com/s.css", "link"), ResourceCategory::Css);
        assert_eq!(categorize("https://a.com/app.tsx", "other"), ResourceCategory::Javascript);
        assert_eq!(categorize("https://a.com/p.WEBP", "other"), ResourceCategory::Images);
        assert_eq!(categorize("https://a.com/v.mp4", "other"), ResourceCategory::Videos);
        assert_eq!(categorize("https://a.com/f.woff2", "css"), ResourceCategory::Fonts);
    }

    #[test]
    fn test_categorize_by_initiator() {
        assert_eq!(categorize("https://a.com/bundle", "script"), ResourceCategory::Javascript);
        assert_eq!(categorize("https://a.com/pixel", "img"), ResourceCategory::Images);
        assert_eq!(categorize("https://a.com/stream", "video"), ResourceCategory::Videos);
        assert_eq!(categorize("https://a.com/api", "fetch"), ResourceCategory::Other);
        assert_eq!(categorize("https://a.com/api", "xmlhttprequest"), ResourceCategory::Other);
        assert_eq!(categorize("https://a.com/frame", "iframe"), ResourceCategory::Html);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // A stylesheet fetched by script is still css.
        assert_eq!(categorize("https://a.com/theme.css", "script"), ResourceCategory::Css);
        // An image fetched via fetch() is still an image.
        assert_eq!(categorize("https://a.com/photo.png", "fetch"), ResourceCategory::Images);
        // Script initiator outranks a video extension.
        assert_eq!(categorize("https://a.com/clip.mp4", "script"), ResourceCategory::Javascript);
    }

    #[test]
    fn test_sample_puts_navigation_first() {
        let load = page_load(vec![
            entry("https://example.com/a.css", "link", 1_000),
            entry("https://example.com/b.js", "script", 2_000),
        ]);

        let samples = sample(&load);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].category, ResourceCategory::Html);
        assert_eq!(samples[0].byte_size, 5_000);
        assert_eq!(samples[1].category, ResourceCategory::Css);
        assert_eq!(samples[2].category, ResourceCategory::Javascript);
    }

    #[test]
    fn test_build_record_totals_and_breakdown() {
        let load = page_load(vec![
            entry("https://example.com/a.css", "link", 1_000),
            entry("https://example.com/hero.jpg", "img", 4_000),
        ]);

        let record = build_record(&load, &EmissionEstimator::new(0.000000006), 475.0).unwrap();
        assert_eq!(record.domain, "example.com");
        assert_eq!(record.total_bytes, 10_000);
        assert_eq!(record.breakdown_by_category.html, 5_000);
        assert_eq!(record.breakdown_by_category.images, 4_000);
        assert!((record.estimated_grams - 10_000.0 * 0.000000006 * 475.0).abs() < 1e-12);
    }

    #[test]
    fn test_build_record_rejects_internal_pages() {
        let mut load = page_load(vec![]);
        load.url = "chrome://newtab".to_string();
        assert!(build_record(&load, &EmissionEstimator::default(), 475.0).is_err());
    }
}
