// src/pipeline/replay.rs

//! Replay recorded page loads through a tracker.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::PageLoad;
use crate::tracker::Tracker;
use crate::utils::log;

/// Outcome of a replay run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub loaded: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub total_bytes: u64,
    pub total_grams: f64,
}

/// Read a JSON array of page loads from a file.
pub async fn load_page_loads(path: &Path) -> Result<Vec<PageLoad>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Feed page loads to the tracker with bounded concurrency.
pub async fn replay(
    tracker: Arc<Tracker>,
    loads: Vec<PageLoad>,
    concurrency: usize,
) -> ReplaySummary {
    let loaded = loads.len();

    let records: Vec<_> = stream::iter(loads)
        .map(|load| {
            let tracker = Arc::clone(&tracker);
            async move { tracker.handle_page_load(load).await }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let recorded: Vec<_> = records.into_iter().flatten().collect();
    ReplaySummary {
        loaded,
        recorded: recorded.len(),
        skipped: loaded - recorded.len(),
        total_bytes: recorded
            .iter()
            .fold(0u64, |total, r| total.saturating_add(r.total_bytes)),
        total_grams: recorded.iter().map(|r| r.estimated_grams).sum(),
    }
}

/// Replay a file of page loads, applying due resets first.
pub async fn run_replay(tracker: Arc<Tracker>, path: &Path) -> Result<ReplaySummary> {
    log::header("LeafByte replay");

    log::step(1, 2, "Applying due resets");
    let reset = tracker.scheduler().run_due(Utc::now()).await?;
    if !reset.is_empty() {
        log::info(&format!("Applied due resets: {:?}", reset));
    }

    let loads = load_page_loads(path).await?;
    log::info(&format!(
        "Loaded {} page loads from {}",
        loads.len(),
        path.display()
    ));

    log::step(2, 2, "Replaying page loads");
    let concurrency = tracker.config().replay.max_concurrent;
    let summary = replay(Arc::clone(&tracker), loads, concurrency).await;

    log::summary(
        "Replay",
        &[
            ("Page loads", summary.loaded.to_string()),
            ("Recorded", summary.recorded.to_string()),
            ("Skipped", summary.skipped.to_string()),
            ("Bytes", summary.total_bytes.to_string()),
            ("Emissions", format!("{:.2} g CO2e", summary.total_grams)),
        ],
    );
    log::success("Replay complete");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogSink;
    use crate::models::Config;
    use crate::services::SiteQuery;
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    const LOADS: &str = r#"[
        {
            "tabId": 1,
            "url": "https://example.com/",
            "navigation": { "name": "https://example.com/", "initiatorType": "navigation", "transferSize": 1000 },
            "resources": [
                { "name": "https://example.com/app.js", "initiatorType": "script", "transferSize": 500 }
            ]
        },
        { "tabId": 2, "url": "https://example.com/about", "navigation": { "transferSize": 0, "encodedBodySize": 300 } },
        { "tabId": 3, "url": "chrome://newtab" },
        { "tabId": 4, "url": "https://other.org/" }
    ]"#;

    fn tracker() -> Arc<Tracker> {
        Arc::new(Tracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LogSink),
            Config::default(),
        ))
    }

    #[tokio::test]
    async fn test_replay_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("loads.json");
        std::fs::write(&path, LOADS).unwrap();

        let tracker = tracker();
        tracker.install().await.unwrap();
        let summary = run_replay(Arc::clone(&tracker), &path).await.unwrap();

        assert_eq!(summary.loaded, 4);
        assert_eq!(summary.recorded, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_bytes, 1_800);

        let sites = tracker.sites(&SiteQuery::default()).await.unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].domain, "example.com");
        assert_eq!(sites[0].visit_count, 2);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("loads.json");
        std::fs::write(&path, "{ not an array").unwrap();

        assert!(run_replay(tracker(), &path).await.is_err());
    }
}
