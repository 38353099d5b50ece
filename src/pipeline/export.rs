// src/pipeline/export.rs

//! Export all stored data as one JSON document.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::tracker::{ExportDocument, Tracker};
use crate::utils::log;

/// Write the export document to `output`, or to stdout when absent.
pub async fn run_export(tracker: &Tracker, output: Option<&Path>) -> Result<ExportDocument> {
    let document = tracker.export().await?;
    let json = document.to_json_pretty()?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(path).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;

            log::success(&format!(
                "Exported {} sites to {}",
                document.sites.len(),
                path.display()
            ));
        }
        None => println!("{}", json),
    }

    Ok(document)
}
