//! Utility functions and helpers.

pub mod log;

use url::Url;

use crate::error::{AppError, Result};

/// Domain of a page that should be tracked.
///
/// Only http(s) pages with a host are tracked; browser-internal pages
/// (`chrome://`, `about:`, `file://`) are rejected.
pub fn trackable_domain(url_str: &str) -> Result<String> {
    let url = Url::parse(url_str)
        .map_err(|e| AppError::validation(format!("Invalid page URL {}: {}", url_str, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::validation(format!(
            "Not a trackable page: {}",
            url_str
        )));
    }
    url.host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| AppError::validation(format!("Page has no host: {}", url_str)))
}

/// Path component of a URL without query or fragment.
///
/// Relative or unparsable URLs are cut at the first `?` or `#`.
pub fn url_path(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(url) => url.path().to_string(),
        Err(_) => url_str
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}
