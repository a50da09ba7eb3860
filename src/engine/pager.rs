// src/engine/pager.rs

//! Drives all pages of one search window.
//!
//! The pager re-captures continuation state from every page before
//! advancing; the portal's hidden tokens are single-use. A transport
//! failure mid-window abandons only the remaining pages — rows already
//! collected are kept and returned with the failure recorded.

use std::time::Duration;

use crate::client::{FetchFailure, RequestExecutor};
use crate::models::{EngineConfig, RawRow, SearchWindow};
use crate::site::{FormState, SearchSite};

/// Everything one window's pagination produced.
#[derive(Debug, Default)]
pub struct WindowFetch {
    /// Server-reported total match count (advisory)
    pub reported_total: Option<u64>,

    /// Rows accumulated across all pages reached
    pub rows: Vec<RawRow>,

    /// Pages successfully fetched and parsed
    pub pages: usize,

    /// Transport/rate-limit failure that cut pagination short
    pub failure: Option<FetchFailure>,

    /// Pagination stopped at the per-window page ceiling
    pub hit_page_ceiling: bool,
}

impl WindowFetch {
    /// Whether every page the server exposed was fetched and parsed.
    pub fn is_clean(&self) -> bool {
        self.failure.is_none() && !self.hit_page_ceiling
    }

    /// Whether the fetch ended on a rate-limit block.
    pub fn rate_limited(&self) -> bool {
        matches!(self.failure, Some(FetchFailure::RateLimited { .. }))
    }
}

/// Fetch every page of one window.
pub async fn fetch_window(
    site: &dyn SearchSite,
    executor: &dyn RequestExecutor,
    window: &SearchWindow,
    config: &EngineConfig,
    page_delay: Duration,
) -> WindowFetch {
    let mut fetch = WindowFetch::default();
    let mut continuation = FormState::new();

    for page_index in 0..config.max_pages_per_window {
        if page_index > 0 && !page_delay.is_zero() {
            tokio::time::sleep(page_delay).await;
        }

        let request = site.build_request(window, page_index, &continuation);
        let body = match executor.execute(&request).await {
            Ok(body) => body,
            Err(failure) => {
                log::warn!(
                    "Fetch failed for {} page {}: {} ({} rows kept)",
                    window,
                    page_index + 1,
                    failure,
                    fetch.rows.len()
                );
                fetch.failure = Some(failure);
                return fetch;
            }
        };

        let page = match site.parse_page(&body) {
            Ok(page) => page,
            Err(error) => {
                // Malformed markup is a transport-class failure for this window
                log::warn!(
                    "Unparseable page for {} page {}: {} ({} rows kept)",
                    window,
                    page_index + 1,
                    error,
                    fetch.rows.len()
                );
                fetch.failure = Some(FetchFailure::Transport {
                    message: error.to_string(),
                });
                return fetch;
            }
        };

        if fetch.reported_total.is_none() {
            fetch.reported_total = page.reported_total;
        }
        fetch.rows.extend(page.rows);
        fetch.pages += 1;

        if !page.has_more {
            return fetch;
        }
        continuation = page.continuation;
    }

    log::warn!(
        "Page ceiling ({}) reached for {}; treating window as truncated",
        config.max_pages_per_window,
        window
    );
    fetch.hit_page_ceiling = true;
    fetch
}
