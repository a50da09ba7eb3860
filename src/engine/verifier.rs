// src/engine/verifier.rs

//! Overlap reconciliation.
//!
//! Each window deliberately re-requests the previous window's boundary day.
//! The rows re-observed there should match the count recorded when that day
//! was first seen; drift means the server reordered results or the remote
//! data changed mid-backfill. Either way it is logged, never fatal.

use crate::engine::pager::WindowFetch;
use crate::engine::planner::WatermarkState;
use crate::models::{RawRow, SearchWindow};

/// Counts and survivors from reconciling one window.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Rows never seen before, in window order; these get emitted
    pub fresh: Vec<RawRow>,

    /// Distinct identifiers not present in the prior window
    pub new_count: usize,

    /// Distinct identifiers shared with the prior window
    pub redundant_count: usize,
}

/// Cross-check one window's identifiers against the previous window's.
///
/// Rows repeated within the window (across pages) are dropped outright;
/// rows already emitted from the prior window are counted as redundant and
/// dropped; everything else survives as `fresh`.
pub fn reconcile(
    state: &mut WatermarkState,
    window: &SearchWindow,
    fetch: WindowFetch,
    expected_redundant: Option<usize>,
) -> Reconciliation {
    let clean = fetch.is_clean();
    let reported_total = fetch.reported_total;
    let collected = fetch.rows.len();

    state.current_window_ids.clear();
    let mut fresh = Vec::new();
    let mut redundant_count = 0usize;

    for row in fetch.rows {
        if !state.current_window_ids.insert(row.identifier.clone()) {
            continue;
        }
        if state.prior_window_ids.contains(&row.identifier) {
            redundant_count += 1;
        } else {
            fresh.push(row);
        }
    }

    let new_count = fresh.len();

    if let Some(expected) = expected_redundant {
        if expected != redundant_count {
            log::warn!(
                "Overlap mismatch for {}: {} redundant rows, expected {} from the shared boundary day",
                window,
                redundant_count,
                expected
            );
        }
    }

    if clean && collected < state.cap() {
        if let Some(total) = reported_total {
            if (total as usize) > collected {
                log::warn!(
                    "Collected {} rows for {} but server reported {} matches",
                    collected,
                    window,
                    total
                );
            }
        }
    }

    state.last_window_new_count = new_count;
    state.last_window_redundant_count = redundant_count;

    Reconciliation {
        fresh,
        new_count,
        redundant_count,
    }
}
