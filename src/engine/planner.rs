// src/engine/planner.rs

//! Window planning and watermark tracking.
//!
//! The planner owns the shrinking upper boundary of the unsearched range.
//! Each processed window moves `current_end` down to the oldest filed date
//! observed; the next window re-requests that boundary day so the verifier
//! can confirm nothing was lost at the cut point.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::engine::pager::WindowFetch;
use crate::engine::retry::RetryController;
use crate::models::{EngineConfig, SearchWindow};

/// Outcome of advancing the watermark over one window's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceReport {
    /// The watermark moved strictly downward
    pub progressed: bool,

    /// The window cleanly contained everything left in range
    pub done: bool,

    /// A day whose result set is provably incomplete (cap saturated)
    pub unreliable_day: Option<NaiveDate>,

    /// Rows observed on the final boundary day of this window
    pub boundary_day_count: usize,
}

/// Per-scope backfill state, exclusively owned by one scope worker.
#[derive(Debug)]
pub struct WatermarkState {
    pub scope: String,

    /// Fixed lower bound of the whole run
    pub start: NaiveDate,

    /// Oldest date not yet fully searched; monotonically non-increasing
    pub current_end: NaiveDate,

    /// Permits the single extra `start == current_end` window
    overlap_start: bool,

    /// Identifiers seen in the previous window
    pub prior_window_ids: HashSet<String>,

    /// Identifiers seen in the window being processed
    pub current_window_ids: HashSet<String>,

    /// Transient-empty retry budget
    pub retry: RetryController,

    pub last_window_new_count: usize,
    pub last_window_redundant_count: usize,

    boundary_day_count: usize,
    windows_processed: usize,
    cap: usize,
}

impl WatermarkState {
    pub fn new(
        scope: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        engine: &EngineConfig,
    ) -> Self {
        Self {
            scope: scope.into(),
            start,
            current_end: end,
            overlap_start: true,
            prior_window_ids: HashSet::new(),
            current_window_ids: HashSet::new(),
            retry: RetryController::new(engine.max_retries, engine.retry_backoff_secs),
            last_window_new_count: 0,
            last_window_redundant_count: 0,
            boundary_day_count: 0,
            windows_processed: 0,
            cap: engine.max_results_per_window,
        }
    }

    /// The next window to submit, or `None` when the range is exhausted.
    ///
    /// When the watermark has reached `start`, the one-shot overlap flag
    /// permits exactly one more single-day window; without it a
    /// `start == end` backfill would never issue a request at all. The
    /// flag is consumed by [`advance`](Self::advance), not here, so a
    /// retried window is re-planned identically.
    pub fn next_window(&self) -> Option<SearchWindow> {
        if self.start < self.current_end {
            Some(SearchWindow::new(
                self.scope.clone(),
                self.start,
                self.current_end,
            ))
        } else if self.overlap_start {
            Some(SearchWindow::new(self.scope.clone(), self.start, self.start))
        } else {
            None
        }
    }

    /// Expected redundant-row count for the window about to be reconciled.
    ///
    /// This is the previous window's boundary-day count; `None` before any
    /// window has been processed. Must be read before [`advance`](Self::advance)
    /// overwrites it.
    pub fn expected_redundant(&self) -> Option<usize> {
        if self.windows_processed > 0 {
            Some(self.boundary_day_count)
        } else {
            None
        }
    }

    /// Fold one window's rows into the watermark.
    pub fn advance(&mut self, window: &SearchWindow, fetch: &WindowFetch) -> AdvanceReport {
        let previous_end = self.current_end;
        let mut boundary = 0usize;

        for row in &fetch.rows {
            let Some(date) = row.filed_date() else {
                continue;
            };
            if date < self.current_end {
                // First sighting of a strictly older boundary
                self.current_end = date;
                boundary = 1;
            } else {
                boundary += 1;
            }
        }

        let mut progressed = self.current_end < previous_end;
        let mut unreliable_day = None;

        let clean = fetch.is_clean();
        let capped = fetch.rows.len() >= self.cap
            || fetch
                .reported_total
                .is_some_and(|total| total as usize >= self.cap);

        if window.is_single_day() {
            self.overlap_start = false;
            if capped {
                // A single day cannot be subdivided further; its results
                // are accepted but provably incomplete.
                unreliable_day = Some(window.end);
            }
        } else if clean && capped && !progressed {
            // The whole cap sat on the boundary day. Step past it so the
            // rest of the range is still covered.
            unreliable_day = Some(self.current_end);
            if let Some(stepped) = self.current_end.pred_opt() {
                self.current_end = stepped.max(self.start);
            }
            progressed = self.current_end < previous_end;
        }

        let done = clean && !capped && !fetch.rows.is_empty();

        self.boundary_day_count = boundary;
        self.windows_processed += 1;

        AdvanceReport {
            progressed,
            done,
            unreliable_day,
            boundary_day_count: boundary,
        }
    }

    /// Shift the current window's identifiers into the prior slot.
    pub fn rotate_windows(&mut self) {
        self.prior_window_ids = std::mem::take(&mut self.current_window_ids);
    }

    /// The server's hard per-search row cap.
    pub(crate) fn cap(&self) -> usize {
        self.cap
    }
}
