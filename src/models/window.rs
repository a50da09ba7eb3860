//! Search window data structure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One `(start, end)` date range submitted as a single search query.
///
/// `start` is fixed for the whole backfill run; `end` shrinks as the
/// watermark advances backwards through history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchWindow {
    /// Court scope submitted with the query
    pub scope: String,

    /// Inclusive lower bound of the range
    pub start: NaiveDate,

    /// Inclusive upper bound of the range
    pub end: NaiveDate,
}

impl SearchWindow {
    /// Create a window; `start` must not exceed `end`.
    pub fn new(scope: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "window start after end");
        Self {
            scope: scope.into(),
            start,
            end,
        }
    }

    /// Whether the window covers exactly one day.
    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }
}

impl std::fmt::Display for SearchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{} .. {}]", self.scope, self.start, self.end)
    }
}
