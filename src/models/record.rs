//! Record data structures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date formats accepted for raw filed-date strings.
///
/// Portals are inconsistent: ISO dates in data attributes, US-style dates in
/// rendered cells, and occasionally a long-form month name.
const FILED_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y"];

/// Parse a raw filed-date string leniently.
///
/// Returns `None` for empty or unrecognized input; a malformed date never
/// aborts a run.
pub fn parse_filed_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    FILED_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// One record surfaced by a page of search results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRow {
    /// Stable identifier (canonical case URL); the sole deduplication key
    pub identifier: String,

    /// Filed date as the portal rendered it; may be missing or malformed
    #[serde(default)]
    pub filed_date_raw: Option<String>,

    /// Remaining per-site fields (case name, docket number, ...)
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl RawRow {
    /// Create a row from an identifier and an optional raw date.
    pub fn new(identifier: impl Into<String>, filed_date_raw: Option<String>) -> Self {
        Self {
            identifier: identifier.into(),
            filed_date_raw,
            fields: BTreeMap::new(),
        }
    }

    /// The parsed filed date, if the raw string is present and well formed.
    pub fn filed_date(&self) -> Option<NaiveDate> {
        self.filed_date_raw
            .as_deref()
            .and_then(parse_filed_date)
    }
}

/// A row promoted to engine output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmittedRecord {
    /// Court scope the record was found under
    pub scope: String,

    /// Stable identifier (canonical case URL)
    pub identifier: String,

    /// Parsed filed date, when the raw string was usable
    pub filed_date: Option<NaiveDate>,

    /// Per-site fields carried through from the raw row
    pub fields: BTreeMap<String, String>,
}

impl EmittedRecord {
    /// Promote a raw row under the given scope.
    pub fn from_row(scope: &str, row: RawRow) -> Self {
        let filed_date = row.filed_date();
        Self {
            scope: scope.to_string(),
            identifier: row.identifier,
            filed_date,
            fields: row.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filed_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();
        assert_eq!(parse_filed_date("2025-12-20"), Some(expected));
        assert_eq!(parse_filed_date("12/20/2025"), Some(expected));
        assert_eq!(parse_filed_date("Dec 20, 2025"), Some(expected));
        assert_eq!(parse_filed_date("December 20, 2025"), Some(expected));
        assert_eq!(parse_filed_date(" 2025-12-20 "), Some(expected));
    }

    #[test]
    fn parse_filed_date_rejects_garbage() {
        assert_eq!(parse_filed_date(""), None);
        assert_eq!(parse_filed_date("pending"), None);
        assert_eq!(parse_filed_date("13/45/2025"), None);
    }

    #[test]
    fn row_with_malformed_date_yields_none() {
        let row = RawRow::new("https://example.gov/case/1", Some("n/a".into()));
        assert_eq!(row.filed_date(), None);
    }

    #[test]
    fn promote_row_to_record() {
        let mut row = RawRow::new("https://example.gov/case/7", Some("2024-03-01".into()));
        row.fields.insert("case_name".into(), "State v. Doe".into());

        let record = EmittedRecord::from_row("sct", row);
        assert_eq!(record.scope, "sct");
        assert_eq!(record.identifier, "https://example.gov/case/7");
        assert_eq!(record.filed_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(record.fields.get("case_name").unwrap(), "State v. Doe");
    }
}
