// src/site/mod.rs

//! Site adapter surface.
//!
//! A [`SearchSite`] turns one window of a backfill into concrete page
//! requests and turns raw response bodies back into rows. The engine treats
//! continuation state (hidden form fields) as an opaque bag: captured from
//! each page, merged into the next request, never interpreted.

mod portal;

pub use portal::PortalSite;

use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{RawRow, SearchWindow};

/// Opaque per-page continuation state (hidden form fields).
pub type FormState = BTreeMap<String, String>;

/// HTTP method for a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// One concrete page request built by a site adapter.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub method: RequestMethod,
    pub url: String,
    /// Query/form fields, already merged with continuation state
    pub fields: Vec<(String, String)>,
}

/// One parsed page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Server-reported total match count, if the page carries one
    pub reported_total: Option<u64>,

    /// Rows surfaced by this page
    pub rows: Vec<RawRow>,

    /// Whether the server exposes a further page
    pub has_more: bool,

    /// Continuation fields to carry into the next page request
    pub continuation: FormState,
}

/// A site-specific search adapter.
pub trait SearchSite: Send + Sync {
    /// Build the request for one page of a window.
    ///
    /// `page_index` is zero-based; `continuation` holds the hidden fields
    /// captured from the previous page (empty for the first page).
    fn build_request(
        &self,
        window: &SearchWindow,
        page_index: usize,
        continuation: &FormState,
    ) -> SearchRequest;

    /// Parse one response body into rows and pagination state.
    fn parse_page(&self, body: &str) -> Result<SearchPage>;
}

/// Merge stale continuation fields with the current window's query fields.
///
/// Window fields are applied last: continuation state from a prior page must
/// never clobber the query that defines the window itself.
pub fn merge_fields(
    continuation: &FormState,
    window_fields: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged: BTreeMap<String, String> = continuation.clone();
    for (key, value) in window_fields {
        merged.insert(key.clone(), value.clone());
    }
    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_fields_override_continuation() {
        let mut continuation = FormState::new();
        continuation.insert("__VIEWSTATE".into(), "abc".into());
        continuation.insert("filedFrom".into(), "01/01/1900".into());

        let window_fields = vec![
            ("filedFrom".to_string(), "01/01/2020".to_string()),
            ("filedTo".to_string(), "12/31/2020".to_string()),
        ];

        let merged = merge_fields(&continuation, &window_fields);
        let lookup: BTreeMap<_, _> = merged.into_iter().collect();

        assert_eq!(lookup.get("__VIEWSTATE").unwrap(), "abc");
        assert_eq!(lookup.get("filedFrom").unwrap(), "01/01/2020");
        assert_eq!(lookup.get("filedTo").unwrap(), "12/31/2020");
    }

    #[test]
    fn empty_continuation_passes_window_fields_through() {
        let window_fields = vec![("court".to_string(), "sct".to_string())];
        let merged = merge_fields(&FormState::new(), &window_fields);
        assert_eq!(merged, window_fields);
    }
}
