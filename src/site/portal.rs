// src/site/portal.rs

//! Form-driven court search portal adapter.
//!
//! Models the common ASP.NET-style decision search: a date-bounded query
//! form, a results table, a "N matches" banner, hidden per-page state
//! (`__VIEWSTATE` and friends) that must be posted back to page forward,
//! and a pager control that disappears on the last page.

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{PortalConfig, RawRow, SearchWindow};
use crate::site::{FormState, RequestMethod, SearchPage, SearchRequest, SearchSite, merge_fields};
use crate::utils::{extract_case_id, resolve_url};

/// Site adapter for a selector-configured search portal.
pub struct PortalSite {
    config: PortalConfig,
    base_url: Url,
    row_sel: Selector,
    link_sel: Selector,
    date_sel: Selector,
    total_sel: Selector,
    next_sel: Selector,
    hidden_sel: Selector,
    total_re: Regex,
}

impl PortalSite {
    /// Create an adapter from portal configuration.
    pub fn new(config: &PortalConfig) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(&config.search_url)?,
            row_sel: Self::parse_selector(&config.row_selector)?,
            link_sel: Self::parse_selector(&config.link_selector)?,
            date_sel: Self::parse_selector(&config.date_selector)?,
            total_sel: Self::parse_selector(&config.total_selector)?,
            next_sel: Self::parse_selector(&config.next_selector)?,
            hidden_sel: Self::parse_selector("input[type=\"hidden\"]")?,
            total_re: Regex::new(r"([\d,]+)")
                .map_err(|e| AppError::page("total banner", e))?,
            config: config.clone(),
        })
    }

    /// Query fields that define one window.
    fn window_fields(&self, window: &SearchWindow) -> Vec<(String, String)> {
        let fmt = self.config.query_date_format.as_str();
        vec![
            (self.config.scope_param.clone(), window.scope.clone()),
            (
                self.config.start_param.clone(),
                window.start.format(fmt).to_string(),
            ),
            (
                self.config.end_param.clone(),
                window.end.format(fmt).to_string(),
            ),
        ]
    }

    /// Parse the server-reported total from the match-count banner.
    fn parse_total(&self, document: &Html) -> Option<u64> {
        let text: String = document.select(&self.total_sel).next()?.text().collect();
        let caps = self.total_re.captures(&text)?;
        caps.get(1)?.as_str().replace(',', "").parse().ok()
    }

    /// Parse one results row, skipping rows without a usable case link.
    fn parse_row(&self, row: &scraper::ElementRef) -> Option<RawRow> {
        let link_elem = row.select(&self.link_sel).next()?;
        let href = link_elem.value().attr(self.config.link_attr.as_str())?;
        let identifier = resolve_url(&self.base_url, href);

        let filed_date_raw = row
            .select(&self.date_sel)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());

        let mut raw = RawRow::new(identifier, filed_date_raw);

        let case_name: String = link_elem.text().collect::<String>().trim().to_string();
        if !case_name.is_empty() {
            raw.fields.insert("case_name".to_string(), case_name);
        }
        if let Some(docket) = extract_case_id(&raw.identifier) {
            raw.fields.insert("docket_id".to_string(), docket);
        }
        Some(raw)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

impl SearchSite for PortalSite {
    fn build_request(
        &self,
        window: &SearchWindow,
        page_index: usize,
        continuation: &FormState,
    ) -> SearchRequest {
        let mut fields = merge_fields(continuation, &self.window_fields(window));

        if page_index == 0 {
            // Fresh query: plain GET with the window fields
            return SearchRequest {
                method: RequestMethod::Get,
                url: self.config.search_url.clone(),
                fields,
            };
        }

        // Page forward: post the captured hidden state back with the pager event
        fields.push((
            "__EVENTTARGET".to_string(),
            self.config.next_event_target.clone(),
        ));
        SearchRequest {
            method: RequestMethod::Post,
            url: self.config.search_url.clone(),
            fields,
        }
    }

    fn parse_page(&self, body: &str) -> Result<SearchPage> {
        let document = Html::parse_document(body);

        let rows: Vec<RawRow> = document
            .select(&self.row_sel)
            .filter_map(|row| self.parse_row(&row))
            .collect();

        let mut continuation = FormState::new();
        for input in document.select(&self.hidden_sel) {
            if let Some(name) = input.value().attr("name") {
                let value = input.value().attr("value").unwrap_or("");
                continuation.insert(name.to_string(), value.to_string());
            }
        }

        Ok(SearchPage {
            reported_total: self.parse_total(&document),
            has_more: document.select(&self.next_sel).next().is_some(),
            rows,
            continuation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn site() -> PortalSite {
        PortalSite::new(&PortalConfig::default()).unwrap()
    }

    fn results_page(next_pager: bool) -> String {
        let pager = if next_pager {
            r##"<a class="pager-next" href="#">Next</a>"##
        } else {
            r##"<a class="pager-next disabled" href="#">Next</a>"##
        };
        format!(
            r#"<html><body>
            <span class="match-count">1,204 matches found</span>
            <input type="hidden" name="__VIEWSTATE" value="vs-token" />
            <input type="hidden" name="__EVENTVALIDATION" value="ev-token" />
            <table class="search-results">
              <tr class="result-row">
                <td><a class="case-link" href="/opinion/101">State v. Abbott</a></td>
                <td class="filed-date">12/20/2025</td>
              </tr>
              <tr class="result-row">
                <td><a class="case-link" href="/opinion/102">In re Barnes</a></td>
                <td class="filed-date">12/19/2025</td>
              </tr>
              <tr class="result-row">
                <td>no link in this row</td>
                <td class="filed-date">12/18/2025</td>
              </tr>
            </table>
            {pager}
            </body></html>"#
        )
    }

    #[test]
    fn parse_page_extracts_rows_and_state() {
        let page = site().parse_page(&results_page(true)).unwrap();

        assert_eq!(page.reported_total, Some(1204));
        assert!(page.has_more);
        assert_eq!(page.rows.len(), 2);

        let first = &page.rows[0];
        assert_eq!(first.identifier, "https://courts.example.gov/opinion/101");
        assert_eq!(
            first.filed_date(),
            NaiveDate::from_ymd_opt(2025, 12, 20)
        );
        assert_eq!(first.fields.get("case_name").unwrap(), "State v. Abbott");
        assert_eq!(first.fields.get("docket_id").unwrap(), "101");

        assert_eq!(page.continuation.get("__VIEWSTATE").unwrap(), "vs-token");
        assert_eq!(
            page.continuation.get("__EVENTVALIDATION").unwrap(),
            "ev-token"
        );
    }

    #[test]
    fn parse_page_detects_last_page() {
        let page = site().parse_page(&results_page(false)).unwrap();
        assert!(!page.has_more);
    }

    #[test]
    fn parse_page_handles_empty_body() {
        let page = site().parse_page("<html><body></body></html>").unwrap();
        assert_eq!(page.reported_total, None);
        assert!(page.rows.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn first_page_is_get_with_window_fields() {
        let window = SearchWindow::new(
            "sct",
            NaiveDate::from_ymd_opt(1900, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
        );
        let request = site().build_request(&window, 0, &FormState::new());

        assert_eq!(request.method, RequestMethod::Get);
        assert!(request.fields.contains(&("court".into(), "sct".into())));
        assert!(
            request
                .fields
                .contains(&("filedFrom".into(), "01/01/1900".into()))
        );
        assert!(
            request
                .fields
                .contains(&("filedTo".into(), "01/12/2026".into()))
        );
    }

    #[test]
    fn page_forward_posts_continuation_and_event() {
        let window = SearchWindow::new(
            "sct",
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
        );
        let mut continuation = FormState::new();
        continuation.insert("__VIEWSTATE".into(), "vs-token".into());

        let request = site().build_request(&window, 1, &continuation);

        assert_eq!(request.method, RequestMethod::Post);
        assert!(
            request
                .fields
                .contains(&("__VIEWSTATE".into(), "vs-token".into()))
        );
        assert!(
            request
                .fields
                .iter()
                .any(|(k, v)| k == "__EVENTTARGET" && v == "ctl00$results$pagerNext")
        );
    }
}
