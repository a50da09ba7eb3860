//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP session behavior settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Backfill engine limits and retry policy
    #[serde(default)]
    pub engine: EngineConfig,

    /// Search portal endpoint and selectors
    #[serde(default)]
    pub portal: PortalConfig,

    /// Known court scopes
    #[serde(default = "defaults::default_scopes")]
    pub scopes: Vec<ScopeInfo>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.engine.max_results_per_window == 0 {
            return Err(AppError::validation(
                "engine.max_results_per_window must be > 0",
            ));
        }
        if self.engine.max_pages_per_window == 0 {
            return Err(AppError::validation(
                "engine.max_pages_per_window must be > 0",
            ));
        }
        if self.engine.max_concurrent_scopes == 0 {
            return Err(AppError::validation(
                "engine.max_concurrent_scopes must be > 0",
            ));
        }
        if self.engine.emission_buffer == 0 {
            return Err(AppError::validation("engine.emission_buffer must be > 0"));
        }
        if self.portal.search_url.trim().is_empty() {
            return Err(AppError::validation("portal.search_url is empty"));
        }
        if self.portal.row_selector.trim().is_empty() {
            return Err(AppError::validation("portal.row_selector is empty"));
        }
        if self.scopes.is_empty() {
            return Err(AppError::validation("No scopes defined"));
        }
        Ok(())
    }

    /// Look up the display name for a scope code.
    pub fn scope_name(&self, code: &str) -> Option<&str> {
        self.scopes
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.name.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            engine: EngineConfig::default(),
            portal: PortalConfig::default(),
            scopes: defaults::default_scopes(),
        }
    }
}

/// HTTP session behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Extra attempts after a rate-limit response before giving up
    #[serde(default = "defaults::rate_limit_retries")]
    pub rate_limit_retries: u32,

    /// Pause between rate-limit attempts, in seconds (scaled by attempt)
    #[serde(default = "defaults::rate_limit_pause")]
    pub rate_limit_pause_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            rate_limit_retries: defaults::rate_limit_retries(),
            rate_limit_pause_secs: defaults::rate_limit_pause(),
        }
    }
}

/// Backfill engine limits and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum rows the server returns for any single search
    #[serde(default = "defaults::max_results_per_window")]
    pub max_results_per_window: usize,

    /// Retries for a window that unexpectedly returns zero rows
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Backoff unit in seconds (sleep = attempt * unit)
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_secs: u64,

    /// Hard ceiling on pages fetched for one window
    #[serde(default = "defaults::max_pages_per_window")]
    pub max_pages_per_window: usize,

    /// Concurrent scope workers
    #[serde(default = "defaults::max_concurrent_scopes")]
    pub max_concurrent_scopes: usize,

    /// Emission channel capacity
    #[serde(default = "defaults::emission_buffer")]
    pub emission_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_results_per_window: defaults::max_results_per_window(),
            max_retries: defaults::max_retries(),
            retry_backoff_secs: defaults::retry_backoff(),
            max_pages_per_window: defaults::max_pages_per_window(),
            max_concurrent_scopes: defaults::max_concurrent_scopes(),
            emission_buffer: defaults::emission_buffer(),
        }
    }
}

/// Search portal endpoint, query fields, and result selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Search endpoint URL
    #[serde(default = "defaults::search_url")]
    pub search_url: String,

    /// Query field carrying the scope (court code)
    #[serde(default = "defaults::scope_param")]
    pub scope_param: String,

    /// Query field carrying the window start date
    #[serde(default = "defaults::start_param")]
    pub start_param: String,

    /// Query field carrying the window end date
    #[serde(default = "defaults::end_param")]
    pub end_param: String,

    /// strftime format for dates in query fields
    #[serde(default = "defaults::query_date_format")]
    pub query_date_format: String,

    /// Value posted as the page-forward event target
    #[serde(default = "defaults::next_event_target")]
    pub next_event_target: String,

    /// CSS selector for result rows
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// CSS selector for the case link within a row
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// CSS selector for the filed date within a row
    #[serde(default = "defaults::date_selector")]
    pub date_selector: String,

    /// HTML attribute holding the case URL
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// CSS selector for the "N matches" banner
    #[serde(default = "defaults::total_selector")]
    pub total_selector: String,

    /// CSS selector for the page-forward control
    #[serde(default = "defaults::next_selector")]
    pub next_selector: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            search_url: defaults::search_url(),
            scope_param: defaults::scope_param(),
            start_param: defaults::start_param(),
            end_param: defaults::end_param(),
            query_date_format: defaults::query_date_format(),
            next_event_target: defaults::next_event_target(),
            row_selector: defaults::row_selector(),
            link_selector: defaults::link_selector(),
            date_selector: defaults::date_selector(),
            link_attr: defaults::link_attr(),
            total_selector: defaults::total_selector(),
            next_selector: defaults::next_selector(),
        }
    }
}

/// A searchable court scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeInfo {
    /// Court code submitted to the portal (e.g., "sct")
    pub code: String,

    /// Human-readable court name
    pub name: String,
}

mod defaults {
    use super::ScopeInfo;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; backscraper/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        250
    }
    pub fn rate_limit_retries() -> u32 {
        2
    }
    pub fn rate_limit_pause() -> u64 {
        15
    }

    // Engine defaults
    pub fn max_results_per_window() -> usize {
        1000
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        1
    }
    pub fn max_pages_per_window() -> usize {
        100
    }
    pub fn max_concurrent_scopes() -> usize {
        3
    }
    pub fn emission_buffer() -> usize {
        64
    }

    // Portal defaults
    pub fn search_url() -> String {
        "https://courts.example.gov/search/decisions".into()
    }
    pub fn scope_param() -> String {
        "court".into()
    }
    pub fn start_param() -> String {
        "filedFrom".into()
    }
    pub fn end_param() -> String {
        "filedTo".into()
    }
    pub fn query_date_format() -> String {
        "%m/%d/%Y".into()
    }
    pub fn next_event_target() -> String {
        "ctl00$results$pagerNext".into()
    }
    pub fn row_selector() -> String {
        "table.search-results tr.result-row".into()
    }
    pub fn link_selector() -> String {
        "a.case-link".into()
    }
    pub fn date_selector() -> String {
        "td.filed-date".into()
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn total_selector() -> String {
        "span.match-count".into()
    }
    pub fn next_selector() -> String {
        "a.pager-next:not(.disabled)".into()
    }

    // Scope defaults
    pub fn default_scopes() -> Vec<ScopeInfo> {
        vec![
            ScopeInfo {
                code: "sct".to_string(),
                name: "Supreme Court".to_string(),
            },
            ScopeInfo {
                code: "app".to_string(),
                name: "Court of Appeals".to_string(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cap() {
        let mut config = Config::default();
        config.engine.max_results_per_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.engine.max_concurrent_scopes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn scope_name_lookup() {
        let config = Config::default();
        assert_eq!(config.scope_name("sct"), Some("Supreme Court"));
        assert_eq!(config.scope_name("nope"), None);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_retries, 5);
        assert_eq!(config.engine.max_results_per_window, 1000);
        assert!(!config.http.user_agent.is_empty());
    }
}
