//! Utility functions and helpers.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Extract a docket/case identifier from a case URL (looks for common patterns).
pub fn extract_case_id(url: &str) -> Option<String> {
    // Common patterns: ?caseId=123, ?docketId=123, /case/123, /opinion/123
    let patterns = [
        regex::Regex::new(r"[?&](?:caseId|docketId|docketNumber|id)=([\w.-]+)").ok()?,
        regex::Regex::new(r"/(?:case|cases|opinion|opinions|docket)/([\w.-]+)").ok()?,
    ];

    for pattern in &patterns {
        if let Some(caps) = pattern.captures(url) {
            if let Some(id) = caps.get(1) {
                return Some(id.as_str().to_string());
            }
        }
    }
    None
}
