// src/client.rs

//! HTTP session management.
//!
//! One [`RequestManager`] per scope worker: each carries its own cookie jar,
//! default anti-cache headers, and per-request timeout. Page failures are
//! classified so the engine can tell a rate-limit block from ordinary
//! transport trouble.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::Result;
use crate::models::HttpConfig;
use crate::site::{RequestMethod, SearchRequest};

/// A failed page fetch, classified for the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Server-side blocking (HTTP 403-class); hard-stops the scope
    #[error("rate limited by server (HTTP {status})")]
    RateLimited { status: u16 },

    /// Timeout, connection error, 5xx, or other HTTP-layer failure
    #[error("transport failure: {message}")]
    Transport { message: String },
}

/// Executes one search/page request against a live session.
///
/// Abstracted so the engine can be driven by scripted responses in tests.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &SearchRequest,
    ) -> std::result::Result<String, FetchFailure>;
}

/// Classify an HTTP status into a fetch failure, if it is one.
fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        return Some(FetchFailure::RateLimited {
            status: status.as_u16(),
        });
    }
    if status.is_client_error() || status.is_server_error() {
        return Some(FetchFailure::Transport {
            message: format!("HTTP {status}"),
        });
    }
    None
}

/// Raw-response audit sink.
///
/// A pass-through debugging hook: every response body is written to a
/// directory, and any write error is logged rather than surfaced, so the
/// hook can never alter crawl control flow.
pub struct AuditDump {
    dir: PathBuf,
    seq: AtomicU64,
}

impl AuditDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// Record one response body. Never fails.
    pub async fn record(&self, request: &SearchRequest, body: &str) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(request.url.as_bytes());
        for (key, value) in &request.fields {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        let path = self.dir.join(format!("{seq:05}-{}.html", &digest[..12]));

        if let Err(e) = self.write_body(&path, body).await {
            log::warn!("Audit dump failed for {}: {}", path.display(), e);
        }
    }

    async fn write_body(&self, path: &Path, body: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }
}

/// HTTP session for one scope worker.
pub struct RequestManager {
    client: reqwest::Client,
    config: HttpConfig,
    dump: Option<AuditDump>,
}

impl RequestManager {
    /// Build a session from HTTP configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            dump: None,
        })
    }

    /// Attach a raw-response audit sink.
    pub fn with_audit_dump(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump = Some(AuditDump::new(dir));
        self
    }

    async fn execute_once(
        &self,
        request: &SearchRequest,
    ) -> std::result::Result<String, FetchFailure> {
        let builder = match request.method {
            RequestMethod::Get => self.client.get(&request.url).query(&request.fields),
            RequestMethod::Post => self.client.post(&request.url).form(&request.fields),
        };

        let response = builder.send().await.map_err(|e| FetchFailure::Transport {
            message: e.to_string(),
        })?;

        if let Some(failure) = classify_status(response.status()) {
            return Err(failure);
        }

        let body = response.text().await.map_err(|e| FetchFailure::Transport {
            message: e.to_string(),
        })?;

        if let Some(dump) = &self.dump {
            dump.record(request, &body).await;
        }
        Ok(body)
    }
}

#[async_trait]
impl RequestExecutor for RequestManager {
    async fn execute(
        &self,
        request: &SearchRequest,
    ) -> std::result::Result<String, FetchFailure> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute_once(request).await {
                Err(FetchFailure::RateLimited { status })
                    if attempt < self.config.rate_limit_retries =>
                {
                    attempt += 1;
                    let pause = Duration::from_secs(
                        self.config.rate_limit_pause_secs * u64::from(attempt),
                    );
                    log::warn!(
                        "Rate limited (HTTP {}), attempt {}/{}; pausing {:?}",
                        status,
                        attempt,
                        self.config.rate_limit_retries,
                        pause
                    );
                    tokio::time::sleep(pause).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limit_statuses() {
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            Some(FetchFailure::RateLimited { status: 403 })
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(FetchFailure::RateLimited { status: 429 })
        );
    }

    #[test]
    fn classify_transport_statuses() {
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(FetchFailure::Transport { .. })
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            Some(FetchFailure::Transport { .. })
        ));
    }

    #[test]
    fn classify_success_is_none() {
        assert_eq!(classify_status(StatusCode::OK), None);
    }

    #[tokio::test]
    async fn audit_dump_writes_response_body() {
        let dir = tempfile::tempdir().unwrap();
        let dump = AuditDump::new(dir.path());

        let request = SearchRequest {
            method: RequestMethod::Get,
            url: "https://courts.example.gov/search".to_string(),
            fields: vec![("court".into(), "sct".into())],
        };
        dump.record(&request, "<html>first</html>").await;
        dump.record(&request, "<html>second</html>").await;

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("00000-"));
        assert!(names[1].starts_with("00001-"));

        let body = std::fs::read_to_string(dir.path().join(&names[0])).unwrap();
        assert_eq!(body, "<html>first</html>");
    }
}
