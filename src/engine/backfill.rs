// src/engine/backfill.rs

//! Backfill orchestration.
//!
//! One worker per scope runs the sequential plan/fetch/reconcile loop; the
//! watermark dependency makes anything else incorrect for a single scope.
//! Independent scopes share nothing but the emission channel and run under
//! a bounded concurrency limit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{RequestExecutor, RequestManager};
use crate::engine::pager;
use crate::engine::planner::WatermarkState;
use crate::engine::retry::EmptyVerdict;
use crate::engine::verifier;
use crate::error::{AppError, Result};
use crate::models::{Config, EmittedRecord};
use crate::site::SearchSite;

/// The lazily produced, deduplicated record sequence of one backfill call.
///
/// Ends when every scope reaches its start date or aborts. Dropping the
/// stream cancels the remaining work.
pub struct RecordStream {
    rx: mpsc::Receiver<EmittedRecord>,
    cancel: CancellationToken,
}

impl RecordStream {
    /// Pull the next record; `None` when the backfill is finished.
    pub async fn recv(&mut self) -> Option<EmittedRecord> {
        self.rx.recv().await
    }

    /// Handle for stopping the backfill early.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Backfill driver for one site.
pub struct Backfill {
    config: Arc<Config>,
    site: Arc<dyn SearchSite>,
    audit_dir: Option<PathBuf>,
}

impl Backfill {
    pub fn new(config: Arc<Config>, site: Arc<dyn SearchSite>) -> Self {
        Self {
            config,
            site,
            audit_dir: None,
        }
    }

    /// Dump every raw response under the given directory.
    pub fn with_audit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audit_dir = Some(dir.into());
        self
    }

    /// Start a backfill over `[start, end]` for the given scopes.
    ///
    /// Each scope gets its own session (own cookie jar); workers run
    /// concurrently up to the configured limit.
    pub fn stream(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        scopes: &[String],
    ) -> Result<RecordStream> {
        if start > end {
            return Err(AppError::validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        if scopes.is_empty() {
            return Err(AppError::validation("no scopes requested"));
        }

        let mut workers: Vec<(String, Arc<dyn RequestExecutor>)> = Vec::new();
        for scope in scopes {
            let mut manager = RequestManager::new(&self.config.http)?;
            if let Some(dir) = &self.audit_dir {
                manager = manager.with_audit_dump(dir);
            }
            let executor: Arc<dyn RequestExecutor> = Arc::new(manager);
            workers.push((scope.clone(), executor));
        }
        Ok(self.stream_with(start, end, workers))
    }

    /// Start a backfill with explicit per-scope executors.
    pub fn stream_with(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        scopes: Vec<(String, Arc<dyn RequestExecutor>)>,
    ) -> RecordStream {
        let (tx, rx) = mpsc::channel(self.config.engine.emission_buffer);
        let cancel = CancellationToken::new();

        let config = Arc::clone(&self.config);
        let site = Arc::clone(&self.site);
        let worker_cancel = cancel.clone();
        let limit = self.config.engine.max_concurrent_scopes;

        tokio::spawn(async move {
            stream::iter(scopes)
                .for_each_concurrent(limit, |(scope, executor)| {
                    let config = Arc::clone(&config);
                    let site = Arc::clone(&site);
                    let tx = tx.clone();
                    let cancel = worker_cancel.clone();
                    async move {
                        run_scope(config, site, executor, scope, start, end, tx, cancel).await;
                    }
                })
                .await;
        });

        RecordStream { rx, cancel }
    }
}

/// Sequential backfill loop for one scope.
#[allow(clippy::too_many_arguments)]
async fn run_scope(
    config: Arc<Config>,
    site: Arc<dyn SearchSite>,
    executor: Arc<dyn RequestExecutor>,
    scope: String,
    start: NaiveDate,
    end: NaiveDate,
    tx: mpsc::Sender<EmittedRecord>,
    cancel: CancellationToken,
) {
    let mut state = WatermarkState::new(&scope, start, end, &config.engine);
    let page_delay = Duration::from_millis(config.http.request_delay_ms);
    let mut emitted = 0usize;

    log::info!("Backfill starting for {scope}: {start} .. {end}");

    while let Some(window) = state.next_window() {
        log::debug!("Searching {window}");

        let fetch = tokio::select! {
            fetch = pager::fetch_window(
                site.as_ref(),
                executor.as_ref(),
                &window,
                &config.engine,
                page_delay,
            ) => fetch,
            _ = cancel.cancelled() => {
                log::info!("Backfill cancelled for {scope}");
                return;
            }
        };

        let rate_limited = fetch.rate_limited();

        if fetch.rows.is_empty() && !rate_limited {
            if window.is_single_day() && fetch.is_clean() {
                // Nothing left on the final overlap day
                break;
            }
            match state.retry.note_empty() {
                EmptyVerdict::Retry { attempt, pause } => {
                    log::warn!("Empty result for {window} (attempt {attempt}); retrying in {pause:?}");
                    tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = cancel.cancelled() => {
                            log::info!("Backfill cancelled for {scope}");
                            return;
                        }
                    }
                    continue;
                }
                EmptyVerdict::Abort => {
                    log::error!("Window {window} stayed empty after retries; aborting backfill for {scope}");
                    return;
                }
            }
        }

        // Expected redundancy must be read before advance overwrites it.
        let expected = state.expected_redundant();
        let report = state.advance(&window, &fetch);
        let recon = verifier::reconcile(&mut state, &window, fetch, expected);
        state.rotate_windows();

        if let Some(day) = report.unreliable_day {
            log::warn!(
                "Result set for {scope} on {day} reached the {}-row cap; that day is provably incomplete",
                config.engine.max_results_per_window
            );
        }

        for row in recon.fresh {
            let record = EmittedRecord::from_row(&scope, row);
            tokio::select! {
                sent = tx.send(record) => {
                    if sent.is_err() {
                        log::debug!("Record consumer dropped; stopping backfill for {scope}");
                        return;
                    }
                }
                _ = cancel.cancelled() => {
                    log::info!("Backfill cancelled for {scope}");
                    return;
                }
            }
            emitted += 1;
        }

        if rate_limited {
            log::error!("Rate limited; stopping backfill for {scope} after {emitted} records");
            return;
        }

        if report.done {
            break;
        }

        if report.progressed {
            state.retry.reset();
        } else if !window.is_single_day() {
            // Rows arrived but the watermark is stuck; bound the re-requests
            match state.retry.note_empty() {
                EmptyVerdict::Retry { attempt, pause } => {
                    log::warn!("No watermark progress for {window} (attempt {attempt}); retrying in {pause:?}");
                    tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = cancel.cancelled() => {
                            log::info!("Backfill cancelled for {scope}");
                            return;
                        }
                    }
                }
                EmptyVerdict::Abort => {
                    log::error!("No watermark progress for {window} after retries; aborting backfill for {scope}");
                    return;
                }
            }
        }
    }

    log::info!(
        "Backfill complete for {scope}: {emitted} records emitted (last window: {} new, {} redundant)",
        state.last_window_new_count,
        state.last_window_redundant_count
    );
}
