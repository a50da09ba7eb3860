// src/engine/mod.rs

//! The incremental backfill engine.
//!
//! - `planner`: owns the shrinking watermark and decides the next window
//! - `pager`: drives all pages of one window
//! - `verifier`: reconciles boundary-day overlap between adjacent windows
//! - `retry`: bounded backoff for transient empty responses
//! - `backfill`: ties the loop together and exposes the record stream

pub mod backfill;
pub mod pager;
pub mod planner;
pub mod retry;
pub mod verifier;

pub use backfill::{Backfill, RecordStream};
pub use pager::WindowFetch;
pub use planner::{AdvanceReport, WatermarkState};
pub use retry::{EmptyVerdict, RetryController};
pub use verifier::{Reconciliation, reconcile};
