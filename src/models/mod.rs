// src/models/mod.rs

//! Domain models for the backfill engine.

mod config;
mod record;
mod window;

// Re-export all public types
pub use config::{Config, EngineConfig, HttpConfig, PortalConfig, ScopeInfo};
pub use record::{EmittedRecord, RawRow, parse_filed_date};
pub use window::SearchWindow;
