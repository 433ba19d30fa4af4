//! Core domain logic for the site time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Tracking: resolving the focused tab into a single active [`SiteKey`]
//! - Scheduling: a fixed-interval tick source that re-arms idempotently
//! - Accumulation: merging each tick's elapsed time into per-site records
//! - Metrics: deriving focus/distraction totals, score, and limit violations

pub mod engine;
pub mod metrics;
pub mod record;
pub mod scheduler;
pub mod site;
pub mod store;
pub mod tracker;

pub use engine::{AccumulationEngine, TickOutcome};
pub use metrics::{
    Category, Classification, ConfigError, LimitTable, MetricsEngine, MostUsed, OverLimit, Report,
    SiteSummary, compute_report,
};
pub use record::{SiteRecord, StoredValue, normalize};
pub use scheduler::TickScheduler;
pub use site::{InvalidSiteKey, SiteKey};
pub use store::{MemoryStore, SiteStore, Snapshot, StoreError};
pub use tracker::{
    ActiveSiteTracker, Attribution, GapPolicy, HostEvent, SharedState, TabStatus, TrackerState,
};
