//! Tick-driven accumulation of per-site time.
//!
//! # Algorithm
//!
//! On every tick at `now`:
//!
//! 1. `delta = now - last_tick`, then `last_tick = now` (see [`GapPolicy`] for
//!    the one exception).
//! 2. With no active site nothing is read or written.
//! 3. Otherwise the store merges `delta` and one session into the site's
//!    record (absent ⇒ zeroed, legacy ⇒ normalized) and stamps `lastVisited`
//!    with `now`, as one atomic [`SiteStore::merge`].
//!
//! Within a process the whole step runs under a write gate shared with
//! [`AccumulationEngine::clear_all`], so overlapping ticks are applied one at a
//! time in arrival order. Across processes the store's atomic merge orders a
//! clear strictly before or after each tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::record::SiteRecord;
use crate::site::SiteKey;
use crate::store::{SiteStore, StoreError};
use crate::tracker::{ActiveSiteTracker, GapPolicy, SharedState};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No site was active.
    Idle,
    /// Time was merged into `site`'s record.
    Recorded { site: SiteKey, record: SiteRecord },
    /// The store rejected the read or the write; the delta was dropped.
    Failed { site: SiteKey },
}

/// Merges elapsed time into the persisted record of the active site.
#[derive(Debug)]
pub struct AccumulationEngine<S> {
    store: Arc<S>,
    state: SharedState,
    policy: GapPolicy,
    write_gate: Mutex<()>,
}

impl<S: SiteStore> AccumulationEngine<S> {
    pub fn new(store: Arc<S>, state: SharedState, policy: GapPolicy) -> Self {
        Self {
            store,
            state,
            policy,
            write_gate: Mutex::new(()),
        }
    }

    /// Returns a tracker that updates this engine's active site.
    pub fn tracker(&self) -> ActiveSiteTracker {
        ActiveSiteTracker::new(self.state.clone())
    }

    /// Runs one tick at `now`.
    ///
    /// Store failures are logged and contained; this never returns an error.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let _gate = self.write_gate.lock().await;

        let attribution = self.state.lock().advance(now, self.policy);
        let Some(attribution) = attribution else {
            return TickOutcome::Idle;
        };

        let merged = self
            .store
            .merge(&attribution.site, attribution.delta_ms, attribution.at)
            .await;
        match merged {
            Ok(record) => {
                tracing::debug!(
                    site = attribution.site.as_str(),
                    delta_ms = attribution.delta_ms,
                    total_ms = record.time,
                    "tick"
                );
                TickOutcome::Recorded {
                    site: attribution.site,
                    record,
                }
            }
            Err(err) => {
                tracing::warn!(
                    site = attribution.site.as_str(),
                    delta_ms = attribution.delta_ms,
                    error = %err,
                    "failed to persist tick, dropping delta"
                );
                TickOutcome::Failed {
                    site: attribution.site,
                }
            }
        }
    }

    /// Removes every stored record.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        self.store.clear().await?;
        tracing::info!("cleared all site records");
        Ok(())
    }
}
