//! Focused-site tracking.
//!
//! [`TrackerState`] is the process-wide state shared by the tracker (which
//! writes `active_site`) and the accumulation engine (which owns `last_tick`).
//! It is never persisted; a fresh state is created on every start.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::site::SiteKey;

/// How idle gaps between ticks are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Advance `last_tick` on every tick, so time spent with no active site is
    /// never credited to anyone.
    #[default]
    Exclude,
    /// Advance `last_tick` only while a site is active, folding idle gaps into
    /// the next active site's first delta.
    Fold,
}

/// Time attributed to a site by a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub site: SiteKey,
    pub delta_ms: u64,
    pub at: DateTime<Utc>,
}

/// The focused site and the instant of the previous tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerState {
    pub active_site: Option<SiteKey>,
    pub last_tick: DateTime<Utc>,
}

impl TrackerState {
    /// Creates the state for a process started at `started_at`.
    pub const fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            active_site: None,
            last_tick: started_at,
        }
    }

    /// Advances the clock to `now` and returns the attribution for this tick.
    ///
    /// A clock that stepped backwards yields a zero delta.
    pub fn advance(&mut self, now: DateTime<Utc>, policy: GapPolicy) -> Option<Attribution> {
        let elapsed = (now - self.last_tick).num_milliseconds();
        let delta_ms = u64::try_from(elapsed).unwrap_or(0);

        match (&self.active_site, policy) {
            (None, GapPolicy::Fold) => None,
            (None, GapPolicy::Exclude) => {
                self.last_tick = now;
                None
            }
            (Some(site), _) => {
                let site = site.clone();
                self.last_tick = now;
                Some(Attribution {
                    site,
                    delta_ms,
                    at: now,
                })
            }
        }
    }
}

/// Shared handle to the tracker state.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<TrackerState>>);

impl SharedState {
    pub fn new(state: TrackerState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Locks the state, recovering from poisoning.
    pub fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Navigation status reported with a tab update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Events delivered by the host platform.
///
/// Tab events carry the URL of the active tab in the current window after the
/// change, or `None` when there is no such tab or it has no URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// The tracker was installed or updated.
    Installed,
    /// The host process started.
    Startup,
    /// A different tab became active.
    TabActivated {
        #[serde(default)]
        url: Option<String>,
    },
    /// A tab changed; only completed navigations are acted on.
    TabUpdated {
        status: TabStatus,
        #[serde(default)]
        url: Option<String>,
    },
    /// The user asked to wipe all recorded usage.
    ClearData,
}

/// Maintains the single currently focused site.
#[derive(Debug, Clone)]
pub struct ActiveSiteTracker {
    state: SharedState,
}

impl ActiveSiteTracker {
    pub const fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Returns the focused site, if any.
    pub fn current_site(&self) -> Option<SiteKey> {
        self.state.lock().active_site.clone()
    }

    /// Applies a host event.
    ///
    /// Returns `true` when the event was a tab event that re-resolved the
    /// active site.
    pub fn handle(&self, event: &HostEvent) -> bool {
        match event {
            HostEvent::TabActivated { url }
            | HostEvent::TabUpdated {
                status: TabStatus::Complete,
                url,
            } => {
                self.set_active_url(url.as_deref());
                true
            }
            HostEvent::TabUpdated {
                status: TabStatus::Loading,
                ..
            }
            | HostEvent::Installed
            | HostEvent::Startup
            | HostEvent::ClearData => false,
        }
    }

    /// Resolves the active tab URL into the focused site.
    pub fn set_active_url(&self, url: Option<&str>) {
        let site = url.and_then(SiteKey::from_url);
        let mut state = self.state.lock();
        if state.active_site != site {
            tracing::debug!(
                from = state.active_site.as_ref().map(SiteKey::as_str),
                to = site.as_ref().map(SiteKey::as_str),
                "active site changed"
            );
        }
        state.active_site = site;
    }
}
