//! Tracker daemon.
//!
//! Host events arrive as newline-delimited JSON on stdin, for example from a
//! browser native-messaging bridge:
//!
//! ```text
//! {"type":"startup"}
//! {"type":"tab_activated","url":"https://github.com/rust-lang/rust"}
//! {"type":"tab_updated","status":"complete","url":"https://docs.rs/tokio"}
//! {"type":"clear_data"}
//! ```
//!
//! The tick timer is armed on start and re-armed on every `installed` or
//! `startup` event. `clear_data` wipes every record between ticks. The daemon
//! stops at end of input or on Ctrl-C, lets a running tick finish, then runs
//! one last tick so the partial interval is not lost.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use st_core::{AccumulationEngine, HostEvent, SharedState, SiteStore, TickScheduler, TrackerState};

use crate::Config;

/// Counts of host events seen during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: usize,
    pub rejected: usize,
}

fn arm<S: SiteStore + 'static>(scheduler: &TickScheduler, engine: &Arc<AccumulationEngine<S>>) {
    let engine = Arc::clone(engine);
    scheduler.arm(move || {
        let engine = Arc::clone(&engine);
        async move {
            engine.tick(Utc::now()).await;
        }
    });
}

/// Runs the tracker until `events` is exhausted or the process is interrupted.
pub async fn run<S, R>(store: Arc<S>, config: &Config, events: R) -> Result<RunSummary>
where
    S: SiteStore + 'static,
    R: AsyncBufRead + Unpin,
{
    anyhow::ensure!(
        config.tick_interval_ms > 0,
        "tick_interval_ms must be greater than zero"
    );

    let state = SharedState::new(TrackerState::new(Utc::now()));
    let engine = Arc::new(AccumulationEngine::new(store, state, config.gap_policy));
    let tracker = engine.tracker();
    let scheduler = TickScheduler::new(config.tick_interval());
    arm(&scheduler, &engine);
    tracing::info!(
        interval_ms = scheduler.period().as_millis(),
        gap_policy = ?config.gap_policy,
        "tracker started"
    );

    let mut summary = RunSummary::default();
    let mut lines = events.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read host events")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(err) => {
                summary.rejected += 1;
                tracing::warn!(line = trimmed, %err, "ignoring malformed host event");
                continue;
            }
        };
        summary.events += 1;

        match event {
            HostEvent::Installed | HostEvent::Startup => arm(&scheduler, &engine),
            HostEvent::TabActivated { .. } | HostEvent::TabUpdated { .. } => {
                tracker.handle(&event);
            }
            HostEvent::ClearData => {
                if let Err(err) = engine.clear_all().await {
                    tracing::warn!(%err, "failed to clear site records");
                }
            }
        }
    }

    scheduler.stop().await;
    engine.tick(Utc::now()).await;
    tracing::info!(
        events = summary.events,
        rejected = summary.rejected,
        "tracker stopped"
    );
    Ok(summary)
}
