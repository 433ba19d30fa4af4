//! Fixed-interval tick source.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// A running timer. Dropping `stop` ends the loop at its next wait.
#[derive(Debug)]
struct Timer {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Invokes a callback at a fixed period.
///
/// At most one recurring timer exists per scheduler: arming again replaces the
/// running timer instead of adding a second one. A replaced or disarmed timer
/// stops between ticks, never inside one, so a callback that has started
/// always runs to completion. A tick that is still running when the next
/// deadline passes causes that deadline to be skipped, not queued.
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    timer: Mutex<Option<Timer>>,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        // tokio intervals reject a zero period
        let period = period.max(Duration::from_millis(1));
        Self {
            period,
            timer: Mutex::new(None),
        }
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Starts (or restarts) the recurring timer.
    ///
    /// The first tick fires one period after arming. Must be called from
    /// within a tokio runtime.
    pub fn arm<F, Fut>(&self, mut on_tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = self.period;
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {}
                }
                on_tick().await;
            }
        });

        let previous = self.lock().replace(Timer { stop, task });
        if previous.is_some() {
            tracing::debug!("tick timer re-armed");
        } else {
            tracing::debug!(period_ms = period.as_millis(), "tick timer armed");
        }
    }

    /// Stops the timer without waiting for an in-flight tick. Returns `false`
    /// if it was not armed.
    pub fn disarm(&self) -> bool {
        self.lock().take().is_some()
    }

    /// Stops the timer and waits for an in-flight tick to finish. Returns
    /// `false` if it was not armed.
    pub async fn stop(&self) -> bool {
        let Some(Timer { stop, task }) = self.lock().take() else {
            return false;
        };
        drop(stop);
        if let Err(err) = task.await {
            tracing::warn!(%err, "tick timer ended abnormally");
        }
        true
    }

    pub fn is_armed(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|timer| !timer.task.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Timer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}
