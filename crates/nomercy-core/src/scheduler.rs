//! Recurring death-mode checks.
//!
//! The scheduler only decides cadence. Each tick takes the per-user engine
//! lock, the same one user operations take, and calls [`Engine::tick`].
//! Missed ticks are skipped rather than replayed in a burst; since a penalty
//! fires at most once per day, a late tick still catches a violation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::events::Event;

/// One user's engine, shared between the scheduler and user operations.
pub type SharedEngine = Arc<Mutex<Engine>>;

pub fn shared(engine: Engine) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

pub struct EnforcementScheduler {
    engine: SharedEngine,
    period: Duration,
}

impl EnforcementScheduler {
    /// `period` is clamped to at least one second.
    pub fn new(engine: SharedEngine, period: Duration) -> Self {
        Self {
            engine,
            period: period.max(Duration::from_secs(1)),
        }
    }

    /// Same as [`EnforcementScheduler::new`] without the lower bound.
    #[cfg(test)]
    fn with_raw_period(engine: SharedEngine, period: Duration) -> Self {
        Self { engine, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// A single check under the engine lock.
    pub async fn run_once(&self) -> Option<Event> {
        self.engine.lock().await.tick()
    }

    /// Tick until `shutdown` carries `true` or its sender is dropped.
    ///
    /// The first check runs immediately.
    pub async fn run<F>(&self, mut shutdown: watch::Receiver<bool>, mut on_event: F)
    where
        F: FnMut(Event) + Send,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_secs = self.period.as_secs_f64(), "enforcement scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(event) = self.run_once().await {
                        on_event(event);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("enforcement scheduler stopped");
    }

    /// Run on the current tokio runtime; send `true` on the returned sender
    /// to stop.
    pub fn spawn<F>(self, on_event: F) -> (JoinHandle<()>, watch::Sender<bool>)
    where
        F: FnMut(Event) + Send + 'static,
    {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { self.run(rx, on_event).await });
        (handle, tx)
    }
}
