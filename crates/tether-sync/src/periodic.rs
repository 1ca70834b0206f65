//! # Periodic Scheduler
//!
//! Fixed-interval safety net that asks for a drain even when no event
//! arrived. Whether a tick actually drains (online, queue non-empty, no pass
//! running) is decided by the tick callback.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::{QueueResult, SyncError};

/// Interval used when none is configured.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(300);

pub struct PeriodicScheduler {
    period: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running [`PeriodicScheduler`].
#[derive(Clone)]
pub struct PeriodicHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl PeriodicHandle {
    pub async fn shutdown(&self) -> QueueResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }
}

impl PeriodicScheduler {
    pub fn new(period: Duration) -> (Self, PeriodicHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            PeriodicScheduler {
                period,
                shutdown_rx,
            },
            PeriodicHandle { shutdown_tx },
        )
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs until shutdown, calling `tick` once per period.
    ///
    /// The first tick fires one full period after start. A slow tick delays
    /// the next one instead of bunching them up.
    pub async fn run<F, Fut>(mut self, mut tick: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        info!(period_secs = self.period.as_secs(), "Periodic scheduler starting");

        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("Periodic tick");
                    tick().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Periodic scheduler shutting down");
                    break;
                }
            }
        }

        info!("Periodic scheduler stopped");
    }
}
