//! Periodic clock source for production use.
//!
//! A tokio task driven by `tokio::time::interval` that sends the time elapsed
//! since the ticker started into a channel, the format
//! [`HeartbeatMonitor`](crate::HeartbeatMonitor) expects from its clock.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Buffered ticks. The watchdog is deadline-based, so a slow consumer only
/// needs the most recent readings.
const TICK_CHANNEL_CAPACITY: usize = 4;

/// Handle to a running ticker task.
///
/// The task stops when [`stop`](Self::stop) is called, when the handle is
/// dropped, or when the receiving end of the tick channel is dropped.
#[derive(Debug)]
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
    period: Duration,
}

impl Ticker {
    /// Start ticking every `period`. The first tick (elapsed zero) is sent
    /// immediately.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn spawn(period: Duration) -> (Self, mpsc::Receiver<Duration>) {
        let (tick_tx, tick_rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let now = start.elapsed();
                trace!(?now, "Clock tick");
                if tick_tx.send(now).await.is_err() {
                    debug!("Tick receiver dropped, stopping ticker");
                    break;
                }
            }
        });

        debug!(?period, "Ticker started");
        (
            Self {
                handle: Some(handle),
                period,
            },
            tick_rx,
        )
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop ticking. No-op if already stopped.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Ticker stopped");
        }
    }

    /// Whether the ticker task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
