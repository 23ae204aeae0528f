//! Fixed-period job scheduling with at most one job in flight.
//!
//! A ticker task feeds a one-slot queue. A single worker drains it and runs
//! the job to completion. Ticks that find the slot occupied are dropped.

use bridge_io::metrics::TICKS_SKIPPED;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles_run: u64,
    pub ticks_skipped: u64,
}

pub struct Scheduler {
    period: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        Self { period, cancel }
    }

    /// Run `job` once per period, starting immediately, until cancelled.
    /// Returns after the in-flight job (if any) has finished.
    pub async fn run<F, Fut>(self, mut job: F) -> SchedulerStats
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let skipped = Arc::new(AtomicU64::new(0));

        let ticker = {
            let cancel = self.cancel.clone();
            let skipped = Arc::clone(&skipped);
            let period = self.period;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {}
                    }
                    match tx.try_send(()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(())) => {
                            skipped.fetch_add(1, Ordering::Relaxed);
                            TICKS_SKIPPED.inc();
                            warn!("Previous cycle still running, tick skipped");
                        }
                        Err(TrySendError::Closed(())) => break,
                    }
                }
                debug!("Ticker stopped");
            })
        };

        info!(period_ms = self.period.as_millis() as u64, "Scheduler started");
        let mut cycles_run = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                tick = rx.recv() => {
                    if tick.is_none() {
                        break;
                    }
                }
            }
            // Outside the select so cancellation never interrupts a job.
            job().await;
            cycles_run += 1;
        }

        drop(rx);
        let _ = ticker.await;

        let stats = SchedulerStats {
            cycles_run,
            ticks_skipped: skipped.load(Ordering::Relaxed),
        };
        info!(
            cycles_run = stats.cycles_run,
            ticks_skipped = stats.ticks_skipped,
            "Scheduler stopped"
        );
        stats
    }
}
