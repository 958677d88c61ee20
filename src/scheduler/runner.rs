//! Periodic scheduling driver.
//!
//! Spawns a tokio task that runs [`TaskEngine::tick`] on a fixed cadence.
//! A tick is awaited before the next one can start, and ticks missed while
//! one overran are skipped, so two passes never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{Clock, system_clock};
use crate::engine::{TaskEngine, TickReport};

/// Default seconds between ticks.
const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;

/// Result of one driver tick, as published on the report channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// The tick failed or panicked; the driver keeps going.
    Failed(String),
}

/// Background driver for the scheduling engine.
pub struct Scheduler {
    engine: Arc<TaskEngine>,
    cancel: CancellationToken,
    interval: Duration,
    clock: Clock,
    /// Optional channel for tick outcomes (tests, status views).
    report_tx: Option<mpsc::UnboundedSender<TickOutcome>>,
}

impl Scheduler {
    pub fn new(engine: Arc<TaskEngine>, cancel: CancellationToken) -> Self {
        Self {
            engine,
            cancel,
            interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            clock: system_clock(),
            report_tx: None,
        }
    }

    /// Override the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the time source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Publish every tick outcome on `tx`.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<TickOutcome>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    /// Start the background loop. The first tick fires immediately.
    pub fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run_loop())
    }

    async fn run_loop(self) {
        info!(interval = ?self.interval, "scheduler started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let outcome = self.tick_once().await;
                    if let Some(tx) = &self.report_tx {
                        let _ = tx.send(outcome);
                    }
                }
            }
        }
    }

    /// Run one engine tick on the blocking pool.
    ///
    /// Errors and panics are logged and reported, never propagated.
    pub async fn tick_once(&self) -> TickOutcome {
        let engine = Arc::clone(&self.engine);
        let now = (self.clock)();

        match tokio::task::spawn_blocking(move || engine.tick(now)).await {
            Ok(Ok(report)) => {
                if report.created > 0 || report.escalated > 0 {
                    info!(%now, created = report.created, escalated = report.escalated, "scheduler tick");
                } else {
                    debug!(%now, "scheduler tick: nothing to do");
                }
                TickOutcome::Completed(report)
            }
            Ok(Err(e)) => {
                error!(%now, error = %e, "scheduler tick failed");
                TickOutcome::Failed(e.to_string())
            }
            Err(e) => {
                error!(%now, error = %e, "scheduler tick panicked");
                TickOutcome::Failed(e.to_string())
            }
        }
    }
}
