//! Notification patrol driver.
//!
//! Periodically asks the [`NotificationGate`] what still needs announcing
//! and hands it to a [`NoticeSink`]. The gate lives behind a mutex so a
//! front end can inspect it while the patrol runs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{Clock, system_clock};
use crate::notify::{NoticeSink, NotificationGate, PatrolOutcome};
use crate::query::TaskQuery;

const DEFAULT_PATROL_INTERVAL_SECS: u64 = 60;
const DEFAULT_SUMMARY_HOUR: u32 = 18;

pub struct PatrolDriver {
    gate: Arc<Mutex<NotificationGate>>,
    query: TaskQuery,
    sink: Arc<dyn NoticeSink>,
    cancel: CancellationToken,
    interval: Duration,
    clock: Clock,
    outcome_tx: Option<mpsc::UnboundedSender<PatrolOutcome>>,
}

impl PatrolDriver {
    pub fn new(query: TaskQuery, sink: Arc<dyn NoticeSink>, cancel: CancellationToken) -> Self {
        Self {
            gate: Arc::new(Mutex::new(NotificationGate::new(DEFAULT_SUMMARY_HOUR))),
            query,
            sink,
            cancel,
            interval: Duration::from_secs(DEFAULT_PATROL_INTERVAL_SECS),
            clock: system_clock(),
            outcome_tx: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Hour of day (0-23) from which the daily summary is sent.
    pub fn with_summary_hour(mut self, hour: u32) -> Self {
        self.gate = Arc::new(Mutex::new(NotificationGate::new(hour)));
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_outcomes(mut self, tx: mpsc::UnboundedSender<PatrolOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }

    /// Shared handle to the dedup state.
    pub fn gate(&self) -> Arc<Mutex<NotificationGate>> {
        Arc::clone(&self.gate)
    }

    pub fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run_loop())
    }

    async fn run_loop(self) {
        info!(interval = ?self.interval, "notification patrol started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("notification patrol cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let outcome = self.patrol_once().await;
                    if let (Some(outcome), Some(tx)) = (outcome, &self.outcome_tx) {
                        let _ = tx.send(outcome);
                    }
                }
            }
        }
    }

    /// One gather/deliver/confirm pass on the blocking pool.
    ///
    /// Returns `None` when the pass failed before delivery (store error or
    /// panic); the failure is logged.
    pub async fn patrol_once(&self) -> Option<PatrolOutcome> {
        let gate = Arc::clone(&self.gate);
        let query = self.query.clone();
        let sink = Arc::clone(&self.sink);
        let now = (self.clock)();

        let joined =
            tokio::task::spawn_blocking(move || gate.lock().patrol(&query, sink.as_ref(), now))
                .await;
        match joined {
            Ok(Ok(outcome)) => {
                debug!(
                    %now,
                    notified = outcome.notified,
                    summary = outcome.summary_sent,
                    "patrol pass done"
                );
                Some(outcome)
            }
            Ok(Err(e)) => {
                error!(%now, error = %e, "patrol pass failed");
                None
            }
            Err(e) => {
                error!(%now, error = %e, "patrol pass panicked");
                None
            }
        }
    }
}
