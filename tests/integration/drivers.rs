//! Scheduler and patrol drivers running together against one store.

use std::sync::Arc;
use std::time::Duration;

use alfred::notify::{DailySummary, DeliveryError, NoticeBatch, NoticeSink};
use alfred::scheduler::{PatrolDriver, Scheduler, TickOutcome, fixed_clock};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::helpers::{add_template, test_env, ts};

#[derive(Default)]
struct Outbox {
    batches: Mutex<Vec<NoticeBatch>>,
    summaries: Mutex<Vec<DailySummary>>,
}

impl NoticeSink for Outbox {
    fn deliver(&self, batch: &NoticeBatch) -> Result<(), DeliveryError> {
        self.batches.lock().push(batch.clone());
        Ok(())
    }

    fn deliver_summary(&self, summary: &DailySummary) -> Result<(), DeliveryError> {
        self.summaries.lock().push(summary.clone());
        Ok(())
    }
}

#[tokio::test]
async fn scheduled_todo_is_announced_once() {
    let env = test_env();
    add_template(&env, "U1", "0 18 * * *", "30m");
    let clock = fixed_clock(ts("2025-11-08T18:40:00"));
    let cancel = CancellationToken::new();

    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(Arc::clone(&env.engine), cancel.child_token())
        .with_interval(Duration::from_millis(10))
        .with_clock(clock.clone())
        .with_reports(tick_tx)
        .run();

    // Wait for the first tick so the todo exists and is escalated.
    let first = tokio::time::timeout(Duration::from_secs(5), tick_rx.recv())
        .await
        .expect("tick in time")
        .expect("channel open");
    assert!(matches!(first, TickOutcome::Completed(r) if r.created == 1 && r.escalated == 1));

    let outbox = Arc::new(Outbox::default());
    let (patrol_tx, mut patrol_rx) = mpsc::unbounded_channel();
    let patrol = PatrolDriver::new(env.query.clone(), outbox.clone(), cancel.child_token())
        .with_interval(Duration::from_millis(10))
        .with_clock(clock)
        .with_outcomes(patrol_tx)
        .run();

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), patrol_rx.recv())
            .await
            .expect("patrol in time")
            .expect("channel open");
    }

    cancel.cancel();
    scheduler.await.expect("scheduler exits cleanly");
    patrol.await.expect("patrol exits cleanly");

    let batches = outbox.batches.lock();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].normal.is_empty());
    assert_eq!(batches[0].overdue.len(), 1);
    assert_eq!(batches[0].overdue[0].content, "integration chore");

    // 18:40 is past the default summary hour.
    let summaries = outbox.summaries.lock();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].todos.len(), 1);
}
