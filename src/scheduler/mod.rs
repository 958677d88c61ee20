//! Background drivers.
//!
//! - `runner`: the periodic scheduling driver (create due todos, escalate
//!   overdue ones).
//! - `patrol`: the notification patrol feeding a [`NoticeSink`](crate::notify::NoticeSink).
//!
//! Both run one pass at a time on the blocking pool and stop when their
//! cancellation token fires.

pub mod patrol;
pub mod runner;

use std::sync::Arc;

use chrono::NaiveDateTime;

pub use patrol::PatrolDriver;
pub use runner::{Scheduler, TickOutcome};

/// Wall-clock source handed to the drivers.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Local wall-clock time.
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

/// A clock frozen at `at`.
pub fn fixed_clock(at: NaiveDateTime) -> Clock {
    Arc::new(move || at)
}
