//! Notification gate: decides which todos still need a reminder.
//!
//! The gate remembers, in memory only, which todo ids were already
//! delivered per class (`normal`, `overdue`) and on which dates the daily
//! summary went out. Nothing is remembered until the caller confirms a
//! delivery, so a failed send is offered again on the next pass. Only
//! today's todos are ever offered, so the id sets are cleared when the
//! date rolls over. A restart forgets everything and may repeat one round
//! of reminders.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::format::TodoFormatter;
use crate::query::TaskQuery;
use crate::store::{TodoStatus, TodoView};

/// Reminder class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeClass {
    /// The reminder window is open and the deadline has not passed.
    Normal,
    /// The deadline has passed.
    Overdue,
}

/// Todos to announce in one reminder message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticeBatch {
    pub at: NaiveDateTime,
    pub normal: Vec<TodoView>,
    pub overdue: Vec<TodoView>,
}

impl NoticeBatch {
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.overdue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.normal.len() + self.overdue.len()
    }
}

/// End-of-day overview of one date's todos.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub todos: Vec<TodoView>,
}

/// Failure reported by a delivery channel.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery channel unavailable: {0}")]
    Unavailable(String),

    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Outbound channel for reminders, e.g. a chat client.
pub trait NoticeSink: Send + Sync {
    fn deliver(&self, batch: &NoticeBatch) -> std::result::Result<(), DeliveryError>;

    fn deliver_summary(&self, summary: &DailySummary) -> std::result::Result<(), DeliveryError>;
}

/// Sink that writes rendered notices to the tracing log.
pub struct LogSink<F> {
    formatter: F,
}

impl<F: TodoFormatter> LogSink<F> {
    pub fn new(formatter: F) -> Self {
        Self { formatter }
    }
}

impl<F: TodoFormatter> NoticeSink for LogSink<F> {
    fn deliver(&self, batch: &NoticeBatch) -> std::result::Result<(), DeliveryError> {
        info!(
            normal = batch.normal.len(),
            overdue = batch.overdue.len(),
            "reminder\n{}",
            self.formatter.notice(batch)
        );
        Ok(())
    }

    fn deliver_summary(&self, summary: &DailySummary) -> std::result::Result<(), DeliveryError> {
        info!(date = %summary.date, "daily summary\n{}", self.formatter.summary(summary));
        Ok(())
    }
}

/// What one patrol pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatrolOutcome {
    /// Todos confirmed delivered in this pass.
    pub notified: usize,
    pub summary_sent: bool,
    /// At least one delivery failed; its items stay pending for next time.
    pub delivery_failed: bool,
}

/// Per-process reminder dedup state.
#[derive(Debug)]
pub struct NotificationGate {
    sent_normal: HashSet<i64>,
    sent_overdue: HashSet<i64>,
    sent_summaries: HashSet<NaiveDate>,
    /// Date the id sets belong to.
    day: Option<NaiveDate>,
    summary_hour: u32,
}

impl NotificationGate {
    pub fn new(summary_hour: u32) -> Self {
        Self {
            sent_normal: HashSet::new(),
            sent_overdue: HashSet::new(),
            sent_summaries: HashSet::new(),
            day: None,
            summary_hour,
        }
    }

    /// Candidates among `todos` at `now`, minus ids already delivered.
    ///
    /// Only todos whose `remind_at` falls on `now`'s date are considered.
    /// Normal: pending and `remind_at <= now < deadline`. Overdue: pending
    /// or escalated and `deadline <= now`.
    pub fn select(&self, todos: &[TodoView], now: NaiveDateTime) -> NoticeBatch {
        let today = now.date();
        let mut batch = NoticeBatch {
            at: now,
            normal: Vec::new(),
            overdue: Vec::new(),
        };

        for view in todos.iter().filter(|v| v.todo.remind_at.date() == today) {
            let todo = &view.todo;
            if todo.status == TodoStatus::Pending
                && todo.remind_at <= now
                && now < todo.deadline
                && !self.sent_normal.contains(&todo.id)
            {
                batch.normal.push(view.clone());
            }
            if todo.status.is_open()
                && todo.deadline <= now
                && !self.sent_overdue.contains(&todo.id)
            {
                batch.overdue.push(view.clone());
            }
        }
        batch
    }

    /// [`select`](Self::select) over today's todos from the store.
    pub fn gather(&self, query: &TaskQuery, now: NaiveDateTime) -> Result<NoticeBatch> {
        let todos = query.todos_for_date(Some(now.date()))?;
        Ok(self.select(&todos, now))
    }

    /// Record a batch as delivered.
    pub fn confirm(&mut self, batch: &NoticeBatch) {
        self.roll_over(batch.at.date());
        self.sent_normal.extend(batch.normal.iter().map(|v| v.todo.id));
        self.sent_overdue.extend(batch.overdue.iter().map(|v| v.todo.id));
        debug!(
            normal = self.sent_normal.len(),
            overdue = self.sent_overdue.len(),
            "notification sets updated"
        );
    }

    /// Whether `id` was already delivered in `class`.
    pub fn was_notified(&self, class: NoticeClass, id: i64) -> bool {
        match class {
            NoticeClass::Normal => self.sent_normal.contains(&id),
            NoticeClass::Overdue => self.sent_overdue.contains(&id),
        }
    }

    /// The day's summary, once per date from `summary_hour` on.
    pub fn gather_summary(
        &self,
        query: &TaskQuery,
        now: NaiveDateTime,
    ) -> Result<Option<DailySummary>> {
        let date = now.date();
        if now.hour() < self.summary_hour || self.sent_summaries.contains(&date) {
            return Ok(None);
        }
        let todos = query.todos_for_date(Some(date))?;
        Ok(Some(DailySummary { date, todos }))
    }

    pub fn confirm_summary(&mut self, summary: &DailySummary) {
        self.roll_over(summary.date);
        self.sent_summaries.insert(summary.date);
    }

    /// Number of ids remembered across both classes.
    pub fn tracked(&self) -> usize {
        self.sent_normal.len() + self.sent_overdue.len()
    }

    /// Forget everything that belongs to a day before `date`.
    fn roll_over(&mut self, date: NaiveDate) {
        if self.day.is_some_and(|day| day >= date) {
            return;
        }
        if let Some(previous) = self.day {
            debug!(
                %previous,
                %date,
                dropped = self.tracked(),
                "notification sets reset for new day"
            );
        }
        self.sent_normal.clear();
        self.sent_overdue.clear();
        self.sent_summaries.retain(|d| *d >= date);
        self.day = Some(date);
    }

    /// Gather, deliver through `sink` and confirm what went out.
    ///
    /// Delivery failures are logged and leave the gate unchanged for the
    /// affected message. Store errors propagate.
    pub fn patrol(
        &mut self,
        query: &TaskQuery,
        sink: &dyn NoticeSink,
        now: NaiveDateTime,
    ) -> Result<PatrolOutcome> {
        let mut outcome = PatrolOutcome::default();
        self.roll_over(now.date());

        let batch = self.gather(query, now)?;
        if !batch.is_empty() {
            match sink.deliver(&batch) {
                Ok(()) => {
                    self.confirm(&batch);
                    outcome.notified = batch.len();
                    info!(notified = outcome.notified, "reminders delivered");
                }
                Err(e) => {
                    outcome.delivery_failed = true;
                    error!(error = %e, pending = batch.len(), "reminder delivery failed");
                }
            }
        }

        if let Some(summary) = self.gather_summary(query, now)? {
            match sink.deliver_summary(&summary) {
                Ok(()) => {
                    self.confirm_summary(&summary);
                    outcome.summary_sent = true;
                    info!(date = %summary.date, todos = summary.todos.len(), "daily summary delivered");
                }
                Err(e) => {
                    outcome.delivery_failed = true;
                    error!(error = %e, date = %summary.date, "daily summary delivery failed");
                }
            }
        }
        Ok(outcome)
    }
}
