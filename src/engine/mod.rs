//! Scheduling engine: the todo state machine over the store.
//!
//! Every public operation runs as exactly one store transaction. Batch
//! operations wrap each item in a savepoint so one bad template or todo is
//! rolled back and logged without disturbing the rest of the batch.

pub mod occurrence;
pub mod offset;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TaskError};
use crate::store::rows::{TEMPLATE_COLUMNS, row_to_template};
use crate::store::{NewTemplate, Store, Template, TodoStatus};

pub use occurrence::CronSchedule;
pub use offset::parse_offset;

/// Outcome of a user-driven status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Transition {
    /// The todo moved from one status to another and a log was appended.
    Changed { from: TodoStatus, to: TodoStatus },
    /// Nothing was written; the todo stays in this status.
    Unchanged { status: TodoStatus },
}

/// Counts from one driver tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub created: usize,
    pub escalated: usize,
}

/// Monotonic counters, for observability.
#[derive(Debug, Default)]
struct EngineStats {
    created: AtomicU64,
    escalated: AtomicU64,
    completed: AtomicU64,
    reverted: AtomicU64,
    revoked: AtomicU64,
    item_failures: AtomicU64,
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub created: u64,
    pub escalated: u64,
    pub completed: u64,
    pub reverted: u64,
    pub revoked: u64,
    pub item_failures: u64,
}

/// Scheduling engine bound to one store.
pub struct TaskEngine {
    store: Arc<Store>,
    stats: EngineStats,
}

impl TaskEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            stats: EngineStats::default(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.stats.created.load(Ordering::Relaxed),
            escalated: self.stats.escalated.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            reverted: self.stats.reverted.load(Ordering::Relaxed),
            revoked: self.stats.revoked.load(Ordering::Relaxed),
            item_failures: self.stats.item_failures.load(Ordering::Relaxed),
        }
    }

    /// Validate and insert a new active template.
    ///
    /// The cron expression and offset are checked before any write.
    pub fn add_template(&self, new: &NewTemplate<'_>, at: NaiveDateTime) -> Result<i64> {
        CronSchedule::parse(new.cron)?;
        parse_offset(new.ddl_offset)?;

        let id = self.store.transaction(|tx| -> Result<i64> {
            tx.execute(
                "INSERT INTO todo_templates \
                 (user_id, content, cron, ddl_offset, run_once, is_active, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![
                    new.user_id,
                    new.content,
                    new.cron,
                    new.ddl_offset,
                    new.run_once,
                    at
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })?;

        info!(
            template_id = id,
            user_id = new.user_id,
            cron = new.cron,
            offset = new.ddl_offset,
            run_once = new.run_once,
            "template added"
        );
        Ok(id)
    }

    /// Materialize the most recent due occurrence of every active template.
    ///
    /// Idempotent: calling again with the same or an earlier `now` creates
    /// nothing new. Returns the number of todos created.
    pub fn create_due_instances(&self, now: NaiveDateTime) -> Result<usize> {
        let (created, failed) = self.store.transaction(|tx| -> Result<(usize, u64)> {
            let templates = active_templates(tx)?;
            let mut created = 0usize;
            let mut failed = 0u64;

            for template in &templates {
                let sp = tx.savepoint()?;
                match instantiate_if_due(&sp, template, now) {
                    Ok(Some(todo_id)) => {
                        sp.commit()?;
                        created += 1;
                        info!(
                            todo_id,
                            template_id = template.id,
                            user_id = %template.user_id,
                            "todo created"
                        );
                        if template.run_once {
                            info!(template_id = template.id, "one-time template deactivated");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // `sp` rolls back on drop.
                        failed += 1;
                        error!(
                            template_id = template.id,
                            user_id = %template.user_id,
                            error = %e,
                            "cannot schedule template"
                        );
                    }
                }
            }
            Ok((created, failed))
        })?;

        // Counted only once the transaction is committed.
        self.stats
            .created
            .fetch_add(created as u64, Ordering::Relaxed);
        self.stats.item_failures.fetch_add(failed, Ordering::Relaxed);
        if created == 0 {
            debug!(%now, "no new todos to schedule");
        } else {
            info!(%now, created, "scheduled new todos");
        }
        Ok(created)
    }

    /// Escalate every pending todo whose deadline is before `now`.
    ///
    /// Returns the number of todos escalated.
    pub fn escalate_overdue(&self, now: NaiveDateTime) -> Result<usize> {
        let (escalated, failed) = self.store.transaction(|tx| -> Result<(usize, u64)> {
            let overdue: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT todo_id FROM todos WHERE status = ?1 AND deadline < ?2 \
                     ORDER BY deadline, todo_id",
                )?;
                let rows = stmt.query_map(params![TodoStatus::Pending, now], |r| r.get(0))?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut escalated = 0usize;
            let mut failed = 0u64;
            for todo_id in overdue {
                let sp = tx.savepoint()?;
                match record_transition(
                    &sp,
                    todo_id,
                    TodoStatus::Pending,
                    TodoStatus::Escalated,
                    now,
                ) {
                    Ok(()) => {
                        sp.commit()?;
                        escalated += 1;
                        info!(todo_id, "todo escalated");
                    }
                    Err(e) => {
                        failed += 1;
                        error!(todo_id, error = %e, "cannot escalate todo");
                    }
                }
            }
            Ok((escalated, failed))
        })?;

        self.stats
            .escalated
            .fetch_add(escalated as u64, Ordering::Relaxed);
        self.stats.item_failures.fetch_add(failed, Ordering::Relaxed);
        if escalated > 0 {
            info!(%now, escalated, "escalated overdue todos");
        }
        Ok(escalated)
    }

    /// One driver pass: create due instances, then escalate overdue ones.
    ///
    /// Escalation runs even when scheduling failed; the first error is
    /// returned after both have been attempted.
    pub fn tick(&self, now: NaiveDateTime) -> Result<TickReport> {
        let created = self.create_due_instances(now);
        let escalated = self.escalate_overdue(now);

        match (created, escalated) {
            (Ok(created), Ok(escalated)) => Ok(TickReport { created, escalated }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(first), Err(second)) => {
                error!(error = %second, "escalation failed in the same tick");
                Err(first)
            }
        }
    }

    /// Mark a todo completed. Already completed or revoked todos are left
    /// untouched.
    pub fn complete_todo(&self, todo_id: i64, at: NaiveDateTime) -> Result<Transition> {
        let transition = self.store.transaction(|tx| -> Result<Transition> {
            let status = current_status(tx, todo_id)?;
            if status.is_final() {
                return Ok(Transition::Unchanged { status });
            }
            record_transition(tx, todo_id, status, TodoStatus::Completed, at)?;
            Ok(Transition::Changed {
                from: status,
                to: TodoStatus::Completed,
            })
        })?;

        match transition {
            Transition::Changed { from, .. } => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                info!(todo_id, was = %from, "todo completed");
            }
            Transition::Unchanged { status } => {
                info!(todo_id, %status, "todo already final, completion ignored");
            }
        }
        Ok(transition)
    }

    /// Revert a completed todo back to `pending`.
    ///
    /// Always returns to `pending`, even past the deadline; the next
    /// escalation sweep re-escalates it. Fails with `InvalidState` when the
    /// todo is not `completed`.
    pub fn revert_completion(&self, todo_id: i64, at: NaiveDateTime) -> Result<Transition> {
        let result = self.store.transaction(|tx| -> Result<Transition> {
            let status = current_status(tx, todo_id)?;
            if status != TodoStatus::Completed {
                return Err(TaskError::InvalidState {
                    todo_id,
                    status,
                    action: "revert",
                });
            }
            record_transition(tx, todo_id, TodoStatus::Completed, TodoStatus::Pending, at)?;
            Ok(Transition::Changed {
                from: TodoStatus::Completed,
                to: TodoStatus::Pending,
            })
        });

        match &result {
            Ok(_) => {
                self.stats.reverted.fetch_add(1, Ordering::Relaxed);
                info!(todo_id, "todo reverted to pending");
            }
            Err(e @ TaskError::InvalidState { .. }) => warn!(todo_id, "{e}"),
            Err(_) => {}
        }
        result
    }

    /// Activate or deactivate a template.
    ///
    /// Deactivation revokes every pending or escalated todo of the template
    /// in the same transaction. Returns the number of todos revoked.
    pub fn set_template_active(
        &self,
        template_id: i64,
        active: bool,
        at: NaiveDateTime,
    ) -> Result<usize> {
        let revoked = self.store.transaction(|tx| -> Result<usize> {
            let rows = tx.execute(
                "UPDATE todo_templates SET is_active = ?1 WHERE template_id = ?2",
                params![active, template_id],
            )?;
            if rows == 0 {
                return Err(TaskError::template_not_found(template_id));
            }
            if active {
                return Ok(0);
            }

            let open: Vec<(i64, TodoStatus)> = {
                let mut stmt = tx.prepare(
                    "SELECT todo_id, status FROM todos \
                     WHERE template_id = ?1 AND status IN (?2, ?3) ORDER BY todo_id",
                )?;
                let rows = stmt.query_map(
                    params![template_id, TodoStatus::Pending, TodoStatus::Escalated],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            for (todo_id, status) in &open {
                record_transition(tx, *todo_id, *status, TodoStatus::Revoked, at)?;
                debug!(todo_id, was = %status, "todo revoked");
            }
            Ok(open.len())
        })?;

        self.stats
            .revoked
            .fetch_add(revoked as u64, Ordering::Relaxed);
        info!(template_id, active, revoked, "template active flag set");
        Ok(revoked)
    }
}

// ---------------------------------------------------------------------------
// Transaction helpers
// ---------------------------------------------------------------------------

fn active_templates(conn: &Connection) -> Result<Vec<Template>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM todo_templates WHERE is_active = 1 ORDER BY template_id"
    ))?;
    let rows = stmt.query_map([], row_to_template)?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}

fn current_status(conn: &Connection, todo_id: i64) -> Result<TodoStatus> {
    conn.query_row(
        "SELECT status FROM todos WHERE todo_id = ?1",
        params![todo_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| TaskError::todo_not_found(todo_id))
}

/// Create the todo for `template`'s latest occurrence unless it exists.
///
/// Returns the new todo id, or `None` when nothing was due or the
/// occurrence is already materialized.
fn instantiate_if_due(
    conn: &Connection,
    template: &Template,
    now: NaiveDateTime,
) -> Result<Option<i64>> {
    let schedule = CronSchedule::parse(&template.cron)?;
    let Some(remind_at) = schedule.previous_occurrence(now) else {
        return Ok(None);
    };

    let exists = conn
        .query_row(
            "SELECT 1 FROM todos WHERE user_id = ?1 AND template_id = ?2 AND remind_at = ?3",
            params![template.user_id, template.id, remind_at],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Ok(None);
    }

    let offset = parse_offset(&template.ddl_offset)?;
    let deadline = remind_at
        .checked_add_signed(offset)
        .ok_or_else(|| TaskError::InvalidOffsetFormat(template.ddl_offset.clone()))?;

    let todo_id = insert_todo(conn, template, remind_at, deadline, now)?;

    if template.run_once {
        conn.execute(
            "UPDATE todo_templates SET is_active = 0 WHERE template_id = ?1",
            params![template.id],
        )?;
    }
    Ok(Some(todo_id))
}

/// Insert a pending todo together with its birth log.
fn insert_todo(
    conn: &Connection,
    template: &Template,
    remind_at: NaiveDateTime,
    deadline: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO todos \
         (template_id, user_id, status, remind_at, deadline, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            template.id,
            template.user_id,
            TodoStatus::Pending,
            remind_at,
            deadline,
            now
        ],
    )?;
    let todo_id = conn.last_insert_rowid();
    append_log(conn, todo_id, None, TodoStatus::Pending, now)?;
    Ok(todo_id)
}

/// Move a todo from `from` to `to` and append the matching log entry.
fn record_transition(
    conn: &Connection,
    todo_id: i64,
    from: TodoStatus,
    to: TodoStatus,
    at: NaiveDateTime,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE todos SET status = ?1, updated_at = ?2 WHERE todo_id = ?3 AND status = ?4",
        params![to, at, todo_id, from],
    )?;
    if rows == 0 {
        let status = current_status(conn, todo_id)?;
        return Err(TaskError::InvalidState {
            todo_id,
            status,
            action: "change status",
        });
    }
    append_log(conn, todo_id, Some(from), to, at)
}

fn append_log(
    conn: &Connection,
    todo_id: i64,
    old: Option<TodoStatus>,
    new: TodoStatus,
    at: NaiveDateTime,
) -> Result<()> {
    conn.execute(
        "INSERT INTO todo_status_logs (todo_id, old_status, new_status, changed_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![todo_id, old, new, at],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
