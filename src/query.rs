//! Read-only projections over the task store.
//!
//! Every method runs on a reader connection and never takes the write lock.

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};

use crate::error::{Result, TaskError};
use crate::store::rows::{
    STATUS_LOG_COLUMNS, TEMPLATE_COLUMNS, TODO_VIEW_COLUMNS, TODO_VIEW_FROM, row_to_status_log,
    row_to_template, row_to_todo_view,
};
use crate::store::{StatusLog, Store, Template, TodoView};

/// Query handle; cheap to clone.
#[derive(Clone)]
pub struct TaskQuery {
    store: Arc<Store>,
}

impl TaskQuery {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Todos whose `remind_at` falls on `date`, or every todo when `None`,
    /// ordered by `remind_at`.
    pub fn todos_for_date(&self, date: Option<NaiveDate>) -> Result<Vec<TodoView>> {
        self.store.read(|conn| {
            let todos = match date {
                Some(date) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TODO_VIEW_COLUMNS} {TODO_VIEW_FROM} \
                         WHERE DATE(td.remind_at) = ?1 ORDER BY td.remind_at, td.todo_id"
                    ))?;
                    let rows = stmt.query_map(params![date], row_to_todo_view)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TODO_VIEW_COLUMNS} {TODO_VIEW_FROM} \
                         ORDER BY td.remind_at, td.todo_id"
                    ))?;
                    let rows = stmt.query_map([], row_to_todo_view)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(todos)
        })
    }

    /// One todo with its template content.
    pub fn get_todo(&self, todo_id: i64) -> Result<TodoView> {
        self.store.read(|conn| {
            conn.query_row(
                &format!("SELECT {TODO_VIEW_COLUMNS} {TODO_VIEW_FROM} WHERE td.todo_id = ?1"),
                params![todo_id],
                row_to_todo_view,
            )
            .optional()?
            .ok_or_else(|| TaskError::todo_not_found(todo_id))
        })
    }

    /// Every template, active or not, ordered by id.
    pub fn get_templates(&self) -> Result<Vec<Template>> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TEMPLATE_COLUMNS} FROM todo_templates ORDER BY template_id"
            ))?;
            let rows = stmt.query_map([], row_to_template)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Audit trail of one todo, oldest first. Empty for unknown ids.
    pub fn get_status_log(&self, todo_id: i64) -> Result<Vec<StatusLog>> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STATUS_LOG_COLUMNS} FROM todo_status_logs \
                 WHERE todo_id = ?1 ORDER BY changed_at, log_id"
            ))?;
            let rows = stmt.query_map(params![todo_id], row_to_status_log)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::engine::TaskEngine;
    use crate::store::{NewTemplate, TodoStatus};
    use chrono::NaiveDateTime;
    use tempfile::TempDir;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").expect("timestamp")
    }

    fn setup() -> (TempDir, TaskEngine, TaskQuery) {
        let dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(Store::open_at(&dir.path().join("alfred.db")).expect("open store"));
        (dir, TaskEngine::new(Arc::clone(&store)), TaskQuery::new(store))
    }

    fn add(engine: &TaskEngine, user: &str, content: &str, cron: &str) -> i64 {
        engine
            .add_template(
                &NewTemplate {
                    user_id: user,
                    content,
                    cron,
                    ddl_offset: "30m",
                    run_once: false,
                },
                ts("2025-11-01T08:00:00"),
            )
            .expect("add template")
    }

    #[test]
    fn todos_for_date_filters_by_calendar_day() {
        let (_dir, engine, query) = setup();
        add(&engine, "U1", "morning pills", "0 8 * * *");
        add(&engine, "U1", "evening walk", "30 19 * * *");

        engine.create_due_instances(ts("2025-11-07T20:00:00")).unwrap();
        engine.create_due_instances(ts("2025-11-08T20:00:00")).unwrap();

        let day = query
            .todos_for_date(NaiveDate::from_ymd_opt(2025, 11, 8))
            .unwrap();
        let got: Vec<(&str, NaiveDateTime)> = day
            .iter()
            .map(|v| (v.content.as_str(), v.todo.remind_at))
            .collect();
        assert_eq!(
            got,
            vec![
                ("morning pills", ts("2025-11-08T08:00:00")),
                ("evening walk", ts("2025-11-08T19:30:00")),
            ]
        );

        assert_eq!(query.todos_for_date(None).unwrap().len(), 4);
        assert!(query
            .todos_for_date(NaiveDate::from_ymd_opt(2025, 11, 9))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn all_todos_are_ordered_by_remind_at() {
        let (_dir, engine, query) = setup();
        add(&engine, "U1", "late", "0 18 * * *");
        add(&engine, "U2", "early", "0 6 * * *");
        engine.create_due_instances(ts("2025-11-08T20:00:00")).unwrap();

        let all = query.todos_for_date(None).unwrap();
        let contents: Vec<&str> = all.iter().map(|v| v.content.as_str()).collect();
        assert_eq!(contents, vec!["early", "late"]);
        assert_eq!(all[0].todo.user_id, "U2");
    }

    #[test]
    fn get_todo_joins_template_content() {
        let (_dir, engine, query) = setup();
        let template = add(&engine, "U1", "stand-up", "* * * * *");
        engine.create_due_instances(ts("2025-11-08T10:00:05")).unwrap();

        let view = query.get_todo(1).unwrap();
        assert_eq!(view.content, "stand-up");
        assert_eq!(view.todo.template_id, template);
        assert_eq!(view.todo.status, TodoStatus::Pending);
        assert_eq!(view.todo.deadline, ts("2025-11-08T10:30:00"));

        assert!(matches!(
            query.get_todo(99),
            Err(TaskError::NotFound { id: 99, .. })
        ));
    }

    #[test]
    fn get_templates_lists_inactive_ones_too() {
        let (_dir, engine, query) = setup();
        let a = add(&engine, "U1", "a", "* * * * *");
        let b = add(&engine, "U2", "b", "0 9 * * 1-5");
        engine
            .set_template_active(a, false, ts("2025-11-08T10:00:00"))
            .unwrap();

        let templates = query.get_templates().unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].id, a);
        assert!(!templates[0].is_active);
        assert_eq!(templates[1].id, b);
        assert_eq!(templates[1].cron, "0 9 * * 1-5");
        assert_eq!(templates[1].ddl_offset, "30m");
        assert!(templates[1].is_active);
    }

    #[test]
    fn status_log_is_chronological() {
        let (_dir, engine, query) = setup();
        add(&engine, "U1", "stand-up", "* * * * *");
        engine.create_due_instances(ts("2025-11-08T10:00:05")).unwrap();
        engine.complete_todo(1, ts("2025-11-08T10:01:00")).unwrap();
        engine.revert_completion(1, ts("2025-11-08T10:02:00")).unwrap();

        let log = query.get_status_log(1).unwrap();
        let pairs: Vec<_> = log
            .iter()
            .map(|l| (l.old_status, l.new_status, l.changed_at))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (None, TodoStatus::Pending, ts("2025-11-08T10:00:05")),
                (
                    Some(TodoStatus::Pending),
                    TodoStatus::Completed,
                    ts("2025-11-08T10:01:00")
                ),
                (
                    Some(TodoStatus::Completed),
                    TodoStatus::Pending,
                    ts("2025-11-08T10:02:00")
                ),
            ]
        );
        assert!(query.get_status_log(42).unwrap().is_empty());
    }
}
