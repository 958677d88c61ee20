//! Row conversion helpers and the column lists they expect.

use super::types::{StatusLog, Template, Todo, TodoView};

pub(crate) const TEMPLATE_COLUMNS: &str =
    "template_id, user_id, content, cron, ddl_offset, run_once, is_active, created_at";

/// Todo columns joined with template content; expects aliases `td` and `t`.
pub(crate) const TODO_VIEW_COLUMNS: &str = "td.todo_id, td.template_id, td.user_id, td.status, \
     td.remind_at, td.deadline, td.created_at, td.updated_at, t.content";

pub(crate) const TODO_VIEW_FROM: &str =
    "FROM todos td JOIN todo_templates t ON td.template_id = t.template_id";

pub(crate) const STATUS_LOG_COLUMNS: &str =
    "log_id, todo_id, old_status, new_status, changed_at";

pub(crate) fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        cron: row.get(3)?,
        ddl_offset: row.get(4)?,
        run_once: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub(crate) fn row_to_todo_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoView> {
    Ok(TodoView {
        todo: Todo {
            id: row.get(0)?,
            template_id: row.get(1)?,
            user_id: row.get(2)?,
            status: row.get(3)?,
            remind_at: row.get(4)?,
            deadline: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        },
        content: row.get(8)?,
    })
}

pub(crate) fn row_to_status_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusLog> {
    Ok(StatusLog {
        id: row.get(0)?,
        todo_id: row.get(1)?,
        old_status: row.get(2)?,
        new_status: row.get(3)?,
        changed_at: row.get(4)?,
    })
}
