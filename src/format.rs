//! Text rendering of todos, templates and audit logs for chat front ends.
//!
//! The engine never formats anything; callers pick a [`TodoFormatter`].

use chrono::NaiveDateTime;

use crate::notify::{DailySummary, NoticeBatch};
use crate::store::{StatusLog, Template, TodoStatus, TodoView};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn stamp(at: NaiveDateTime) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Renders domain snapshots as message text.
///
/// Only the single-item methods are required; list and notice layouts
/// default to bullet lists built from them.
pub trait TodoFormatter: Send + Sync {
    fn todo(&self, todo: &TodoView) -> String;

    fn template(&self, template: &Template) -> String;

    fn status_log(&self, log: &StatusLog) -> String;

    fn todos(&self, todos: &[TodoView]) -> String {
        join_or(todos.iter().map(|t| self.todo(t)), "_No todos found._")
    }

    fn templates(&self, templates: &[Template]) -> String {
        join_or(
            templates.iter().map(|t| self.template(t)),
            "_No templates found._",
        )
    }

    fn status_logs(&self, logs: &[StatusLog]) -> String {
        join_or(logs.iter().map(|l| self.status_log(l)), "_No logs found._")
    }

    fn notice(&self, batch: &NoticeBatch) -> String {
        let overdue = join_or(batch.overdue.iter().map(|t| self.todo(t)), "_Nothing overdue._");
        let normal = join_or(batch.normal.iter().map(|t| self.todo(t)), "_All caught up._");
        format!("Todo reminder\n\nOverdue:\n{overdue}\n\nDue now:\n{normal}")
    }

    fn summary(&self, summary: &DailySummary) -> String {
        format!(
            "Daily summary for {}\n{}",
            summary.date.format("%Y-%m-%d"),
            self.todos(&summary.todos)
        )
    }
}

fn join_or(lines: impl Iterator<Item = String>, empty: &str) -> String {
    let lines: Vec<String> = lines.collect();
    if lines.is_empty() {
        empty.to_owned()
    } else {
        lines.join("\n")
    }
}

/// One bullet per item; used by the CLI and the log sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl TodoFormatter for PlainFormatter {
    fn todo(&self, todo: &TodoView) -> String {
        format!(
            "- [ID: {}] {} (Status: {}, DDL: {})",
            todo.todo.id,
            todo.content,
            todo.todo.status,
            stamp(todo.todo.deadline)
        )
    }

    fn template(&self, template: &Template) -> String {
        format!(
            "- [ID: {}] {} (User: {}, Cron: {}, Offset: {}, Once: {}, Active: {})",
            template.id,
            template.content,
            template.user_id,
            template.cron,
            template.ddl_offset,
            template.run_once,
            template.is_active
        )
    }

    fn status_log(&self, log: &StatusLog) -> String {
        let old = log.old_status.map_or("none", TodoStatus::as_str);
        format!(
            "- [Time: {}] Status changed from {} to {}",
            stamp(log.changed_at),
            old,
            log.new_status
        )
    }
}

/// Slack-style mrkdwn: final todos struck through, owner mention and
/// status on a quoted metadata line.
#[derive(Debug, Clone, Copy, Default)]
pub struct MrkdwnFormatter;

impl MrkdwnFormatter {
    fn status_label(status: TodoStatus) -> &'static str {
        match status {
            TodoStatus::Pending => "⏳ Pending",
            TodoStatus::Completed => "✅ Completed",
            TodoStatus::Escalated => "🚨 Escalated",
            TodoStatus::Revoked => "↩️ Revoked",
        }
    }
}

impl TodoFormatter for MrkdwnFormatter {
    fn todo(&self, todo: &TodoView) -> String {
        let status = todo.todo.status;
        let content = if status.is_final() {
            format!("~{}~", todo.content)
        } else {
            format!("*{}*", todo.content)
        };
        format!(
            "{content}\n> *By*: <@{}> | *ID*: {} | *Status*: {} | *DDL*: {}",
            todo.todo.user_id,
            todo.todo.id,
            Self::status_label(status),
            stamp(todo.todo.deadline)
        )
    }

    fn template(&self, template: &Template) -> String {
        let active = if template.is_active { "active" } else { "inactive" };
        format!(
            "*[{}]* {} `{}` +{} ({active}) <@{}>",
            template.id, template.content, template.cron, template.ddl_offset, template.user_id
        )
    }

    fn status_log(&self, log: &StatusLog) -> String {
        match log.old_status {
            Some(old) => format!(
                "`{}` {} → {}",
                stamp(log.changed_at),
                Self::status_label(old),
                Self::status_label(log.new_status)
            ),
            None => format!(
                "`{}` created as {}",
                stamp(log.changed_at),
                Self::status_label(log.new_status)
            ),
        }
    }

    fn notice(&self, batch: &NoticeBatch) -> String {
        let overdue = join_or(
            batch.overdue.iter().map(|t| self.todo(t)),
            "_Great, nothing is overdue._",
        );
        let normal = join_or(
            batch.normal.iter().map(|t| self.todo(t)),
            "_Every todo is cleared!_",
        );
        format!("*🔔 Todo reminder*\n\n*🚨 Overdue*\n{overdue}\n\n*📋 Due now*\n{normal}")
    }

    fn summary(&self, summary: &DailySummary) -> String {
        format!(
            "*📊 Summary for {}*\n{}",
            summary.date.format("%Y-%m-%d"),
            self.todos(&summary.todos)
        )
    }
}
