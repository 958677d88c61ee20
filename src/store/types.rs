//! Entity snapshots handed out by the store.
//!
//! Everything here is a plain owned value: callers never hold a live
//! handle into the database.

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Lifecycle status of a todo instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    Completed,
    Escalated,
    Revoked,
}

impl TodoStatus {
    /// Column representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Escalated => "escalated",
            Self::Revoked => "revoked",
        }
    }

    /// Parse the column representation. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "escalated" => Some(Self::Escalated),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    /// `completed` and `revoked` accept no further completion.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Revoked)
    }

    /// Statuses revoked when the owning template is deactivated.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Escalated)
    }
}

impl std::fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TodoStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TodoStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown todo status `{s}`").into()))
    }
}

/// A recurring task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    pub cron: String,
    pub ddl_offset: String,
    pub run_once: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// Parameters for creating a template.
#[derive(Debug, Clone)]
pub struct NewTemplate<'a> {
    pub user_id: &'a str,
    pub content: &'a str,
    pub cron: &'a str,
    pub ddl_offset: &'a str,
    pub run_once: bool,
}

/// One materialized occurrence of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub template_id: i64,
    pub user_id: String,
    pub status: TodoStatus,
    pub remind_at: NaiveDateTime,
    pub deadline: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A todo joined with its template's content, as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoView {
    #[serde(flatten)]
    pub todo: Todo,
    pub content: String,
}

/// Immutable audit record of one status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLog {
    pub id: i64,
    pub todo_id: i64,
    /// `None` only for the birth record.
    pub old_status: Option<TodoStatus>,
    pub new_status: TodoStatus,
    pub changed_at: NaiveDateTime,
}
