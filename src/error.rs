//! Error types for the alfred task engine.

use crate::store::{StoreError, TodoStatus};

/// Which kind of entity a [`TaskError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Template,
    Todo,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Template => f.write_str("template"),
            Self::Todo => f.write_str("todo"),
        }
    }
}

/// Top-level error type for engine and query operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Referenced template or todo does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    /// Cron expression rejected by the cron evaluator.
    #[error("invalid cron expression `{expr}`: {reason}")]
    InvalidCron { expr: String, reason: String },

    /// Deadline offset token does not match `<integer><s|m|h|d>`.
    #[error("invalid offset format `{0}` (expected e.g. 30s, 5m, 2h, 1d)")]
    InvalidOffsetFormat(String),

    /// The todo's current status forbids the requested transition.
    #[error("todo {todo_id} is {status}, cannot {action}")]
    InvalidState {
        todo_id: i64,
        status: TodoStatus,
        action: &'static str,
    },

    /// Persistence or transaction failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

impl TaskError {
    pub(crate) fn template_not_found(id: i64) -> Self {
        Self::NotFound {
            kind: EntityKind::Template,
            id,
        }
    }

    pub(crate) fn todo_not_found(id: i64) -> Self {
        Self::NotFound {
            kind: EntityKind::Todo,
            id,
        }
    }
}

impl From<rusqlite::Error> for TaskError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(e))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TaskError>;
