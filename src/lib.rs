//! Alfred: recurring-task scheduler with an audited todo state machine.
//!
//! Cron-defined templates are materialized into todos when they fall due,
//! escalated once their deadline passes, and completed, reverted or revoked
//! by user and admin actions. Every status change is written together with
//! an audit log entry in one SQLite transaction.
//!
//! # Architecture
//!
//! - **Store**: SQLite in WAL mode; one writer lock, pooled readers
//! - **Engine**: instantiation, escalation and the user/admin transitions
//! - **Query**: read-only projections joining todos to their templates
//! - **Scheduler**: tokio drivers for the engine tick and the notification patrol
//! - **Notify**: in-memory reminder dedup and the delivery sink trait
//! - **Format**: pluggable text rendering for chat front ends

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod logging;
pub mod notify;
pub mod query;
pub mod scheduler;
pub mod store;

pub use config::AlfredConfig;
pub use engine::{TaskEngine, TickReport, Transition};
pub use error::{Result, TaskError};
pub use query::TaskQuery;
pub use store::{Store, TodoStatus};
