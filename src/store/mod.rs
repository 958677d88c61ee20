//! Persistent task store.
//!
//! Sub-modules:
//! - `types`: entity snapshots (`Template`, `Todo`, `StatusLog`) and `TodoStatus`.
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: the `Store` handle with its transaction and read paths.
//! - `rows`: row conversion and the shared SQL used by the engine and queries.

pub(crate) mod rows;
pub(crate) mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::{Store, StoreError};
pub use types::{NewTemplate, StatusLog, Template, Todo, TodoStatus, TodoView};
