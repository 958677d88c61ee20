//! SQLite-backed task store.
//!
//! One writer connection guarded by a mutex serializes every write
//! transaction process-wide. Reads go through a small pool of read-only
//! connections and never touch the writer lock; WAL mode lets them run
//! while a write transaction is open.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use super::schema::{CONNECTION_PRAGMAS, TABLES, apply_schema, read_schema_version};
use super::types::CURRENT_SCHEMA_VERSION;
use crate::config::StoreConfig;

/// Upper bound on idle read connections kept for reuse.
const MAX_IDLE_READERS: usize = 4;

/// Shared handle to the task database.
///
/// Construct once at process start and pass an `Arc<Store>` to the
/// engine, the query layer and the drivers.
pub struct Store {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
    lock_timeout: Duration,
    busy_timeout: Duration,
}

impl Store {
    /// Open (or create) the database described by `config`.
    ///
    /// Creates the parent directory and applies the schema.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open_with(
            &config.path,
            Duration::from_millis(config.lock_timeout_ms),
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    /// Open with default timeouts. Handy for tests and tools.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let defaults = StoreConfig::default();
        Self::open_with(
            path,
            Duration::from_millis(defaults.lock_timeout_ms),
            Duration::from_millis(defaults.busy_timeout_ms),
        )
    }

    fn open_with(
        path: &Path,
        lock_timeout: Duration,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        apply_schema(&conn)?;

        let version = read_schema_version(&conn)?;
        if let Some(found) = version.filter(|v| *v > CURRENT_SCHEMA_VERSION) {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        info!(path = %path.display(), schema_version = ?version, "task store opened");

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(conn),
            readers: Mutex::new(Vec::new()),
            lock_timeout,
            busy_timeout,
        })
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the schema version stamp.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        self.read(|conn| read_schema_version(conn).map_err(StoreError::from))
    }

    /// Run `f` inside one write transaction.
    ///
    /// Waits at most `lock_timeout` for the writer lock, then begins an
    /// IMMEDIATE transaction so another process holding the database waits
    /// out `busy_timeout` at `BEGIN` instead of failing on the first write
    /// after a read. Commits when `f`
    /// returns `Ok`; rolls back when it returns `Err` or unwinds. The lock
    /// is released in every case. Helpers that need to write as part of
    /// the same operation take the `Transaction` passed to `f` rather
    /// than calling `transaction` again.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let waited = Instant::now();
        let mut conn = self.writer.try_lock_for(self.lock_timeout).ok_or_else(|| {
            warn!(timeout = ?self.lock_timeout, "write lock wait exceeded");
            StoreError::LockTimeout(self.lock_timeout)
        })?;
        debug!(waited = ?waited.elapsed(), "write lock acquired");

        let mut tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(e) => {
                // Dropping `tx` would roll back too; do it explicitly so a
                // rollback failure is at least visible in the log.
                if let Err(rb) = tx.rollback() {
                    warn!(error = %rb, "rollback failed");
                }
                debug!("transaction rolled back");
                Err(e)
            }
        }
    }

    /// Run `f` against a read-only connection without taking the write lock.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let conn = match self.readers.lock().pop() {
            Some(conn) => conn,
            None => self.open_reader()?,
        };

        let result = f(&conn);

        let mut idle = self.readers.lock();
        if idle.len() < MAX_IDLE_READERS {
            idle.push(conn);
        }
        result
    }

    /// Snapshot every table as JSON rows keyed by table name.
    pub fn dump(&self) -> Result<serde_json::Value, StoreError> {
        self.read(|conn| {
            let mut all = serde_json::Map::new();
            for table in TABLES {
                let mut stmt = conn.prepare(&format!("SELECT * FROM {table}"))?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|c| (*c).to_owned()).collect();
                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut obj = serde_json::Map::new();
                    for (i, name) in columns.iter().enumerate() {
                        obj.insert(name.clone(), value_to_json(row.get_ref(i)?));
                    }
                    out.push(serde_json::Value::Object(obj));
                }
                all.insert((*table).to_owned(), serde_json::Value::Array(out));
            }
            Ok(serde_json::Value::Object(all))
        })
    }

    fn open_reader(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        debug!("read connection opened");
        Ok(conn)
    }
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::from(format!("<{} bytes>", b.len())),
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the SQLite store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("timed out after {0:?} waiting for the write lock")]
    LockTimeout(Duration),

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
