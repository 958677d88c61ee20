//! Shared helpers for integration tests.

use std::sync::Arc;

use alfred::store::NewTemplate;
use alfred::{Store, TaskEngine, TaskQuery};
use chrono::NaiveDateTime;

/// A store in a temp directory with an engine and a query handle over it.
pub(crate) struct TestEnv {
    pub dir: tempfile::TempDir,
    pub store: Arc<Store>,
    pub engine: Arc<TaskEngine>,
    pub query: TaskQuery,
}

pub(crate) fn test_env() -> TestEnv {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = Arc::new(Store::open_at(&dir.path().join("alfred.db")).expect("open store"));
    TestEnv {
        engine: Arc::new(TaskEngine::new(Arc::clone(&store))),
        query: TaskQuery::new(Arc::clone(&store)),
        store,
        dir,
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SS`.
pub(crate) fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").expect("timestamp")
}

pub(crate) fn add_template(env: &TestEnv, user: &str, cron: &str, offset: &str) -> i64 {
    env.engine
        .add_template(
            &NewTemplate {
                user_id: user,
                content: "integration chore",
                cron,
                ddl_offset: offset,
                run_once: false,
            },
            ts("2025-11-01T00:00:00"),
        )
        .expect("add template")
}
