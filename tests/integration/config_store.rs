//! Config file driving store setup.

use std::sync::Arc;

use alfred::{AlfredConfig, Store, TaskEngine, TaskError};

use crate::helpers::ts;

#[test]
fn store_opens_where_the_config_points() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = dir.path().join("data").join("tasks.db");
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[store]\npath = {:?}\nlock_timeout_ms = 250\n\n[scheduler]\ntick_interval_secs = 5\n",
            db.display().to_string()
        ),
    )
    .expect("write config");

    let config = AlfredConfig::load(Some(&config_path)).expect("load config");
    assert_eq!(config.store.path, db);
    assert_eq!(config.store.lock_timeout_ms, 250);
    assert_eq!(config.store.busy_timeout_ms, 10_000);
    assert_eq!(config.scheduler.tick_interval_secs, 5);

    let store = Arc::new(Store::open(&config.store).expect("open store"));
    assert!(db.exists());
    let engine = TaskEngine::new(store);
    assert_eq!(engine.tick(ts("2025-11-08T10:00:00")).unwrap().created, 0);
}

#[test]
fn invalid_config_is_rejected_at_load() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "[patrol]\nsummary_hour = 30\n").expect("write config");

    let err = AlfredConfig::load(Some(&config_path)).unwrap_err();
    assert!(matches!(err, TaskError::Config(_)));
    assert!(err.to_string().contains("summary_hour"));
}
