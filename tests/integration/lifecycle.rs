//! End-to-end todo lifecycle through the public engine and query API.

use std::collections::HashSet;

use alfred::{Store, TaskEngine, TaskError, TaskQuery, TodoStatus, Transition};
use chrono::{NaiveDate, TimeDelta};
use std::sync::Arc;

use crate::helpers::{add_template, test_env, ts};

#[test]
fn minute_template_walkthrough() {
    let env = test_env();
    add_template(&env, "U1", "* * * * *", "5m");

    assert_eq!(env.engine.create_due_instances(ts("2025-11-08T10:00:05")).unwrap(), 1);
    assert_eq!(env.engine.create_due_instances(ts("2025-11-08T10:00:05")).unwrap(), 0);
    assert_eq!(env.engine.create_due_instances(ts("2025-11-08T10:00:50")).unwrap(), 0);
    assert_eq!(env.engine.create_due_instances(ts("2025-11-08T10:01:05")).unwrap(), 1);

    let todos = env.query.todos_for_date(NaiveDate::from_ymd_opt(2025, 11, 8)).unwrap();
    let times: Vec<_> = todos
        .iter()
        .map(|t| (t.todo.remind_at, t.todo.deadline, t.todo.status))
        .collect();
    assert_eq!(
        times,
        vec![
            (ts("2025-11-08T10:00:00"), ts("2025-11-08T10:05:00"), TodoStatus::Pending),
            (ts("2025-11-08T10:01:00"), ts("2025-11-08T10:06:00"), TodoStatus::Pending),
        ]
    );
}

#[test]
fn a_day_of_ticks_keeps_invariants() {
    let env = test_env();
    add_template(&env, "U1", "*/7 * * * *", "10m");
    add_template(&env, "U1", "0 * * * *", "0s");
    add_template(&env, "U2", "30 9 * * *", "1d");

    let mut now = ts("2025-11-08T00:00:30");
    let end = ts("2025-11-09T00:00:00");
    while now < end {
        env.engine.tick(now).unwrap();
        // Repeat with a slightly earlier clock; nothing new may appear.
        let report = env.engine.tick(now - TimeDelta::seconds(1)).unwrap();
        assert_eq!(report.created, 0);
        now += TimeDelta::seconds(97);
    }

    let todos = env.query.todos_for_date(None).unwrap();
    assert!(!todos.is_empty());

    let mut seen = HashSet::new();
    for view in &todos {
        let t = &view.todo;
        assert!(
            seen.insert((t.user_id.clone(), t.template_id, t.remind_at)),
            "duplicate occurrence {t:?}"
        );
        assert!(t.deadline >= t.remind_at);
        if t.deadline < ts("2025-11-08T23:58:00") {
            assert_eq!(t.status, TodoStatus::Escalated, "{t:?} should be escalated");
        }
        let log = env.query.get_status_log(t.id).unwrap();
        assert_eq!(log[0].old_status, None);
        assert_eq!(log[0].new_status, TodoStatus::Pending);
    }

    // Hourly template: 24 occurrences over the day.
    let hourly = todos.iter().filter(|v| v.todo.template_id == 2).count();
    assert_eq!(hourly, 24);
}

#[test]
fn user_actions_and_admin_revocation() {
    let env = test_env();
    let template = add_template(&env, "U1", "0 9 * * *", "2h");
    for now in ["2025-11-06T09:00:30", "2025-11-07T09:00:30", "2025-11-08T09:00:30"] {
        env.engine.create_due_instances(ts(now)).unwrap();
    }
    // The first two are past their deadline by now.
    assert_eq!(env.engine.escalate_overdue(ts("2025-11-08T09:01:00")).unwrap(), 2);

    let done = env.engine.complete_todo(1, ts("2025-11-08T09:02:00")).unwrap();
    assert_eq!(
        done,
        Transition::Changed {
            from: TodoStatus::Escalated,
            to: TodoStatus::Completed
        }
    );

    let err = env.engine.revert_completion(2, ts("2025-11-08T09:03:00")).unwrap_err();
    assert!(matches!(err, TaskError::InvalidState { todo_id: 2, .. }));
    assert_eq!(err.to_string(), "todo 2 is escalated, cannot revert");

    let revoked = env
        .engine
        .set_template_active(template, false, ts("2025-11-08T09:04:00"))
        .unwrap();
    assert_eq!(revoked, 2);

    let statuses: Vec<_> = env
        .query
        .todos_for_date(None)
        .unwrap()
        .into_iter()
        .map(|v| v.todo.status)
        .collect();
    assert_eq!(
        statuses,
        vec![TodoStatus::Completed, TodoStatus::Revoked, TodoStatus::Revoked]
    );

    // A completed todo can still be reverted after the template is gone,
    // but a revoked one cannot be completed.
    env.engine.revert_completion(1, ts("2025-11-08T09:05:00")).unwrap();
    assert_eq!(env.query.get_todo(1).unwrap().todo.status, TodoStatus::Pending);
    assert_eq!(
        env.engine.complete_todo(3, ts("2025-11-08T09:06:00")).unwrap(),
        Transition::Unchanged {
            status: TodoStatus::Revoked
        }
    );

    let template = &env.query.get_templates().unwrap()[0];
    assert!(!template.is_active);
}

#[test]
fn data_survives_reopen() {
    let env = test_env();
    add_template(&env, "U1", "* * * * *", "5m");
    env.engine.tick(ts("2025-11-08T10:00:05")).unwrap();
    env.engine.complete_todo(1, ts("2025-11-08T10:00:10")).unwrap();

    let path = env.dir.path().join("alfred.db");
    let store = Arc::new(Store::open_at(&path).unwrap());
    let engine = TaskEngine::new(Arc::clone(&store));
    let query = TaskQuery::new(store);

    assert_eq!(query.get_todo(1).unwrap().todo.status, TodoStatus::Completed);
    assert_eq!(query.get_status_log(1).unwrap().len(), 2);
    // Same occurrence from a fresh engine: still no duplicate.
    assert_eq!(engine.tick(ts("2025-11-08T10:00:30")).unwrap().created, 0);
}

#[test]
fn dump_reflects_every_table() {
    let env = test_env();
    add_template(&env, "U1", "* * * * *", "5m");
    env.engine.tick(ts("2025-11-08T10:00:05")).unwrap();

    let dump = env.store.dump().unwrap();
    assert_eq!(dump["todo_templates"].as_array().unwrap().len(), 1);
    assert_eq!(dump["todos"].as_array().unwrap().len(), 1);
    assert_eq!(dump["todo_status_logs"].as_array().unwrap().len(), 1);
    assert_eq!(dump["todos"][0]["status"], "pending");
    assert_eq!(dump["todos"][0]["remind_at"], "2025-11-08 10:00:00");
}
