//! Concurrent callers against one shared store.

use std::sync::{Arc, Barrier};
use std::thread;

use alfred::{TodoStatus, Transition};

use crate::helpers::{add_template, test_env, ts};

#[test]
fn racing_ticks_create_each_occurrence_once() {
    let env = test_env();
    for user in ["U1", "U2", "U3"] {
        add_template(&env, user, "* * * * *", "5m");
    }

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&env.engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.tick(ts("2025-11-08T10:00:05")).expect("tick").created
            })
        })
        .collect();

    let created: usize = handles.into_iter().map(|h| h.join().expect("join")).sum();
    assert_eq!(created, 3);
    assert_eq!(env.query.todos_for_date(None).unwrap().len(), 3);
}

#[test]
fn double_click_completes_once() {
    let env = test_env();
    add_template(&env, "U1", "* * * * *", "5m");
    env.engine.tick(ts("2025-11-08T10:00:05")).unwrap();

    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = Arc::clone(&env.engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine
                    .complete_todo(1, ts(&format!("2025-11-08T10:01:0{i}")))
                    .expect("complete")
            })
        })
        .collect();

    let results: Vec<Transition> = handles.into_iter().map(|h| h.join().expect("join")).collect();
    let changed = results
        .iter()
        .filter(|t| matches!(t, Transition::Changed { .. }))
        .count();
    assert_eq!(changed, 1);
    assert!(results.iter().all(|t| matches!(
        t,
        Transition::Changed { .. }
            | Transition::Unchanged {
                status: TodoStatus::Completed
            }
    )));
    assert_eq!(env.query.get_status_log(1).unwrap().len(), 2);
}

#[test]
fn completion_racing_deactivation_stays_consistent() {
    let env = test_env();
    let template = add_template(&env, "U1", "* * * * *", "1h");
    for minute in 0..10 {
        env.engine
            .create_due_instances(ts(&format!("2025-11-08T10:{minute:02}:30")))
            .unwrap();
    }

    let completer = {
        let engine = Arc::clone(&env.engine);
        thread::spawn(move || {
            for id in 1..=10 {
                engine
                    .complete_todo(id, ts("2025-11-08T10:20:00"))
                    .expect("complete");
            }
        })
    };
    let admin = {
        let engine = Arc::clone(&env.engine);
        thread::spawn(move || {
            engine
                .set_template_active(template, false, ts("2025-11-08T10:20:00"))
                .expect("deactivate")
        })
    };
    completer.join().expect("join completer");
    let revoked = admin.join().expect("join admin");

    let todos = env.query.todos_for_date(None).unwrap();
    let revoked_now = todos
        .iter()
        .filter(|v| v.todo.status == TodoStatus::Revoked)
        .count();
    assert_eq!(revoked, revoked_now);
    for view in &todos {
        let status = view.todo.status;
        assert!(status == TodoStatus::Completed || status == TodoStatus::Revoked);
        let log = env.query.get_status_log(view.todo.id).unwrap();
        // Birth plus exactly one terminal transition.
        assert_eq!(log.len(), 2, "todo {} log {log:?}", view.todo.id);
        assert_eq!(log[1].new_status, status);
    }
}

#[test]
fn readers_never_see_a_todo_without_its_birth_log() {
    let env = test_env();
    add_template(&env, "U1", "* * * * *", "1m");
    add_template(&env, "U2", "*/2 * * * *", "0s");

    let writer = {
        let engine = Arc::clone(&env.engine);
        thread::spawn(move || {
            for minute in 0..60 {
                engine
                    .tick(ts(&format!("2025-11-08T11:{minute:02}:10")))
                    .expect("tick");
            }
        })
    };

    let reader = {
        let query = env.query.clone();
        thread::spawn(move || {
            let mut checks = 0usize;
            loop {
                let todos = query.todos_for_date(None).expect("todos");
                for view in &todos {
                    let log = query.get_status_log(view.todo.id).expect("log");
                    assert!(!log.is_empty(), "todo {} visible without log", view.todo.id);
                    checks += 1;
                }
                if todos.len() >= 90 {
                    return checks;
                }
                thread::yield_now();
            }
        })
    };

    writer.join().expect("join writer");
    let checks = reader.join().expect("join reader");
    assert!(checks >= 90);
}
