//! Integration tests for engine persistence.
//!
//! Covers reload from an on-disk SQLite store, level re-derivation on load,
//! the leaderboard query, and best-effort writes against a failing store.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc, Weekday};
use nomercy_core::{
    Config, DocumentStore, Engine, Event, Identity, ManualClock, MemoryStore, SqliteStore,
    TaskStatus,
};

fn monday_at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 12, h, m, 0).unwrap()
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(monday_at(5, 0)))
}

fn open(path: &std::path::Path, user: &str, clock: Arc<ManualClock>) -> Engine {
    let store = SqliteStore::open_at(path).unwrap();
    Engine::sign_in(Identity::new(user, user.to_uppercase()), Box::new(store), clock, &Config::default())
        .unwrap()
}

fn add(engine: &mut Engine, text: &str) -> String {
    match engine.add_task(None, text).unwrap() {
        Event::TaskAdded { task, .. } => task.id,
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nomercy.db");

    let (done, skipped, open_task) = {
        let mut engine = open(&path, "ada", clock());
        let done = add(&mut engine, "Run");
        engine.complete_task(&done).unwrap();
        let skipped = add(&mut engine, "Read");
        engine.forgive_task(&skipped).unwrap();
        let open_task = add(&mut engine, "Write");
        engine.set_wake_time("05:45").unwrap();
        engine.set_strict_days([Weekday::Sat, Weekday::Sun].into_iter().collect());
        assert!(engine.take_persistence_failures().is_empty());
        (done, skipped, open_task)
    };

    let engine = open(&path, "ada", clock());
    let record = engine.record();
    assert_eq!(record.experience(), 10);
    assert_eq!(record.forgives_consumed(), 1);
    assert_eq!(record.wake_time().to_string(), "05:45");
    assert_eq!(record.strict_days().to_string(), "Sat,Sun");
    assert!(record.strict_since(Weekday::Sat).is_some());
    assert!(record.strict_since(Weekday::Mon).is_none());

    let ledger = engine.ledger();
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.get(&done).unwrap().status, TaskStatus::Completed);
    assert_eq!(ledger.get(&skipped).unwrap().status, TaskStatus::Forgiven);
    assert_eq!(ledger.get(&open_task).unwrap().status, TaskStatus::Pending);
    assert!(ledger.get(&open_task).unwrap().resolved_at.is_none());
}

#[test]
fn test_stored_level_is_rederived_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nomercy.db");
    {
        let mut engine = open(&path, "ada", clock());
        for _ in 0..12 {
            let id = add(&mut engine, "task");
            engine.complete_task(&id).unwrap();
        }
    }

    let store = SqliteStore::open_at(&path).unwrap();
    store
        .conn()
        .execute(
            "UPDATE users SET document = json_set(document, '$.level', 9), level = 9 WHERE user_id = 'ada'",
            [],
        )
        .unwrap();
    assert_eq!(store.load("ada").unwrap().unwrap().level(), 9);
    drop(store);

    let engine = open(&path, "ada", clock());
    assert_eq!(engine.record().experience(), 120);
    assert_eq!(engine.record().level(), 2);
}

#[test]
fn test_leaderboard_across_users() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nomercy.db");
    for (user, completions) in [("ada", 3), ("bob", 15), ("cy", 7)] {
        let mut engine = open(&path, user, clock());
        for _ in 0..completions {
            let id = add(&mut engine, "task");
            engine.complete_task(&id).unwrap();
        }
    }

    let engine = open(&path, "ada", clock());
    let board = engine.leaderboard(10).unwrap();
    let rows: Vec<(usize, &str, u64, u32)> = board
        .iter()
        .map(|e| (e.rank, e.user_id.as_str(), e.experience, e.level))
        .collect();
    assert_eq!(rows, vec![(1, "bob", 150, 2), (2, "cy", 70, 1), (3, "ada", 30, 1)]);
    assert_eq!(board[0].display_name, "BOB");
}

#[test]
fn test_failed_writes_do_not_roll_back() {
    let store = MemoryStore::new();
    let mut engine = Engine::sign_in(
        Identity::new("ada", "Ada"),
        Box::new(store.clone()),
        clock(),
        &Config::default(),
    )
    .unwrap();

    store.set_fail_writes(true);
    let id = add(&mut engine, "Offline run");
    let events = engine.complete_task(&id).unwrap();
    assert!(matches!(events[0], Event::TaskCompleted { xp_awarded: 10, .. }));
    assert_eq!(engine.record().experience(), 10);
    assert_eq!(store.record("ada").unwrap().experience(), 0);
    assert!(store.task(&id).is_none());

    let failures = engine.take_persistence_failures();
    let operations: Vec<&str> = failures.iter().map(|f| f.operation.as_str()).collect();
    assert_eq!(operations, vec!["add_task", "complete_task", "complete_task"]);

    store.set_fail_writes(false);
    let other = add(&mut engine, "Back online");
    assert!(!engine.has_unsynced_writes());
    assert_eq!(store.task(&id).unwrap().status, TaskStatus::Completed);
    assert!(store.task(&other).is_some());
    assert_eq!(store.record("ada").unwrap().experience(), 10);
}
