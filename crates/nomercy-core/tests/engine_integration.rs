//! Integration tests for the engine facade.
//!
//! Drives full sessions through the public API with a manual clock and the
//! in-memory store, covering XP/level derivation, the task lifecycle,
//! forgive budgets, death-mode enforcement and streak reporting.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc, Weekday};
use nomercy_core::{
    Config, Engine, EngineError, Event, Identity, ManualClock, MemoryStore, StrictDays, TaskStatus,
};

// 2026-10-12 is a Monday.
fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, h, m, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
}

fn sign_in(config: &Config, start: DateTime<Utc>) -> (Engine, MemoryStore, Arc<ManualClock>) {
    let store = MemoryStore::new();
    let clock = Arc::new(ManualClock::new(start));
    let engine = Engine::sign_in(
        Identity::new("ada", "Ada"),
        Box::new(store.clone()),
        clock.clone(),
        config,
    )
    .unwrap();
    (engine, store, clock)
}

fn add(engine: &mut Engine, date: Option<NaiveDate>, text: &str) -> String {
    match engine.add_task(date, text).unwrap() {
        Event::TaskAdded { task, .. } => task.id,
        other => panic!("unexpected event {other:?}"),
    }
}

fn complete_new(engine: &mut Engine, date: Option<NaiveDate>) -> Vec<Event> {
    let id = add(engine, date, "habit");
    engine.complete_task(&id).unwrap()
}

fn strict(days: &[Weekday]) -> StrictDays {
    days.iter().copied().collect()
}

#[test]
fn test_level_tracks_experience_after_every_operation() {
    let config = Config::default();
    let (mut engine, _, clock) = sign_in(&config, at(11, 5, 0));
    let calc = config.progression();

    let check = |engine: &Engine| {
        let record = engine.record();
        assert_eq!(record.level(), calc.level_for(record.experience()));
        assert_eq!(u64::from(record.level()), record.experience() / 100 + 1);
    };

    for _ in 0..25 {
        complete_new(&mut engine, None);
        check(&engine);
    }
    let id = add(&mut engine, None, "skip");
    engine.forgive_task(&id).unwrap();
    check(&engine);

    engine.set_strict_days(strict(&[Weekday::Mon]));
    check(&engine);
    clock.set(at(12, 6, 11));
    assert!(engine.tick().is_some());
    check(&engine);
    assert_eq!(engine.record().level(), 1);
}

#[test]
fn test_ten_completions_reach_level_two() {
    let (mut engine, _, _) = sign_in(&Config::default(), at(12, 5, 0));
    let mut level_ups = 0;
    for _ in 0..10 {
        let events = complete_new(&mut engine, None);
        level_ups += events
            .iter()
            .filter(|e| matches!(e, Event::LevelUp { .. }))
            .count();
    }
    assert_eq!(engine.record().experience(), 100);
    assert_eq!(engine.record().level(), 2);
    assert_eq!(level_ups, 1);
}

#[test]
fn test_double_completion_is_rejected_without_side_effects() {
    let (mut engine, store, _) = sign_in(&Config::default(), at(12, 5, 0));
    let id = add(&mut engine, None, "Make bed");
    engine.complete_task(&id).unwrap();
    let writes = store.write_count();

    let err = engine.complete_task(&id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert_eq!(engine.record().experience(), 10);
    assert_eq!(store.write_count(), writes);

    let err = engine.forgive_task(&id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert_eq!(engine.record().forgives_consumed(), 0);
}

#[test]
fn test_level_up_opens_fresh_forgive_budget() {
    let mut config = Config::default();
    config.set("forgive.budget_table", "[6, 5]").unwrap();
    let (mut engine, _, _) = sign_in(&config, at(13, 5, 0));

    for _ in 0..6 {
        let id = add(&mut engine, None, "skip");
        engine.forgive_task(&id).unwrap();
    }
    let blocked = add(&mut engine, None, "blocked");
    assert!(matches!(
        engine.forgive_task(&blocked).unwrap_err(),
        EngineError::BudgetExhausted { level: 1, budget: 6 }
    ));

    for _ in 0..10 {
        complete_new(&mut engine, None);
    }
    assert_eq!(engine.record().level(), 2);
    assert_eq!(engine.forgives_remaining(), 5);
    engine.forgive_task(&blocked).unwrap();
    assert_eq!(engine.ledger().get(&blocked).unwrap().status, TaskStatus::Forgiven);
    assert_eq!(engine.forgives_remaining(), 4);
}

#[test]
fn test_budget_past_table_end_is_zero() {
    let mut config = Config::default();
    config.set("forgive.budget_table", "[1]").unwrap();
    let (mut engine, _, _) = sign_in(&config, at(13, 5, 0));
    for _ in 0..10 {
        complete_new(&mut engine, None);
    }
    let id = add(&mut engine, None, "skip");
    assert!(matches!(
        engine.forgive_task(&id).unwrap_err(),
        EngineError::BudgetExhausted { level: 2, budget: 0 }
    ));
}

#[test]
fn test_penalty_fires_once_across_ten_ticks() {
    let (mut engine, store, clock) = sign_in(&Config::default(), at(11, 5, 0));
    for _ in 0..5 {
        complete_new(&mut engine, None);
    }
    engine.set_strict_days(strict(&[Weekday::Mon]));
    clock.set(at(12, 6, 11));

    let penalties = (0..10)
        .filter_map(|_| {
            let event = engine.tick();
            clock.advance(Duration::minutes(1));
            event
        })
        .count();
    assert_eq!(penalties, 1);
    assert_eq!(engine.record().penalty_days().len(), 1);

    // Experience earned after the penalty survives later ticks that day.
    complete_new(&mut engine, None);
    for _ in 0..10 {
        assert!(engine.tick().is_none());
    }
    assert_eq!(engine.record().experience(), 10);
    assert_eq!(store.record("ada").unwrap().experience(), 10);
}

#[test]
fn test_missed_monday_deadline_resets_progression() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(11, 9, 0));
    for _ in 0..23 {
        complete_new(&mut engine, None);
    }
    assert_eq!(engine.record().level(), 3);
    engine.set_strict_days(strict(&[Weekday::Mon]));
    engine.set_wake_time("06:00").unwrap();

    clock.set(at(12, 6, 10));
    assert!(engine.tick().is_none(), "deadline is inclusive");

    clock.set(at(12, 6, 11));
    match engine.tick() {
        Some(Event::DeathModePenalty {
            day,
            experience_lost,
            level_before,
            ..
        }) => {
            assert_eq!(day, date(12));
            assert_eq!(experience_lost, 230);
            assert_eq!(level_before, 3);
        }
        other => panic!("expected penalty, got {other:?}"),
    }
    assert_eq!(engine.record().experience(), 0);
    assert_eq!(engine.record().level(), 1);
}

#[test]
fn test_completion_before_deadline_is_compliant() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(11, 9, 0));
    engine.set_strict_days(strict(&[Weekday::Mon]));
    clock.set(at(12, 6, 5));
    complete_new(&mut engine, None);

    clock.set(at(12, 23, 0));
    assert!(engine.tick().is_none());
    assert_eq!(engine.record().experience(), 10);
}

#[test]
fn test_strict_mode_is_not_retroactive() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(12, 9, 0));
    complete_new(&mut engine, Some(date(11)));
    engine.set_strict_days(strict(&[Weekday::Mon]));
    assert!(engine.tick().is_none());

    clock.set(at(19, 6, 11));
    assert!(engine.tick().is_some());
}

#[test]
fn test_adding_strict_day_after_missed_deadline_still_penalizes() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(8, 9, 0));
    for _ in 0..5 {
        complete_new(&mut engine, None);
    }
    engine.set_strict_days(strict(&[Weekday::Mon]));

    // Monday 06:10 passes with nothing done and no tick in between.
    clock.set(at(12, 9, 0));
    let events = engine.set_strict_days(strict(&[Weekday::Mon, Weekday::Fri]));
    assert!(matches!(
        events.as_slice(),
        [
            Event::DeathModePenalty { experience_lost: 50, .. },
            Event::StrictDaysChanged { .. }
        ]
    ));
    assert_eq!(engine.record().experience(), 0);
    assert!(engine.record().penalty_days().contains(&date(12)));
    assert!(engine.tick().is_none());

    // Friday only starts counting from the moment it was added.
    assert_eq!(engine.record().strict_since(Weekday::Mon), Some(at(8, 9, 0)));
    assert_eq!(engine.record().strict_since(Weekday::Fri), Some(at(12, 9, 0)));
}

#[test]
fn test_removing_strict_day_after_missed_deadline_still_penalizes() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(8, 9, 0));
    complete_new(&mut engine, None);
    engine.set_strict_days(strict(&[Weekday::Mon]));

    clock.set(at(12, 9, 0));
    let events = engine.set_strict_days(StrictDays::none());
    assert!(matches!(events.first(), Some(Event::DeathModePenalty { .. })));
    assert_eq!(engine.record().experience(), 0);
}

#[test]
fn test_wake_time_change_after_deadline_applies_tomorrow() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(8, 9, 0));
    for _ in 0..3 {
        complete_new(&mut engine, None);
    }
    engine.set_strict_days(strict(&[Weekday::Mon]));

    clock.set(at(12, 9, 0));
    let events = engine.set_wake_time("11:00").unwrap();
    assert!(matches!(events.first(), Some(Event::DeathModePenalty { .. })));
    match events.last() {
        Some(Event::WakeTimeChanged { effective_from, .. }) => assert_eq!(*effective_from, date(13)),
        other => panic!("expected WakeTimeChanged, got {other:?}"),
    }
    assert_eq!(engine.record().experience(), 0);
    assert_eq!(engine.snapshot().deadline_today, Some(at(12, 6, 10)));
    assert_eq!(engine.snapshot().wake_time_from, Some(date(13)));

    // The following Monday uses the new time.
    clock.set(at(19, 10, 0));
    complete_new(&mut engine, None);
    clock.set(at(19, 11, 11));
    assert!(engine.tick().is_none());
    assert_eq!(engine.record().penalty_days().len(), 1);
}

#[test]
fn test_wake_time_change_after_compliance_does_not_penalize() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(8, 9, 0));
    engine.set_strict_days(strict(&[Weekday::Mon]));
    clock.set(at(12, 6, 5));
    complete_new(&mut engine, None);

    // Moving the wake time earlier must not turn today's 06:05 completion late.
    clock.set(at(12, 9, 0));
    let events = engine.set_wake_time("05:00").unwrap();
    assert_eq!(events.len(), 1);
    assert!(engine.tick().is_none());
    assert_eq!(engine.record().experience(), 10);
}

#[test]
fn test_wake_time_near_midnight_still_enforced() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(11, 9, 0));
    complete_new(&mut engine, None);
    engine.set_strict_days(strict(&[Weekday::Mon]));
    engine.set_wake_time("23:55").unwrap();

    clock.set(at(12, 0, 0));
    let mut penalties = Vec::new();
    while engine.now() < at(14, 0, 0) {
        penalties.extend(engine.tick());
        clock.advance(Duration::minutes(1));
    }
    assert_eq!(penalties.len(), 1);
    match &penalties[0] {
        Event::DeathModePenalty { day, deadline, at: fired, .. } => {
            assert_eq!(*day, date(12));
            assert_eq!(*deadline, at(13, 0, 5));
            assert_eq!(*fired, at(13, 0, 6));
        }
        other => panic!("expected penalty, got {other:?}"),
    }
}

#[test]
fn test_deadline_missed_while_offline_is_caught_next_day() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(11, 9, 0));
    complete_new(&mut engine, None);
    engine.set_strict_days(strict(&[Weekday::Mon]));

    // No tick at all on Monday.
    clock.set(at(13, 8, 0));
    match engine.tick() {
        Some(Event::DeathModePenalty { day, .. }) => assert_eq!(day, date(12)),
        other => panic!("expected penalty, got {other:?}"),
    }
}

#[test]
fn test_forgive_refused_on_strict_day() {
    let (mut engine, _, _) = sign_in(&Config::default(), at(12, 5, 0));
    engine.set_strict_days(strict(&[Weekday::Tue]));
    let tuesday = add(&mut engine, Some(date(13)), "gym");
    let monday = add(&mut engine, Some(date(12)), "read");

    assert!(matches!(
        engine.forgive_task(&tuesday).unwrap_err(),
        EngineError::StrictModeViolation { weekday: Weekday::Tue, .. }
    ));
    engine.forgive_task(&monday).unwrap();
}

#[test]
fn test_streak_counts_five_days_without_penalty() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(12, 5, 0));
    for day in 12..=16 {
        clock.set(at(day, 5, 0));
        complete_new(&mut engine, None);
    }
    let report = engine.report();
    assert_eq!(report.streak_days, 5);
    assert_eq!(report.daily_completed, 1);
    assert_eq!(report.weekly_completed, 5);
}

#[test]
fn test_penalty_truncates_streak() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(12, 5, 0));
    engine.set_strict_days(strict(&[Weekday::Wed]));
    for day in 12..=16 {
        // Wednesday's task is completed too late to satisfy death mode.
        let hour = if day == 14 { 7 } else { 5 };
        clock.set(at(day, hour, 0));
        complete_new(&mut engine, None);
        engine.tick();
    }
    assert_eq!(engine.record().penalty_days().len(), 1);
    assert!(engine.record().penalty_days().contains(&date(14)));
    assert_eq!(engine.report().streak_days, 2);

    let history = engine.history(5);
    assert_eq!(history.len(), 5);
    assert!(history[2].penalized);
    assert_eq!(history.iter().map(|d| d.completed).sum::<usize>(), 5);
}

#[test]
fn test_snapshot_and_achievements() {
    let (mut engine, _, clock) = sign_in(&Config::default(), at(11, 9, 0));
    engine.set_strict_days(strict(&[Weekday::Mon]));
    clock.set(at(12, 5, 30));
    complete_new(&mut engine, None);

    let snap = engine.snapshot();
    assert_eq!(snap.today, date(12));
    assert!(snap.strict_today);
    assert_eq!(snap.forgives_remaining, 6);
    let unlocked: Vec<&str> = snap
        .achievements
        .iter()
        .filter(|a| a.unlocked)
        .map(|a| a.title.as_str())
        .collect();
    assert_eq!(unlocked, vec!["First Step", "Early Bird", "Death Survived"]);

    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["wakeTime"], "06:00");
    assert_eq!(json["strictDays"], serde_json::json!(["Mon"]));
}
