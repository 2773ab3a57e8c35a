//! Achievement badges derived from the ledger and progression record.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock::Calendar;
use crate::enforcer::DeathModeEnforcer;
use crate::ledger::TaskLedger;
use crate::model::{ProgressionRecord, Task};

pub const STREAK_MASTER_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    /// Completed a first task.
    FirstStep,
    /// Completed a task before the wake deadline on a strict day.
    EarlyBird,
    /// Seven consecutive days without a miss.
    StreakMaster,
    /// Completed every task of a strict day.
    DeathSurvived,
}

impl Achievement {
    pub const ALL: [Achievement; 4] = [
        Achievement::FirstStep,
        Achievement::EarlyBird,
        Achievement::StreakMaster,
        Achievement::DeathSurvived,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstStep => "First Step",
            Achievement::EarlyBird => "Early Bird",
            Achievement::StreakMaster => "Streak Master",
            Achievement::DeathSurvived => "Death Survived",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::FirstStep => "Completed your first task",
            Achievement::EarlyBird => "Completed a task before the wake-up deadline",
            Achievement::StreakMaster => "7 days without missing",
            Achievement::DeathSurvived => "Completed all tasks on a Death Mode day",
        }
    }
}

/// Badge plus whether it has been earned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    pub achievement: Achievement,
    pub title: String,
    pub description: String,
    pub unlocked: bool,
}

/// Evaluate all badges. `streak_days` comes from the report aggregator.
pub fn evaluate(
    ledger: &TaskLedger,
    record: &ProgressionRecord,
    enforcer: &DeathModeEnforcer,
    calendar: &Calendar,
    streak_days: u32,
) -> Vec<AchievementStatus> {
    Achievement::ALL
        .into_iter()
        .map(|achievement| {
            let unlocked = match achievement {
                Achievement::FirstStep => ledger.iter().any(Task::is_completed),
                Achievement::EarlyBird => early_bird(ledger, record, enforcer),
                Achievement::StreakMaster => streak_days >= STREAK_MASTER_DAYS,
                Achievement::DeathSurvived => death_survived(ledger, record, calendar),
            };
            AchievementStatus {
                achievement,
                title: achievement.title().to_string(),
                description: achievement.description().to_string(),
                unlocked,
            }
        })
        .collect()
}

fn early_bird(ledger: &TaskLedger, record: &ProgressionRecord, enforcer: &DeathModeEnforcer) -> bool {
    ledger.iter().any(|task| {
        record.is_strict_day(task.calendar_date.weekday())
            && task.completed_by(enforcer.deadline_on(record, task.calendar_date))
    })
}

fn death_survived(ledger: &TaskLedger, record: &ProgressionRecord, calendar: &Calendar) -> bool {
    let mut days: BTreeMap<NaiveDate, bool> = BTreeMap::new();
    for task in ledger.iter() {
        let day = task.calendar_date;
        let enforced = record
            .strict_since(day.weekday())
            .is_some_and(|since| calendar.date_of(since) <= day);
        if !enforced {
            continue;
        }
        let all_done = days.entry(day).or_insert(true);
        *all_done &= task.is_completed();
    }
    days.values().any(|all_done| *all_done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StrictDays, TaskStatus};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn monday_at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 12, h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
    }

    fn unlocked(statuses: &[AchievementStatus]) -> Vec<Achievement> {
        statuses.iter().filter(|s| s.unlocked).map(|s| s.achievement).collect()
    }

    #[test]
    fn nothing_unlocked_for_new_user() {
        let record = ProgressionRecord::new("u1", "Ada");
        let statuses = evaluate(
            &TaskLedger::new(),
            &record,
            &DeathModeEnforcer::default(),
            &Calendar::default(),
            0,
        );
        assert_eq!(statuses.len(), 4);
        assert!(unlocked(&statuses).is_empty());
    }

    #[test]
    fn strict_day_completions_unlock_badges() {
        let mut record = ProgressionRecord::new("u1", "Ada");
        record.set_strict_days(StrictDays::parse_list("mon").unwrap(), monday_at(0, 0) - Duration::days(1));
        let mut ledger = TaskLedger::new();
        let id = ledger.add("u1", monday(), "Wake up", monday_at(5, 0)).unwrap().id.clone();
        ledger.resolve(&id, TaskStatus::Completed, monday_at(6, 0)).unwrap();

        let statuses = evaluate(
            &ledger,
            &record,
            &DeathModeEnforcer::default(),
            &Calendar::default(),
            STREAK_MASTER_DAYS,
        );
        assert_eq!(
            unlocked(&statuses),
            vec![
                Achievement::FirstStep,
                Achievement::EarlyBird,
                Achievement::StreakMaster,
                Achievement::DeathSurvived
            ]
        );
    }

    #[test]
    fn pending_task_blocks_death_survived() {
        let mut record = ProgressionRecord::new("u1", "Ada");
        record.set_strict_days(StrictDays::parse_list("mon").unwrap(), monday_at(0, 0) - Duration::days(1));
        let mut ledger = TaskLedger::new();
        let id = ledger.add("u1", monday(), "Wake up", monday_at(5, 0)).unwrap().id.clone();
        ledger.resolve(&id, TaskStatus::Completed, monday_at(7, 0)).unwrap();
        ledger.add("u1", monday(), "Read", monday_at(5, 0)).unwrap();

        let statuses = evaluate(
            &ledger,
            &record,
            &DeathModeEnforcer::default(),
            &Calendar::default(),
            1,
        );
        assert_eq!(unlocked(&statuses), vec![Achievement::FirstStep]);
    }
}
