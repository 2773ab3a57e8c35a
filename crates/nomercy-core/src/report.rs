//! Derived reporting over the task ledger.
//!
//! Reports are recomputed from the ledger on every request and never stored,
//! so they cannot drift from it.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock::Calendar;
use crate::ledger::TaskLedger;
use crate::model::{ProgressionRecord, TaskStatus};

/// Headline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub daily_completed: usize,
    pub weekly_completed: usize,
    pub streak_days: u32,
}

/// Per-day breakdown used by history views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayReport {
    pub date: NaiveDate,
    pub completed: usize,
    pub forgiven: usize,
    pub pending: usize,
    pub penalized: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAggregator {
    calendar: Calendar,
}

impl ReportAggregator {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    pub fn compute(&self, ledger: &TaskLedger, record: &ProgressionRecord, today: NaiveDate) -> Report {
        let week_start = self.calendar.start_of_week(today);
        let mut daily_completed = 0;
        let mut weekly_completed = 0;
        for task in ledger.iter().filter(|t| t.is_completed()) {
            if task.calendar_date == today {
                daily_completed += 1;
            }
            if task.calendar_date >= week_start && task.calendar_date <= today {
                weekly_completed += 1;
            }
        }

        Report {
            daily_completed,
            weekly_completed,
            streak_days: self.streak(ledger, record, today),
        }
    }

    /// Consecutive days ending `today` with a completion and no penalty.
    pub fn streak(&self, ledger: &TaskLedger, record: &ProgressionRecord, today: NaiveDate) -> u32 {
        let active: HashSet<NaiveDate> = ledger
            .iter()
            .filter(|t| t.is_completed() && t.calendar_date <= today)
            .map(|t| t.calendar_date)
            .collect();

        let mut streak = 0;
        let mut day = today;
        while active.contains(&day) && !record.penalty_days().contains(&day) {
            streak += 1;
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }
        streak
    }

    /// Breakdown for the `days` days ending `today`, oldest first.
    pub fn history(
        &self,
        ledger: &TaskLedger,
        record: &ProgressionRecord,
        today: NaiveDate,
        days: u32,
    ) -> Vec<DayReport> {
        (0..i64::from(days))
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                let mut day = DayReport {
                    date,
                    completed: 0,
                    forgiven: 0,
                    pending: 0,
                    penalized: record.penalty_days().contains(&date),
                };
                for task in ledger.tasks_on(date) {
                    match task.status {
                        TaskStatus::Completed => day.completed += 1,
                        TaskStatus::Forgiven => day.forgiven += 1,
                        TaskStatus::Pending => day.pending += 1,
                    }
                }
                day
            })
            .collect()
    }
}
