//! Death-mode enforcement.
//!
//! On a strict weekday the user must complete at least one of that day's
//! tasks before `wake_time + grace`. Missing the deadline resets progression
//! to zero. The enforcer is pure: given `(now, record, ledger)` it returns a
//! [`Verdict`]; the caller decides how often to ask (see
//! [`crate::scheduler`]).
//!
//! Yesterday is checked before today. A deadline can fall past midnight
//! (late wake time, long grace) and a check can be skipped overnight; either
//! way the missed day is still caught on the next check.
//!
//! ## Verdict order (per day)
//!
//! ```text
//! not a strict day ─> before deadline ─> deadline predates that weekday's
//!     strict start ─> already penalized that day ─> compliant ─> VIOLATION
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Calendar;
use crate::ledger::TaskLedger;
use crate::model::{ProgressionRecord, WakeTime};
use crate::progression::Progression;

pub const DEFAULT_GRACE_MINUTES: u32 = 10;

/// Result of evaluating one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    NotStrictDay,
    BeforeDeadline { deadline: DateTime<Utc> },
    /// The weekday became strict after this deadline.
    NotEnforced { deadline: DateTime<Utc> },
    AlreadyPenalized { day: NaiveDate },
    Compliant { deadline: DateTime<Utc> },
    Violation { day: NaiveDate, deadline: DateTime<Utc> },
}

impl Verdict {
    pub fn is_violation(&self) -> bool {
        matches!(self, Verdict::Violation { .. })
    }
}

/// A penalty that was applied to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    pub day: NaiveDate,
    pub deadline: DateTime<Utc>,
    pub experience_lost: u64,
    pub level_before: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathModeEnforcer {
    grace: Duration,
    calendar: Calendar,
}

impl Default for DeathModeEnforcer {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_MINUTES, Calendar::default())
    }
}

impl DeathModeEnforcer {
    pub fn new(grace_minutes: u32, calendar: Calendar) -> Self {
        Self {
            grace: Duration::minutes(i64::from(grace_minutes)),
            calendar,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Instant after which `date` counts as violated.
    pub fn deadline_on(&self, record: &ProgressionRecord, date: NaiveDate) -> DateTime<Utc> {
        self.deadline_at(date, record.wake_time_on(date))
    }

    /// Deadline `date` would have with `wake_time`.
    pub fn deadline_at(&self, date: NaiveDate, wake_time: WakeTime) -> DateTime<Utc> {
        self.calendar.instant_at(date, wake_time.time()) + self.grace
    }

    /// Today's deadline, if today is a strict day.
    pub fn deadline_today(
        &self,
        now: DateTime<Utc>,
        record: &ProgressionRecord,
    ) -> Option<DateTime<Utc>> {
        let today = self.calendar.date_of(now);
        record
            .is_strict_day(today.weekday())
            .then(|| self.deadline_on(record, today))
    }

    /// Verdict at `now`. Yesterday's verdict wins while its deadline is
    /// still ahead or was missed without a penalty.
    pub fn evaluate(
        &self,
        now: DateTime<Utc>,
        record: &ProgressionRecord,
        ledger: &TaskLedger,
    ) -> Verdict {
        let today = self.calendar.date_of(now);
        if let Some(yesterday) = today.pred_opt() {
            let verdict = self.evaluate_day(now, yesterday, record, ledger);
            if verdict.is_violation() || matches!(verdict, Verdict::BeforeDeadline { .. }) {
                return verdict;
            }
        }
        self.evaluate_day(now, today, record, ledger)
    }

    /// Verdict for one calendar `day` as seen at `now`.
    pub fn evaluate_day(
        &self,
        now: DateTime<Utc>,
        day: NaiveDate,
        record: &ProgressionRecord,
        ledger: &TaskLedger,
    ) -> Verdict {
        if !record.is_strict_day(day.weekday()) {
            return Verdict::NotStrictDay;
        }

        let deadline = self.deadline_on(record, day);
        if now <= deadline {
            return Verdict::BeforeDeadline { deadline };
        }
        let enforced = record
            .strict_since(day.weekday())
            .is_some_and(|since| deadline >= since);
        if !enforced {
            return Verdict::NotEnforced { deadline };
        }
        if record.penalty_days().contains(&day) {
            return Verdict::AlreadyPenalized { day };
        }
        if ledger.completed_by(day, deadline) {
            return Verdict::Compliant { deadline };
        }
        Verdict::Violation { day, deadline }
    }

    /// Evaluate and, on violation, apply the penalty transition.
    ///
    /// Returns the applied penalty, or `None` when nothing changed.
    pub fn enforce(
        &self,
        now: DateTime<Utc>,
        record: &mut ProgressionRecord,
        ledger: &TaskLedger,
        calc: &Progression,
    ) -> Option<Penalty> {
        let Verdict::Violation { day, deadline } = self.evaluate(now, record, ledger) else {
            return None;
        };
        let experience_lost = record.experience();
        let change = record.apply_penalty(day, calc);
        Some(Penalty {
            day,
            deadline,
            experience_lost,
            level_before: change.from,
        })
    }
}
