use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{StrictDays, Task, WakeTime};

/// Every state change in the engine produces an Event.
/// The presentation layer renders them; the CLI prints them as JSON with
/// camelCase fields, like every other engine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Event {
    TaskAdded {
        task: Task,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        xp_awarded: u64,
        experience: u64,
        level: u32,
        at: DateTime<Utc>,
    },
    /// Emitted alongside `TaskCompleted` when the award crossed a threshold.
    LevelUp {
        from: u32,
        to: u32,
        forgives_available: u32,
        at: DateTime<Utc>,
    },
    TaskForgiven {
        task_id: String,
        forgives_remaining: u32,
        at: DateTime<Utc>,
    },
    /// `effective_from` is tomorrow when today's deadline had already passed.
    WakeTimeChanged {
        wake_time: WakeTime,
        effective_from: NaiveDate,
        at: DateTime<Utc>,
    },
    /// `added` lists the weekdays enforced from `at` on.
    StrictDaysChanged {
        strict_days: StrictDays,
        added: StrictDays,
        at: DateTime<Utc>,
    },
    /// Death-mode deadline missed; progression reset to zero.
    DeathModePenalty {
        day: NaiveDate,
        deadline: DateTime<Utc>,
        experience_lost: u64,
        level_before: u32,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::TaskAdded { at, .. }
            | Event::TaskCompleted { at, .. }
            | Event::LevelUp { at, .. }
            | Event::TaskForgiven { at, .. }
            | Event::WakeTimeChanged { at, .. }
            | Event::StrictDaysChanged { at, .. }
            | Event::DeathModePenalty { at, .. } => *at,
        }
    }
}
