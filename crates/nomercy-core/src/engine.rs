//! Engine facade: one signed-in user's session.
//!
//! The engine owns the user's [`ProgressionRecord`] and [`TaskLedger`] and is
//! the only way to change them. Every mutating operation finishes its
//! in-memory transition first and only then writes to the document store.
//! Store failures never roll back or reject the operation; they are logged,
//! queued for [`Engine::take_persistence_failures`], and retried on the next
//! write.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = Engine::sign_in(identity, Box::new(store), clock, &config)?;
//! let event = engine.add_task(None, "Stretch")?;
//! // Periodically:
//! engine.tick(); // Returns Some(Event) when a death-mode penalty fires
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::achievements::{self, AchievementStatus};
use crate::clock::{Calendar, Clock};
use crate::config::Config;
use crate::enforcer::{DeathModeEnforcer, Verdict};
use crate::error::{EngineError, Result, StoreError};
use crate::events::Event;
use crate::forgive::ForgiveBudget;
use crate::leaderboard::{self, LeaderboardEntry};
use crate::ledger::TaskLedger;
use crate::model::{ProgressionRecord, StrictDays, Task, TaskStatus, WakeTime};
use crate::progression::Progression;
use crate::report::{DayReport, Report, ReportAggregator};
use crate::store::DocumentStore;

/// Who is signing in, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A store write that failed after its transition had already happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceFailure {
    /// Engine operation that issued the write.
    pub operation: String,
    /// `record:<user_id>` or `task:<task_id>`.
    pub target: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Everything the presentation layer shows on its main screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub user_id: String,
    pub display_name: String,
    pub today: NaiveDate,
    pub experience: u64,
    pub level: u32,
    pub xp_into_level: u64,
    pub xp_per_level: u64,
    pub xp_to_next_level: u64,
    /// 0.0 .. 1.0 progress within the current level.
    pub level_progress: f64,
    pub forgives_remaining: u32,
    pub forgive_budget: u32,
    /// Latest wake-time setting.
    pub wake_time: WakeTime,
    /// Set when the latest wake time only applies from a later date.
    pub wake_time_from: Option<NaiveDate>,
    pub strict_days: StrictDays,
    pub strict_today: bool,
    pub deadline_today: Option<DateTime<Utc>>,
    pub verdict: Verdict,
    pub tasks_today: Vec<Task>,
    pub report: Report,
    pub achievements: Vec<AchievementStatus>,
}

enum Write<'a> {
    NewTask(&'a str),
    Task(&'a str),
    Record,
}

pub struct Engine {
    record: ProgressionRecord,
    ledger: TaskLedger,
    store: Box<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    progression: Progression,
    budget: ForgiveBudget,
    enforcer: DeathModeEnforcer,
    reports: ReportAggregator,
    calendar: Calendar,
    /// Tasks whose latest state has not reached the store.
    unsynced_tasks: BTreeSet<String>,
    unsynced_record: bool,
    failures: Vec<PersistenceFailure>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("record", &self.record)
            .field("tasks", &self.ledger.len())
            .field("unsynced_tasks", &self.unsynced_tasks)
            .field("unsynced_record", &self.unsynced_record)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Load or create the user's record and ledger.
    ///
    /// A stored level is never trusted; it is re-derived from experience.
    ///
    /// # Errors
    /// `Store` if the record or tasks cannot be read. A failed write of a
    /// freshly created record is queued like any other persistence failure.
    pub fn sign_in(
        identity: Identity,
        store: Box<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Result<Self> {
        let progression = config.progression();
        let (record, needs_save) = match store.load(&identity.user_id)? {
            Some(mut record) => {
                let stored_level = record.level();
                record.resync_level(&progression);
                if record.level() != stored_level {
                    warn!(
                        user_id = %identity.user_id,
                        stored_level,
                        derived_level = record.level(),
                        "stored level disagreed with experience; re-derived"
                    );
                }
                let renamed = !identity.display_name.is_empty()
                    && record.display_name != identity.display_name;
                if renamed {
                    record.display_name = identity.display_name.clone();
                }
                let dirty = renamed || record.level() != stored_level;
                (record, dirty)
            }
            None => {
                info!(user_id = %identity.user_id, "creating progression record");
                (
                    ProgressionRecord::new(identity.user_id.clone(), identity.display_name.clone()),
                    true,
                )
            }
        };
        let ledger = TaskLedger::from_tasks(store.load_tasks(&identity.user_id)?);
        debug!(
            user_id = %identity.user_id,
            experience = record.experience(),
            level = record.level(),
            tasks = ledger.len(),
            "signed in"
        );

        let mut engine = Self {
            record,
            ledger,
            store,
            clock,
            progression,
            budget: config.forgive_budget(),
            enforcer: config.enforcer(),
            reports: config.reports(),
            calendar: config.calendar(),
            unsynced_tasks: BTreeSet::new(),
            unsynced_record: false,
            failures: Vec::new(),
        };
        if needs_save {
            engine.persist("sign_in", &[Write::Record]);
        }
        Ok(engine)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn record(&self) -> &ProgressionRecord {
        &self.record
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today's date in the user's calendar.
    pub fn today(&self) -> NaiveDate {
        self.calendar.date_of(self.clock.now())
    }

    pub fn tasks_on(&self, date: NaiveDate) -> Vec<Task> {
        self.ledger.tasks_on(date).into_iter().cloned().collect()
    }

    pub fn forgives_remaining(&self) -> u32 {
        self.budget.remaining(&self.record)
    }

    /// Current death-mode verdict, without applying anything.
    pub fn verdict(&self) -> Verdict {
        self.enforcer
            .evaluate(self.clock.now(), &self.record, &self.ledger)
    }

    pub fn report(&self) -> Report {
        self.reports.compute(&self.ledger, &self.record, self.today())
    }

    /// Per-day breakdown of the last `days` days, oldest first.
    pub fn history(&self, days: u32) -> Vec<DayReport> {
        self.reports
            .history(&self.ledger, &self.record, self.today(), days)
    }

    pub fn achievements(&self) -> Vec<AchievementStatus> {
        let streak = self.reports.streak(&self.ledger, &self.record, self.today());
        achievements::evaluate(&self.ledger, &self.record, &self.enforcer, &self.calendar, streak)
    }

    /// Top users of the same store by experience.
    ///
    /// # Errors
    /// Returns the store error if the query fails.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        leaderboard::leaderboard(self.store.as_ref(), &self.progression, limit)
    }

    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        let today = self.calendar.date_of(now);
        let experience = self.record.experience();
        let report = self.reports.compute(&self.ledger, &self.record, today);
        Snapshot {
            user_id: self.record.user_id.clone(),
            display_name: self.record.display_name.clone(),
            today,
            experience,
            level: self.record.level(),
            xp_into_level: self.progression.xp_into_level(experience),
            xp_per_level: self.progression.xp_per_level(),
            xp_to_next_level: self.progression.xp_to_next_level(experience),
            level_progress: self.progression.level_progress(experience),
            forgives_remaining: self.budget.remaining(&self.record),
            forgive_budget: self.budget.budget_for_level(self.record.level()),
            wake_time: self.record.wake_time(),
            wake_time_from: self.record.wake_time_from().filter(|from| *from > today),
            strict_days: self.record.strict_days(),
            strict_today: self.record.is_strict_day(today.weekday()),
            deadline_today: self.enforcer.deadline_today(now, &self.record),
            verdict: self.enforcer.evaluate(now, &self.record, &self.ledger),
            tasks_today: self.tasks_on(today),
            achievements: achievements::evaluate(
                &self.ledger,
                &self.record,
                &self.enforcer,
                &self.calendar,
                report.streak_days,
            ),
            report,
        }
    }

    // ── Task lifecycle ───────────────────────────────────────────────

    /// Log a pending task for `date` (today when `None`).
    ///
    /// # Errors
    /// `Validation` if the text is blank.
    pub fn add_task(&mut self, date: Option<NaiveDate>, text: &str) -> Result<Event> {
        let now = self.clock.now();
        let date = date.unwrap_or_else(|| self.calendar.date_of(now));
        let task = self
            .ledger
            .add(&self.record.user_id, date, text, now)?
            .clone();
        info!(user_id = %self.record.user_id, task_id = %task.id, date = %date, "task added");

        self.persist("add_task", &[Write::NewTask(&task.id)]);
        Ok(Event::TaskAdded { task, at: now })
    }

    /// Complete a pending task and credit experience.
    ///
    /// Returns `TaskCompleted`, followed by `LevelUp` when a threshold was
    /// crossed.
    ///
    /// # Errors
    /// `TaskNotFound` or `InvalidTransition`.
    pub fn complete_task(&mut self, task_id: &str) -> Result<Vec<Event>> {
        let now = self.clock.now();
        self.ledger.resolve(task_id, TaskStatus::Completed, now)?;

        let xp_awarded = self.progression.completion_reward();
        let experience = self.record.experience().saturating_add(xp_awarded);
        let change = self.record.set_experience(experience, &self.progression);
        info!(
            user_id = %self.record.user_id,
            task_id,
            xp_awarded,
            experience,
            level = change.to,
            "task completed"
        );

        let mut events = vec![Event::TaskCompleted {
            task_id: task_id.to_string(),
            xp_awarded,
            experience,
            level: change.to,
            at: now,
        }];
        if change.leveled_up() {
            info!(user_id = %self.record.user_id, from = change.from, to = change.to, "level up");
            events.push(Event::LevelUp {
                from: change.from,
                to: change.to,
                forgives_available: self.budget.remaining(&self.record),
                at: now,
            });
        }

        self.persist("complete_task", &[Write::Task(task_id), Write::Record]);
        Ok(events)
    }

    /// Spend one forgive exemption on a pending task.
    ///
    /// # Errors
    /// In order: `TaskNotFound`, `InvalidTransition`, `StrictModeViolation`
    /// when the task's weekday is strict, `BudgetExhausted`.
    pub fn forgive_task(&mut self, task_id: &str) -> Result<Event> {
        let now = self.clock.now();
        let date = self.ledger.pending(task_id)?.calendar_date;
        if self.record.is_strict_day(date.weekday()) {
            return Err(EngineError::StrictModeViolation {
                date,
                weekday: date.weekday(),
            });
        }
        if !self.budget.can_forgive(&self.record) {
            let level = self.record.level();
            return Err(EngineError::BudgetExhausted {
                level,
                budget: self.budget.budget_for_level(level),
            });
        }

        self.ledger.resolve(task_id, TaskStatus::Forgiven, now)?;
        self.record.consume_forgive();
        let forgives_remaining = self.budget.remaining(&self.record);
        info!(user_id = %self.record.user_id, task_id, forgives_remaining, "task forgiven");

        self.persist("forgive_task", &[Write::Task(task_id), Write::Record]);
        Ok(Event::TaskForgiven {
            task_id: task_id.to_string(),
            forgives_remaining,
            at: now,
        })
    }

    // ── Strict-mode settings ─────────────────────────────────────────

    /// Set the daily wake time from an `HH:MM` string.
    ///
    /// Any penalty already due is applied first. On a strict day whose
    /// deadline (old or new) has passed, the change only applies from
    /// tomorrow; otherwise it applies today.
    ///
    /// # Errors
    /// `Validation` if the string is not a valid time.
    pub fn set_wake_time(&mut self, raw: &str) -> Result<Vec<Event>> {
        let wake_time: WakeTime = raw.parse()?;
        let now = self.clock.now();
        let mut events = self.settle_penalties(now, "set_wake_time");

        let today = self.calendar.date_of(now);
        let deadline_passed = now > self.enforcer.deadline_on(&self.record, today)
            || now > self.enforcer.deadline_at(today, wake_time);
        let effective_from = if self.record.is_strict_day(today.weekday()) && deadline_passed {
            today.succ_opt().unwrap_or(today)
        } else {
            today
        };
        self.record.set_wake_time(wake_time, today, effective_from);
        info!(
            user_id = %self.record.user_id,
            wake_time = %wake_time,
            effective_from = %effective_from,
            "wake time changed"
        );

        self.persist("set_wake_time", &[Write::Record]);
        events.push(Event::WakeTimeChanged {
            wake_time,
            effective_from,
            at: now,
        });
        Ok(events)
    }

    /// Replace the set of strict weekdays. An empty set disables death mode.
    ///
    /// Any penalty already due is applied first. Days that stay strict keep
    /// their enforcement start; added days are enforced from now on.
    pub fn set_strict_days(&mut self, days: StrictDays) -> Vec<Event> {
        let now = self.clock.now();
        let mut events = self.settle_penalties(now, "set_strict_days");

        let added = self.record.set_strict_days(days, now);
        info!(user_id = %self.record.user_id, strict_days = %days, added = %added, "strict days changed");

        self.persist("set_strict_days", &[Write::Record]);
        events.push(Event::StrictDaysChanged {
            strict_days: days,
            added,
            at: now,
        });
        events
    }

    // ── Enforcement ──────────────────────────────────────────────────

    /// Run one death-mode check.
    ///
    /// Returns `Some(Event)` when a penalty was applied. Writes that failed
    /// earlier are retried here even when nothing changed.
    pub fn tick(&mut self) -> Option<Event> {
        let now = self.clock.now();
        let event = self.apply_due_penalty(now, "tick");
        if event.is_none() {
            debug!(user_id = %self.record.user_id, "death-mode check: no penalty");
            if self.has_unsynced_writes() {
                self.persist("tick", &[]);
            }
        }
        event
    }

    /// Apply every penalty due at `now` (yesterday's and today's).
    fn settle_penalties(&mut self, now: DateTime<Utc>, operation: &'static str) -> Vec<Event> {
        std::iter::from_fn(|| self.apply_due_penalty(now, operation)).collect()
    }

    fn apply_due_penalty(&mut self, now: DateTime<Utc>, operation: &'static str) -> Option<Event> {
        let penalty = self
            .enforcer
            .enforce(now, &mut self.record, &self.ledger, &self.progression)?;

        warn!(
            user_id = %self.record.user_id,
            day = %penalty.day,
            deadline = %penalty.deadline,
            experience_lost = penalty.experience_lost,
            level_before = penalty.level_before,
            "death-mode deadline missed; progression reset"
        );
        self.persist(operation, &[Write::Record]);
        Some(Event::DeathModePenalty {
            day: penalty.day,
            deadline: penalty.deadline,
            experience_lost: penalty.experience_lost,
            level_before: penalty.level_before,
            at: now,
        })
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Drain the queue of failed writes.
    pub fn take_persistence_failures(&mut self) -> Vec<PersistenceFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Whether some state has not reached the store yet.
    pub fn has_unsynced_writes(&self) -> bool {
        self.unsynced_record || !self.unsynced_tasks.is_empty()
    }

    /// Write `writes` plus anything left over from earlier failures.
    fn persist(&mut self, operation: &'static str, writes: &[Write<'_>]) {
        let retry_tasks = std::mem::take(&mut self.unsynced_tasks);
        let retry_record = std::mem::take(&mut self.unsynced_record);

        for id in &retry_tasks {
            let rewritten = writes
                .iter()
                .any(|w| matches!(w, Write::Task(t) | Write::NewTask(t) if *t == id.as_str()));
            if !rewritten {
                self.write_task(operation, id, false);
            }
        }

        let mut record_written = false;
        for write in writes {
            match write {
                Write::NewTask(id) => self.write_task(operation, id, true),
                Write::Task(id) => self.write_task(operation, id, false),
                Write::Record => {
                    self.write_record(operation);
                    record_written = true;
                }
            }
        }

        if retry_record && !record_written {
            self.write_record(operation);
        }
    }

    fn write_task(&mut self, operation: &'static str, task_id: &str, new: bool) {
        let Some(task) = self.ledger.get(task_id) else {
            return;
        };
        let result = if new {
            self.store.save_task(task)
        } else {
            self.store.update_task(task)
        };
        if let Err(e) = result {
            self.unsynced_tasks.insert(task_id.to_string());
            self.note_failure(operation, format!("task:{task_id}"), &e);
        }
    }

    fn write_record(&mut self, operation: &'static str) {
        if let Err(e) = self.store.save(&self.record.user_id, &self.record) {
            self.unsynced_record = true;
            let target = format!("record:{}", self.record.user_id);
            self.note_failure(operation, target, &e);
        }
    }

    fn note_failure(&mut self, operation: &'static str, target: String, error: &StoreError) {
        warn!(
            event = "persistence_failure",
            operation,
            target = %target,
            error = %error,
            "document store write failed; in-memory state kept"
        );
        self.failures.push(PersistenceFailure {
            operation: operation.to_string(),
            target,
            error: error.to_string(),
            at: self.clock.now(),
        });
    }
}
