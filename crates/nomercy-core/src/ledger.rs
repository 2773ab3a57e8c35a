//! Task ledger.
//!
//! Owns the canonical set of a user's tasks and enforces the lifecycle rules
//! from [`crate::model::TaskStatus`]. Budget and strict-day checks for
//! forgiving live in the engine, which has the progression record at hand.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{EngineError, Result, ValidationError};
use crate::model::{Task, TaskStatus};

#[derive(Debug, Clone, Default)]
pub struct TaskLedger {
    tasks: HashMap<String, Task>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from previously persisted tasks.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Log a new pending task.
    ///
    /// # Errors
    /// `Validation` if `text` is blank.
    pub fn add(
        &mut self,
        owner_id: &str,
        date: NaiveDate,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<&Task> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        let task = Task::new(owner_id, date, text, now);
        let id = task.id.clone();
        Ok(&*self.tasks.entry(id).or_insert(task))
    }

    /// Look up a task that must still be pending.
    ///
    /// # Errors
    /// `TaskNotFound` or `InvalidTransition`.
    pub fn pending(&self, task_id: &str) -> Result<&Task> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;
        if task.status.is_resolved() {
            return Err(EngineError::InvalidTransition {
                task_id: task_id.to_string(),
                status: task.status,
            });
        }
        Ok(&*task)
    }

    /// Move a pending task to a terminal state.
    ///
    /// # Errors
    /// `TaskNotFound` or `InvalidTransition`; the ledger is unchanged on error.
    pub fn resolve(&mut self, task_id: &str, to: TaskStatus, now: DateTime<Utc>) -> Result<&Task> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;
        let from = task.status;
        if !task.resolve(to, now) {
            return Err(EngineError::InvalidTransition {
                task_id: task_id.to_string(),
                status: from,
            });
        }
        Ok(&*task)
    }

    /// Tasks scoped to `date`, oldest first.
    pub fn tasks_on(&self, date: NaiveDate) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.calendar_date == date)
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    pub fn completed_on(&self, date: NaiveDate) -> usize {
        self.tasks
            .values()
            .filter(|t| t.calendar_date == date && t.is_completed())
            .count()
    }

    /// Whether some task of `date` was completed no later than `deadline`.
    pub fn completed_by(&self, date: NaiveDate, deadline: DateTime<Utc>) -> bool {
        self.tasks
            .values()
            .any(|t| t.calendar_date == date && t.completed_by(deadline))
    }
}
