//! Task types.
//!
//! A task belongs to exactly one calendar day and moves through a one-way
//! lifecycle:
//!
//! ```text
//!            complete
//!   PENDING ─────────> COMPLETED   (grants XP)
//!      │
//!      └─────────────> FORGIVEN    (no XP, spends one forgive)
//!            forgive
//! ```
//!
//! Both resolved states are terminal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Logged but not resolved yet (initial state).
    #[default]
    Pending,
    /// Done by the user (terminal).
    Completed,
    /// Exempted without completion (terminal).
    Forgiven,
}

impl TaskStatus {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &TaskStatus) -> bool {
        match self {
            TaskStatus::Pending => matches!(to, TaskStatus::Completed | TaskStatus::Forgiven),
            TaskStatus::Completed | TaskStatus::Forgiven => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Forgiven => "forgiven",
        }
    }

    /// Parse the persisted lowercase representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            "forgiven" => Some(TaskStatus::Forgiven),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single daily task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, stable for the task's lifetime
    pub id: String,
    /// Owning user (back-reference only)
    pub owner_id: String,
    /// Day the task belongs to
    pub calendar_date: NaiveDate,
    /// Non-empty label
    pub text: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Set if and only if `status` is not `pending`
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task with a fresh identifier.
    ///
    /// Text is stored trimmed; emptiness is checked by the ledger.
    pub fn new(
        owner_id: impl Into<String>,
        calendar_date: NaiveDate,
        text: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Task {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            calendar_date,
            text: text.trim().to_string(),
            status: TaskStatus::Pending,
            created_at: now,
            resolved_at: None,
        }
    }

    /// Move to a terminal state.
    ///
    /// Returns `false` and leaves the task untouched if the transition is not
    /// allowed.
    pub fn resolve(&mut self, to: TaskStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(&to) {
            return false;
        }
        self.status = to;
        self.resolved_at = Some(now);
        true
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Completed and resolved no later than `deadline`.
    pub fn completed_by(&self, deadline: DateTime<Utc>) -> bool {
        self.is_completed() && self.resolved_at.is_some_and(|at| at <= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 12, h, m, 0).unwrap()
    }

    #[test]
    fn only_pending_can_transition() {
        assert!(TaskStatus::Pending.can_transition_to(&TaskStatus::Completed));
        assert!(TaskStatus::Pending.can_transition_to(&TaskStatus::Forgiven));
        assert!(!TaskStatus::Pending.can_transition_to(&TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(&TaskStatus::Forgiven));
        assert!(!TaskStatus::Forgiven.can_transition_to(&TaskStatus::Completed));
    }

    #[test]
    fn resolve_sets_resolved_at_once() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let mut task = Task::new("u1", day, "  Wake up  ", at(5, 0));
        assert_eq!(task.text, "Wake up");
        assert!(task.resolved_at.is_none());

        assert!(task.resolve(TaskStatus::Completed, at(5, 30)));
        assert_eq!(task.resolved_at, Some(at(5, 30)));

        assert!(!task.resolve(TaskStatus::Forgiven, at(6, 0)));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.resolved_at, Some(at(5, 30)));
    }

    #[test]
    fn completed_by_respects_deadline() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let mut task = Task::new("u1", day, "Run", at(5, 0));
        assert!(!task.completed_by(at(6, 10)));
        task.resolve(TaskStatus::Completed, at(6, 10));
        assert!(task.completed_by(at(6, 10)));
        assert!(!task.completed_by(at(6, 9)));
    }

    #[test]
    fn status_parse_matches_display() {
        for status in [TaskStatus::Pending, TaskStatus::Completed, TaskStatus::Forgiven] {
            assert_eq!(TaskStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(TaskStatus::parse("done"), None);
    }

    #[test]
    fn task_serializes_camel_case() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let task = Task::new("u1", day, "Read", at(5, 0));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["calendarDate"], "2026-10-12");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["ownerId"], "u1");
        assert!(json["resolvedAt"].is_null());
    }
}
