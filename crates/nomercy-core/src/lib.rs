//! # No Mercy Core Library
//!
//! Progression and enforcement engine for a gamified daily-habit tracker.
//! Users log tasks for a calendar day, earn experience for completing them,
//! level up, and may opt into death mode: on chosen weekdays at least one task
//! must be completed before the wake-up deadline, or progression resets.
//!
//! ## Architecture
//!
//! - **Engine**: per-user session facade; every state change goes through it
//!   and produces an [`Event`]
//! - **Calculators**: pure XP/level arithmetic, forgive budget, death-mode
//!   verdicts, reports and achievements
//! - **Storage**: [`DocumentStore`] trait with SQLite and in-memory backends,
//!   TOML-based configuration
//! - **Scheduler**: tokio interval driving periodic death-mode checks
//!
//! ## Key Components
//!
//! - [`Engine`]: session facade
//! - [`DeathModeEnforcer`]: deadline evaluation and penalty transition
//! - [`SqliteStore`]: record and task persistence
//! - [`Config`]: engine configuration management

pub mod achievements;
pub mod clock;
pub mod config;
pub mod enforcer;
pub mod engine;
pub mod error;
pub mod events;
pub mod forgive;
pub mod leaderboard;
pub mod ledger;
pub mod model;
pub mod progression;
pub mod report;
pub mod scheduler;
pub mod store;

pub use achievements::{Achievement, AchievementStatus};
pub use clock::{Calendar, Clock, ManualClock, SystemClock};
pub use config::Config;
pub use enforcer::{DeathModeEnforcer, Penalty, Verdict};
pub use engine::{Engine, Identity, PersistenceFailure, Snapshot};
pub use error::{ConfigError, EngineError, StoreError, ValidationError};
pub use events::Event;
pub use forgive::ForgiveBudget;
pub use leaderboard::LeaderboardEntry;
pub use ledger::TaskLedger;
pub use model::{ProgressionRecord, StrictDays, Task, TaskStatus, WakeTime};
pub use progression::Progression;
pub use report::{DayReport, Report, ReportAggregator};
pub use scheduler::{EnforcementScheduler, SharedEngine};
pub use store::{DocumentStore, MemoryStore, SqliteStore};
