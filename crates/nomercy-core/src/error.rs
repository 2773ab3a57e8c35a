//! Core error types for nomercy-core.
//!
//! Every rejected engine operation maps onto one variant of [`EngineError`].
//! None of them is fatal: each is recoverable at the boundary of a single
//! operation, and a rejected operation leaves in-memory state untouched.

use std::path::PathBuf;

use chrono::{NaiveDate, Weekday};
use thiserror::Error;

use crate::model::TaskStatus;

/// Core error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input rejected before any state change (e.g. empty task text).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The task has already left `pending`.
    #[error("Task {task_id} is already {status}; it cannot be resolved again")]
    InvalidTransition { task_id: String, status: TaskStatus },

    /// No forgive exemptions left at the current level.
    #[error("No forgives left at level {level} (budget {budget})")]
    BudgetExhausted { level: u32, budget: u32 },

    /// Forgiving is disallowed on death-mode days.
    #[error("Death mode is active on {weekday} ({date}); forgiving is not allowed")]
    StrictModeViolation { date: NaiveDate, weekday: Weekday },

    /// Unknown task identifier.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document store errors that prevent the operation from starting at all.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Task text is empty after trimming.
    #[error("task text cannot be empty")]
    EmptyText,

    /// Wake time could not be parsed as `HH:MM`.
    #[error("invalid wake time '{0}': expected HH:MM")]
    InvalidWakeTime(String),

    /// Weekday name could not be parsed.
    #[error("invalid weekday '{0}'")]
    InvalidWeekday(String),
}

/// Document store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored document could not be encoded or decoded.
    #[error("Malformed document: {0}")]
    Serialization(String),

    /// The store refused the request (offline, injected failure, ...).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The data directory could not be resolved or created.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree.
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
