//! Document store collaborator.
//!
//! The engine treats persistence as an eventually-consistent replica of its
//! in-memory state. Implementations:
//! - [`SqliteStore`]: on-disk store at `<data_dir>/nomercy.db`
//! - [`MemoryStore`]: shared in-memory store with failure injection, for tests

mod memory;
pub mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::path::PathBuf;

use crate::error::StoreError;
use crate::model::{ProgressionRecord, Task};

/// Storage operations the engine relies on.
///
/// Records are keyed by user id, tasks by task id.
pub trait DocumentStore: Send {
    /// Load a user's record; `Ok(None)` when the user has never signed in.
    fn load(&self, user_id: &str) -> Result<Option<ProgressionRecord>, StoreError>;

    /// Insert or replace a user's record.
    fn save(&self, user_id: &str, record: &ProgressionRecord) -> Result<(), StoreError>;

    fn load_tasks(&self, user_id: &str) -> Result<Vec<Task>, StoreError>;

    /// Persist a newly created task.
    fn save_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Persist a changed task, inserting it if an earlier save was lost.
    fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Records ordered by experience, highest first.
    fn top_by_experience(&self, limit: usize) -> Result<Vec<ProgressionRecord>, StoreError>;
}

/// Returns the data directory, creating it if needed.
///
/// `NOMERCY_DATA_DIR` wins when set. Otherwise `~/.config/nomercy[-dev]/`
/// based on `NOMERCY_ENV` (set it to `dev` for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("NOMERCY_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("NOMERCY_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("nomercy-dev")
            } else {
                base_dir.join("nomercy")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
