//! Domain records owned by the engine.

mod record;
mod task;

pub use record::{LevelChange, ProgressionRecord, StrictDays, WakeTime};
pub use task::{Task, TaskStatus};
