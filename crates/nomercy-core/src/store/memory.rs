//! In-memory document store.
//!
//! Clones share the same underlying maps, so a test can hand one clone to an
//! engine and inspect or sabotage the replica through another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::DocumentStore;
use crate::error::StoreError;
use crate::model::{ProgressionRecord, Task};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, ProgressionRecord>,
    tasks: HashMap<String, Task>,
    fail_writes: bool,
    writes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn record(&self, user_id: &str) -> Option<ProgressionRecord> {
        self.lock().records.get(user_id).cloned()
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.lock().tasks.get(task_id).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn writable(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let mut guard = self.lock();
        if guard.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        guard.writes += 1;
        Ok(guard)
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, user_id: &str) -> Result<Option<ProgressionRecord>, StoreError> {
        Ok(self.record(user_id))
    }

    fn save(&self, user_id: &str, record: &ProgressionRecord) -> Result<(), StoreError> {
        self.writable()?
            .records
            .insert(user_id.to_string(), record.clone());
        Ok(())
    }

    fn load_tasks(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .lock()
            .tasks
            .values()
            .filter(|t| t.owner_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            (a.calendar_date, a.created_at).cmp(&(b.calendar_date, b.created_at))
        });
        Ok(tasks)
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut guard = self.writable()?;
        if guard.tasks.contains_key(&task.id) {
            return Err(StoreError::QueryFailed(format!("duplicate task id {}", task.id)));
        }
        guard.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.writable()?.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn top_by_experience(&self, limit: usize) -> Result<Vec<ProgressionRecord>, StoreError> {
        let mut records: Vec<ProgressionRecord> = self.lock().records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.experience()
                .cmp(&a.experience())
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        records.truncate(limit);
        Ok(records)
    }
}
