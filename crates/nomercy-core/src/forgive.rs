//! Forgive budget accounting.
//!
//! The allotment is a non-increasing table indexed by level; levels past the
//! end of the table get nothing. Remaining budget is always derived from the
//! record's level and `forgives_consumed`, never stored on its own.

use serde::{Deserialize, Serialize};

use crate::model::ProgressionRecord;

/// Default allotment: level 1 -> 6, level 2 -> 5, ... level 6 -> 1, then 0.
pub const DEFAULT_BUDGET_TABLE: [u32; 6] = [6, 5, 4, 3, 2, 1];

/// Serialized as the bare per-level table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct ForgiveBudget {
    table: Vec<u32>,
}

impl TryFrom<Vec<u32>> for ForgiveBudget {
    type Error = String;

    fn try_from(table: Vec<u32>) -> Result<Self, Self::Error> {
        ForgiveBudget::new(table).ok_or_else(|| "budget table must not increase".to_string())
    }
}

impl From<ForgiveBudget> for Vec<u32> {
    fn from(budget: ForgiveBudget) -> Self {
        budget.table
    }
}

impl Default for ForgiveBudget {
    fn default() -> Self {
        Self {
            table: DEFAULT_BUDGET_TABLE.to_vec(),
        }
    }
}

impl ForgiveBudget {
    /// Build from a per-level table; `None` if the table ever increases.
    pub fn new(table: Vec<u32>) -> Option<Self> {
        if table.windows(2).any(|pair| pair[1] > pair[0]) {
            return None;
        }
        Some(Self { table })
    }

    pub fn table(&self) -> &[u32] {
        &self.table
    }

    pub fn budget_for_level(&self, level: u32) -> u32 {
        let index = level.saturating_sub(1) as usize;
        self.table.get(index).copied().unwrap_or(0)
    }

    pub fn remaining(&self, record: &ProgressionRecord) -> u32 {
        self.budget_for_level(record.level())
            .saturating_sub(record.forgives_consumed())
    }

    pub fn can_forgive(&self, record: &ProgressionRecord) -> bool {
        self.remaining(record) > 0
    }
}
