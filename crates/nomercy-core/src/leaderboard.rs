//! Experience leaderboard across all users of a store.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::progression::Progression;
use crate::store::DocumentStore;

pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub user_id: String,
    pub display_name: String,
    pub experience: u64,
    pub level: u32,
}

/// Top `limit` users by experience, ties broken by user id.
///
/// Levels are re-derived with `calc` rather than read from the stored copy.
///
/// # Errors
/// Returns the store error if the query fails.
pub fn leaderboard(
    store: &dyn DocumentStore,
    calc: &Progression,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let records = store.top_by_experience(limit)?;
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(i, record)| LeaderboardEntry {
            rank: i + 1,
            level: calc.level_for(record.experience()),
            experience: record.experience(),
            display_name: if record.display_name.is_empty() {
                record.user_id.clone()
            } else {
                record.display_name
            },
            user_id: record.user_id,
        })
        .collect())
}
