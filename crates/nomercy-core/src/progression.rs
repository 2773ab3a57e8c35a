//! Experience to level arithmetic.
//!
//! `level = floor(experience / xp_per_level) + 1`. The mapping is pure: it
//! depends only on the configured constants, never on history.

use serde::{Deserialize, Serialize};

pub const DEFAULT_XP_PER_LEVEL: u64 = 100;
pub const DEFAULT_XP_PER_TASK: u64 = 10;

/// Progression constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProgressionParams")]
pub struct Progression {
    /// Flat experience threshold per level. Always > 0.
    xp_per_level: u64,
    /// Experience granted per completed task.
    xp_per_task: u64,
    /// When set, completions resolve the task but grant no experience.
    strict_scoring: bool,
}

/// Unchecked wire form; goes through [`Progression::new`] on the way in.
#[derive(Deserialize)]
struct ProgressionParams {
    xp_per_level: u64,
    xp_per_task: u64,
    #[serde(default)]
    strict_scoring: bool,
}

impl TryFrom<ProgressionParams> for Progression {
    type Error = String;

    fn try_from(params: ProgressionParams) -> Result<Self, Self::Error> {
        Progression::new(params.xp_per_level, params.xp_per_task, params.strict_scoring)
            .ok_or_else(|| "xp_per_level must be greater than zero".to_string())
    }
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            xp_per_level: DEFAULT_XP_PER_LEVEL,
            xp_per_task: DEFAULT_XP_PER_TASK,
            strict_scoring: false,
        }
    }
}

impl Progression {
    /// Build a calculator; `None` when `xp_per_level` is zero.
    pub fn new(xp_per_level: u64, xp_per_task: u64, strict_scoring: bool) -> Option<Self> {
        if xp_per_level == 0 {
            return None;
        }
        Some(Self {
            xp_per_level,
            xp_per_task,
            strict_scoring,
        })
    }

    pub fn xp_per_level(&self) -> u64 {
        self.xp_per_level
    }

    pub fn strict_scoring(&self) -> bool {
        self.strict_scoring
    }

    pub fn level_for(&self, experience: u64) -> u32 {
        let level = experience / self.xp_per_level + 1;
        u32::try_from(level).unwrap_or(u32::MAX)
    }

    /// Experience earned inside the current level.
    pub fn xp_into_level(&self, experience: u64) -> u64 {
        experience % self.xp_per_level
    }

    pub fn xp_to_next_level(&self, experience: u64) -> u64 {
        self.xp_per_level - self.xp_into_level(experience)
    }

    /// 0.0 .. 1.0 progress within the current level.
    pub fn level_progress(&self, experience: u64) -> f64 {
        self.xp_into_level(experience) as f64 / self.xp_per_level as f64
    }

    /// Experience granted for one completion under the current scoring mode.
    pub fn completion_reward(&self) -> u64 {
        if self.strict_scoring {
            0
        } else {
            self.xp_per_task
        }
    }
}
