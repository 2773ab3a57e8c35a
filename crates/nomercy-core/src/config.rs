//! TOML-based engine configuration.
//!
//! Stores the tunable rules of the engine:
//! - Progression constants (XP per level, XP per task, strict scoring)
//! - Forgive budget table
//! - Death-mode grace period and enforcement cadence
//! - Calendar settings (UTC offset, first day of week)
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Weekday};
use serde::{Deserialize, Serialize};

use crate::clock::Calendar;
use crate::enforcer::{DeathModeEnforcer, DEFAULT_GRACE_MINUTES};
use crate::error::ConfigError;
use crate::forgive::{ForgiveBudget, DEFAULT_BUDGET_TABLE};
use crate::leaderboard::DEFAULT_LEADERBOARD_SIZE;
use crate::progression::{Progression, DEFAULT_XP_PER_LEVEL, DEFAULT_XP_PER_TASK};
use crate::report::ReportAggregator;
use crate::store::data_dir;

/// Progression-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_xp_per_level")]
    pub xp_per_level: u64,
    #[serde(default = "default_xp_per_task")]
    pub xp_per_task: u64,
    /// Completions resolve tasks but grant no XP.
    #[serde(default)]
    pub strict_scoring: bool,
}

/// Forgive budget configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgiveConfig {
    /// Allotment per level, starting at level 1. Must not increase.
    #[serde(default = "default_budget_table")]
    pub budget_table: Vec<u32>,
}

/// Death-mode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathModeConfig {
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: u32,
    /// Seconds between enforcement checks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

/// Calendar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Offset of the user's local time from UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_week_start")]
    pub week_start: Weekday,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of entries shown on the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub forgive: ForgiveConfig,
    #[serde(default)]
    pub death_mode: DeathModeConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

// Default functions
fn default_xp_per_level() -> u64 {
    DEFAULT_XP_PER_LEVEL
}
fn default_xp_per_task() -> u64 {
    DEFAULT_XP_PER_TASK
}
fn default_budget_table() -> Vec<u32> {
    DEFAULT_BUDGET_TABLE.to_vec()
}
/// Keeps every deadline inside the enforcer's one-day look-back.
pub const MAX_GRACE_MINUTES: u32 = 720;

fn default_grace_minutes() -> u32 {
    DEFAULT_GRACE_MINUTES
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_week_start() -> Weekday {
    Weekday::Mon
}
fn default_leaderboard_size() -> usize {
    DEFAULT_LEADERBOARD_SIZE
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_per_level: default_xp_per_level(),
            xp_per_task: default_xp_per_task(),
            strict_scoring: false,
        }
    }
}

impl Default for ForgiveConfig {
    fn default() -> Self {
        Self {
            budget_table: default_budget_table(),
        }
    }
}

impl Default for DeathModeConfig {
    fn default() -> Self {
        Self {
            grace_minutes: default_grace_minutes(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            week_start: default_week_start(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            leaderboard_size: default_leaderboard_size(),
            progression: ProgressionConfig::default(),
            forgive: ForgiveConfig::default(),
            death_mode: DeathModeConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or is
    /// invalid, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the default if it is missing.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. The result is validated; on error
    /// `self` is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting configuration is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `InvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.progression.xp_per_level == 0 {
            return Err(invalid("progression.xp_per_level", "must be greater than zero"));
        }
        if ForgiveBudget::new(self.forgive.budget_table.clone()).is_none() {
            return Err(invalid("forgive.budget_table", "must not increase from one level to the next"));
        }
        if self.death_mode.grace_minutes > MAX_GRACE_MINUTES {
            return Err(invalid("death_mode.grace_minutes", "must be at most 720 (12 hours)"));
        }
        if self.death_mode.tick_interval_secs == 0 {
            return Err(invalid("death_mode.tick_interval_secs", "must be at least 1"));
        }
        if self.fixed_offset().is_none() {
            return Err(invalid("calendar.utc_offset_minutes", "must be within +/- 24 hours"));
        }
        Ok(())
    }

    fn fixed_offset(&self) -> Option<FixedOffset> {
        self.calendar
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    // ── Component builders ───────────────────────────────────────────

    pub fn progression(&self) -> Progression {
        Progression::new(
            self.progression.xp_per_level,
            self.progression.xp_per_task,
            self.progression.strict_scoring,
        )
        .unwrap_or_default()
    }

    pub fn forgive_budget(&self) -> ForgiveBudget {
        ForgiveBudget::new(self.forgive.budget_table.clone()).unwrap_or_default()
    }

    pub fn calendar(&self) -> Calendar {
        match self.fixed_offset() {
            Some(offset) => Calendar::new(offset, self.calendar.week_start),
            None => Calendar::default(),
        }
    }

    pub fn enforcer(&self) -> DeathModeEnforcer {
        DeathModeEnforcer::new(self.death_mode.grace_minutes, self.calendar())
    }

    pub fn reports(&self) -> ReportAggregator {
        ReportAggregator::new(self.calendar())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.death_mode.tick_interval_secs.max(1))
    }
}
