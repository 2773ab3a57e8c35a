//! User progression record.
//!
//! One record per account. Fields that carry invariants (experience, level,
//! forgive consumption, strict-mode bookkeeping) are private and only change
//! through the crate's engine operations; `level` is always re-derived from
//! `experience` so the two cannot drift.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::progression::Progression;

/// Time of day the user commits to be up by, serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WakeTime(NaiveTime);

impl WakeTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(WakeTime)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }
}

impl Default for WakeTime {
    fn default() -> Self {
        WakeTime(NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl fmt::Display for WakeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for WakeTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(WakeTime)
            .map_err(|_| ValidationError::InvalidWakeTime(s.to_string()))
    }
}

impl Serialize for WakeTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WakeTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Monday-first weekday order used for display and iteration.
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Set of weekdays on which death mode is active. Empty means disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct StrictDays(u8);

impl StrictDays {
    pub fn none() -> Self {
        StrictDays(0)
    }

    pub fn every_day() -> Self {
        WEEKDAYS.into_iter().collect()
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !Self::bit(day);
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in `self` that are not in `other`.
    pub fn difference(&self, other: &StrictDays) -> StrictDays {
        StrictDays(self.0 & !other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.into_iter().filter(|d| self.contains(*d))
    }

    /// Parse a comma-separated list such as `"mon,wed,fri"`.
    ///
    /// `"none"` or an empty string yields the empty set.
    pub fn parse_list(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(StrictDays::none());
        }
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(StrictDays::every_day());
        }
        trimmed
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<Weekday>()
                    .map_err(|_| ValidationError::InvalidWeekday(part.trim().to_string()))
            })
            .collect()
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }
}

impl FromIterator<Weekday> for StrictDays {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut days = StrictDays::none();
        for day in iter {
            days.insert(day);
        }
        days
    }
}

impl From<Vec<Weekday>> for StrictDays {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<StrictDays> for Vec<Weekday> {
    fn from(days: StrictDays) -> Self {
        days.iter().collect()
    }
}

impl fmt::Display for StrictDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<String> = self.iter().map(|d| d.to_string()).collect();
        f.write_str(&names.join(","))
    }
}

/// Outcome of an experience change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub from: u32,
    pub to: u32,
}

impl LevelChange {
    pub fn leveled_up(&self) -> bool {
        self.to > self.from
    }
}

/// Per-account progression state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionRecord {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    experience: u64,
    /// Denormalized copy of the derived level; re-derived on load.
    level: u32,
    /// Most recently requested wake time.
    #[serde(default)]
    wake_time: WakeTime,
    /// Wake time in effect from each date on. Only the days the enforcer can
    /// still look at are kept.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    wake_schedule: BTreeMap<NaiveDate, WakeTime>,
    #[serde(default)]
    strict_days: StrictDays,
    /// Per weekday, Monday first: when that day joined the strict set.
    #[serde(default)]
    strict_since: [Option<DateTime<Utc>>; 7],
    #[serde(default)]
    forgives_consumed: u32,
    #[serde(default)]
    last_penalized: Option<NaiveDate>,
    #[serde(default)]
    penalty_days: BTreeSet<NaiveDate>,
}

impl ProgressionRecord {
    /// Defaults for a first sign-in.
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            experience: 0,
            level: 1,
            wake_time: WakeTime::default(),
            wake_schedule: BTreeMap::new(),
            strict_days: StrictDays::none(),
            strict_since: [None; 7],
            forgives_consumed: 0,
            last_penalized: None,
            penalty_days: BTreeSet::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn experience(&self) -> u64 {
        self.experience
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// The latest wake-time setting, which may only apply from tomorrow.
    pub fn wake_time(&self) -> WakeTime {
        self.wake_time
    }

    /// Wake time that governs `date`'s deadline.
    pub fn wake_time_on(&self, date: NaiveDate) -> WakeTime {
        self.wake_schedule
            .range(..=date)
            .next_back()
            .map(|(_, wake)| *wake)
            .unwrap_or(self.wake_time)
    }

    /// First date on which [`Self::wake_time`] applies; `None` if it was
    /// never changed.
    pub fn wake_time_from(&self) -> Option<NaiveDate> {
        self.wake_schedule
            .iter()
            .next_back()
            .map(|(date, _)| *date)
    }

    pub fn strict_days(&self) -> StrictDays {
        self.strict_days
    }

    /// When `day` was last added to the strict set; `None` if it is not in it.
    pub fn strict_since(&self, day: Weekday) -> Option<DateTime<Utc>> {
        self.strict_since[day.num_days_from_monday() as usize]
    }

    pub fn forgives_consumed(&self) -> u32 {
        self.forgives_consumed
    }

    pub fn last_penalized(&self) -> Option<NaiveDate> {
        self.last_penalized
    }

    pub fn penalty_days(&self) -> &BTreeSet<NaiveDate> {
        &self.penalty_days
    }

    pub fn is_strict_day(&self, day: Weekday) -> bool {
        self.strict_days.contains(day)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Replace experience and re-derive level.
    ///
    /// A level increase opens a fresh forgive epoch.
    pub(crate) fn set_experience(&mut self, experience: u64, calc: &Progression) -> LevelChange {
        let from = self.level;
        self.experience = experience;
        self.level = calc.level_for(experience);
        if self.level > from {
            self.forgives_consumed = 0;
        }
        LevelChange { from, to: self.level }
    }

    /// Re-derive level from experience, discarding whatever level was stored.
    pub(crate) fn resync_level(&mut self, calc: &Progression) {
        self.level = calc.level_for(self.experience);
    }

    pub(crate) fn consume_forgive(&mut self) {
        self.forgives_consumed = self.forgives_consumed.saturating_add(1);
    }

    /// Death-mode penalty: experience to zero, level to one, forgive epoch
    /// cleared, day recorded.
    pub(crate) fn apply_penalty(&mut self, day: NaiveDate, calc: &Progression) -> LevelChange {
        let change = self.set_experience(0, calc);
        self.forgives_consumed = 0;
        self.last_penalized = Some(day);
        self.penalty_days.insert(day);
        change
    }

    /// Set the wake time, effective from `effective_from` (today or later).
    ///
    /// Yesterday and every day before `effective_from` keep the wake time
    /// they had, so their deadlines do not move.
    pub(crate) fn set_wake_time(
        &mut self,
        wake_time: WakeTime,
        today: NaiveDate,
        effective_from: NaiveDate,
    ) {
        let horizon = today.pred_opt().unwrap_or(today);
        let mut schedule = BTreeMap::new();
        schedule.insert(horizon, self.wake_time_on(horizon));
        schedule.extend(
            self.wake_schedule
                .range(horizon..effective_from)
                .map(|(date, wake)| (*date, *wake)),
        );
        schedule.insert(effective_from, wake_time);
        self.wake_schedule = schedule;
        self.wake_time = wake_time;
    }

    /// Replace the strict-day set.
    ///
    /// Days that were already strict keep their enforcement start; newly
    /// added days are enforced from `now`. Returns the newly added days.
    pub(crate) fn set_strict_days(&mut self, days: StrictDays, now: DateTime<Utc>) -> StrictDays {
        let added = days.difference(&self.strict_days);
        for day in WEEKDAYS {
            let slot = &mut self.strict_since[day.num_days_from_monday() as usize];
            if !days.contains(day) {
                *slot = None;
            } else if added.contains(day) || slot.is_none() {
                *slot = Some(now);
            }
        }
        self.strict_days = days;
        added
    }
}
