//! Course and schedule records as exchanged with the extraction model
//!
//! Records keep the wire values they were decoded from so they can be handed
//! back to callers unchanged. Typed views (`day()`, `time_slot()`, `weeks()`)
//! return `None` or an empty set when a field is missing or malformed; such an
//! entry simply does not take part in conflict checking.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::weeks::WeekSet;

/// A course extracted from the timetable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default, deserialize_with = "lenient::string")]
    pub code: String,

    /// Identity key for conflict grouping
    pub name: String,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub teachers: Vec<String>,

    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub schedules: Vec<ScheduleEntry>,
}

impl Course {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            name: name.into(),
            teachers: Vec::new(),
            schedules: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_teacher(mut self, teacher: impl Into<String>) -> Self {
        self.teachers.push(teacher.into());
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleEntry) -> Self {
        self.schedules.push(schedule);
        self
    }
}

/// One week/day/period occupancy claim for a course
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Raw week notation, see [`WeekSet::parse`]
    #[serde(default, deserialize_with = "lenient::string")]
    pub weeks: String,

    /// Day of week as sent on the wire (`"3"` or `3`)
    #[serde(default, deserialize_with = "lenient::string")]
    pub day: String,

    /// Inclusive period range as sent on the wire (`"3-4"`)
    #[serde(default, deserialize_with = "lenient::string")]
    pub time_slot: String,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub classroom: Option<String>,
}

impl ScheduleEntry {
    pub fn new(weeks: impl Into<String>, day: u8, time_slot: TimeSlot) -> Self {
        Self {
            weeks: weeks.into(),
            day: day.to_string(),
            time_slot: time_slot.to_string(),
            ..Default::default()
        }
    }

    pub fn at(mut self, campus: impl Into<String>, building: impl Into<String>, classroom: impl Into<String>) -> Self {
        self.campus = Some(campus.into());
        self.building = Some(building.into());
        self.classroom = Some(classroom.into());
        self
    }

    /// Weeks this entry occupies
    pub fn weeks(&self) -> WeekSet {
        WeekSet::parse(&self.weeks)
    }

    /// Day of week in 1..=7, if well formed
    pub fn day(&self) -> Option<u8> {
        let day = self.day.trim().parse::<u8>().ok().filter(|d| (1..=7).contains(d));
        if day.is_none() {
            debug!(day = %self.day, "ScheduleEntry::day: not a valid day");
        }
        day
    }

    /// Period range, if well formed
    pub fn time_slot(&self) -> Option<TimeSlot> {
        let slot = TimeSlot::parse(&self.time_slot);
        if slot.is_none() {
            debug!(time_slot = %self.time_slot, "ScheduleEntry::time_slot: not a valid slot");
        }
        slot
    }
}

/// Largest class period accepted in a time slot
pub const MAX_PERIOD: u32 = 24;

/// Inclusive range of class periods within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: u32,
    pub end: u32,
}

impl TimeSlot {
    /// Build a slot, rejecting zero periods, reversed ranges and periods past `MAX_PERIOD`
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start >= 1 && start <= end && end <= MAX_PERIOD).then_some(Self { start, end })
    }

    /// Parse `"start-end"`
    pub fn parse(raw: &str) -> Option<Self> {
        let (start, end) = raw.split_once('-')?;
        let start = start.trim().parse::<u32>().ok()?;
        let end = end.trim().parse::<u32>().ok()?;
        Self::new(start, end)
    }

    pub fn periods(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Deserializers that accept the loose shapes models tend to produce
mod lenient {
    use super::*;
    use serde_json::Value;

    fn scalar_to_string(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// String or number; null and other shapes become empty
    pub fn string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        let value = Value::deserialize(de)?;
        Ok(scalar_to_string(value).unwrap_or_default())
    }

    /// String or number; null, empty and other shapes become `None`
    pub fn opt_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(de)?;
        Ok(scalar_to_string(value).filter(|s| !s.is_empty()))
    }

    /// List of strings, a single string, or null
    pub fn string_list<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(de)?;
        Ok(match value {
            Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
            other => scalar_to_string(other).into_iter().filter(|s| !s.is_empty()).collect(),
        })
    }

    pub fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
    }
}
