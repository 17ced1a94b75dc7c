//! Domain types: courses, schedule entries, week sets

mod course;
pub mod weeks;

pub use course::{Course, MAX_PERIOD, ScheduleEntry, TimeSlot};
pub use weeks::{MAX_WEEK, WeekSet};
