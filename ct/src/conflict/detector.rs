//! Calendar overlap detection
//!
//! Every schedule entry claims a set of `(week, day, period)` cells. The first
//! course to claim a cell owns it; any later claim by a course with a
//! different name records a conflict between the two names. Courses are
//! identified by name only, so two distinct courses that share a name are
//! never reported against each other.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::domain::Course;

/// Header line of a non-empty conflict report
pub const REPORT_HEADER: &str = "检测到以下课程存在时间冲突：";

/// One `(week, day, period)` calendar cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub week: u32,
    pub day: u8,
    pub period: u32,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "第{}周 周{} 第{}节", self.week, self.day, self.period)
    }
}

/// Unordered pair of distinct course names, stored in lexicographic order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictPair {
    first: String,
    second: String,
}

impl ConflictPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    /// Report line for this pair
    pub fn line(&self) -> String {
        format!("- 课程 '{}' 与 '{}' 存在时间重叠。", self.first, self.second)
    }
}

/// Outcome of a conflict check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    /// Each pair with the first cell where the collision was seen
    pairs: BTreeMap<ConflictPair, Cell>,
}

impl ConflictReport {
    pub fn has_conflict(&self) -> bool {
        !self.pairs.is_empty()
    }

    /// Distinct conflicting pairs in `(first, second)` order
    pub fn pairs(&self) -> impl Iterator<Item = &ConflictPair> {
        self.pairs.keys()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn details(&self) -> impl Iterator<Item = (&ConflictPair, Cell)> {
        self.pairs.iter().map(|(pair, cell)| (pair, *cell))
    }

    /// Human-readable report; empty when there are no conflicts
    pub fn render(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let mut lines = Vec::with_capacity(self.pairs.len() + 1);
        lines.push(REPORT_HEADER.to_string());
        lines.extend(self.pairs.keys().map(ConflictPair::line));
        lines.join("\n")
    }
}

/// Check a course list for overlapping schedule entries
pub fn detect(courses: &[Course]) -> ConflictReport {
    debug!(course_count = courses.len(), "detect: called");
    let mut calendar: HashMap<Cell, &str> = HashMap::new();
    let mut report = ConflictReport::default();

    for course in courses {
        for entry in &course.schedules {
            let (Some(day), Some(slot)) = (entry.day(), entry.time_slot()) else {
                debug!(course = %course.name, "detect: skipping incomplete schedule entry");
                continue;
            };
            let weeks = entry.weeks();
            if weeks.is_empty() {
                debug!(course = %course.name, weeks = %entry.weeks, "detect: skipping entry without weeks");
                continue;
            }

            for week in weeks.iter() {
                for period in slot.periods() {
                    let cell = Cell { week, day, period };
                    match calendar.entry(cell) {
                        Entry::Vacant(vacant) => {
                            vacant.insert(course.name.as_str());
                        }
                        Entry::Occupied(occupied) if *occupied.get() != course.name => {
                            report
                                .pairs
                                .entry(ConflictPair::new(*occupied.get(), course.name.as_str()))
                                .or_insert(cell);
                        }
                        Entry::Occupied(_) => {}
                    }
                }
            }
        }
    }

    debug!(pair_count = report.len(), "detect: finished");
    report
}
