//! Timetable conflict detection

mod detector;

pub use detector::{Cell, ConflictPair, ConflictReport, REPORT_HEADER, detect};
