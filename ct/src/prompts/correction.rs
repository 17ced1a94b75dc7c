//! Correction prompt construction
//!
//! After a rejected attempt the model gets its original instructions back,
//! together with what it produced and what was wrong with it.

use eyre::Result;
use serde::Serialize;
use tracing::debug;

use super::PromptLoader;
use crate::domain::Course;

/// Stands in for the course dump when the previous answer could not be decoded
pub const UNPARSEABLE_SENTINEL: &str = "（上一次的输出无法解析为课程 JSON，没有可用的课程数据）";

#[derive(Debug, Serialize)]
struct CorrectionContext<'a> {
    original_prompt: &'a str,
    attempt: u32,
    previous_attempt: String,
    conflict_report: &'a str,
}

/// Build the prompt for the next attempt
///
/// `last_courses` is `None` when the previous answer did not decode. `attempt`
/// is the 1-based number of the attempt being corrected. Inputs are only read.
pub fn build_correction_prompt(
    loader: &PromptLoader,
    original_prompt: &str,
    attempt: u32,
    last_courses: Option<&[Course]>,
    conflict_report: &str,
) -> Result<String> {
    debug!(
        attempt,
        has_courses = last_courses.is_some(),
        report_len = conflict_report.len(),
        "build_correction_prompt: called"
    );
    let previous_attempt = match last_courses {
        Some(courses) => serde_json::to_string_pretty(courses)?,
        None => UNPARSEABLE_SENTINEL.to_string(),
    };

    loader.render(
        "correction",
        &CorrectionContext {
            original_prompt,
            attempt,
            previous_attempt,
            conflict_report,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScheduleEntry, TimeSlot};

    fn courses() -> Vec<Course> {
        vec![
            Course::new("高等数学").with_schedule(ScheduleEntry::new("1-16", 1, TimeSlot::new(1, 2).unwrap())),
            Course::new("大学英语").with_schedule(ScheduleEntry::new("1-16", 1, TimeSlot::new(2, 3).unwrap())),
        ]
    }

    #[test]
    fn test_prompt_embeds_all_parts() {
        let loader = PromptLoader::embedded_only();
        let report = "检测到以下课程存在时间冲突：\n- 课程 '大学英语' 与 '高等数学' 存在时间重叠。";
        let prompt = build_correction_prompt(&loader, "ORIGINAL INSTRUCTIONS", 1, Some(courses().as_slice()), report).unwrap();

        assert!(prompt.starts_with("ORIGINAL INSTRUCTIONS"));
        assert!(prompt.contains("\"name\": \"高等数学\""));
        assert!(prompt.contains("\"time_slot\": \"2-3\""));
        assert!(prompt.contains(report));
        assert!(prompt.contains("第 1 次"));
    }

    #[test]
    fn test_prompt_for_unparseable_attempt() {
        let loader = PromptLoader::embedded_only();
        let prompt = build_correction_prompt(&loader, "ORIGINAL", 2, None, "上一次的输出无法解析").unwrap();

        assert!(prompt.contains(UNPARSEABLE_SENTINEL));
        assert!(prompt.contains("上一次的输出无法解析"));
        assert!(!prompt.contains("\"schedules\""));
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let loader = PromptLoader::embedded_only();
        let before = courses();
        let input = before.clone();
        let _ = build_correction_prompt(&loader, "ORIGINAL", 1, Some(input.as_slice()), "report").unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let loader = PromptLoader::embedded_only();
        let a = build_correction_prompt(&loader, "P", 1, Some(courses().as_slice()), "r").unwrap();
        let b = build_correction_prompt(&loader, "P", 1, Some(courses().as_slice()), "r").unwrap();
        assert_eq!(a, b);
    }
}
