//! Model output decoding
//!
//! Models answer in a few shapes: a bare JSON list of courses, an object
//! carrying the list under `courses`, and either of those inside a markdown
//! code fence. Everything is normalized to `Vec<Course>` here, before any
//! conflict logic runs.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::Course;

/// Object field that wraps the course list
pub const WRAPPER_FIELD: &str = "courses";

const FENCE: &str = "```";

/// Why a model answer could not be turned into courses
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response was empty")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("response JSON has an unexpected shape: {0}")]
    UnexpectedShape(String),

    #[error("course list does not match the course schema: {0}")]
    InvalidCourse(#[source] serde_json::Error),
}

/// Recognized top-level shapes of a decoded answer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    RawList(Vec<Value>),
    WrapperObject { courses: Vec<Value> },
}

/// Strip a surrounding markdown code fence, if any
///
/// Text before the opening fence and after the closing fence is discarded,
/// as is the language tag on the opening fence line.
pub fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };
    debug!("strip_fence: found code fence");

    let after_open = &trimmed[open + FENCE.len()..];
    // Drop the language tag line (```json)
    let body = match after_open.find('\n') {
        Some(nl) if !after_open[..nl].trim_start().starts_with(['[', '{']) => &after_open[nl + 1..],
        _ => after_open,
    };
    let body = match body.rfind(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

/// Decode a raw model answer into courses
pub fn decode_courses(raw: &str) -> Result<Vec<Course>, DecodeError> {
    debug!(raw_len = raw.len(), "decode_courses: called");
    let text = strip_fence(raw);
    if text.is_empty() {
        debug!("decode_courses: empty after fence stripping");
        return Err(DecodeError::Empty);
    }

    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;
    let items = match value {
        Value::Array(_) | Value::Object(_) => match Envelope::deserialize(&value) {
            Ok(Envelope::RawList(items)) => {
                debug!(count = items.len(), "decode_courses: bare list");
                items
            }
            Ok(Envelope::WrapperObject { courses }) => {
                debug!(count = courses.len(), "decode_courses: wrapper object");
                courses
            }
            Err(_) => return Err(DecodeError::UnexpectedShape(describe(&value))),
        },
        other => return Err(DecodeError::UnexpectedShape(describe(&other))),
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value::<Course>(item).map_err(DecodeError::InvalidCourse))
        .collect()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object without a '{}' list (keys: {})", WRAPPER_FIELD, keys.join(", "))
        }
        Value::Array(_) => "array".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = r#"[{"code": "CS101", "name": "计算机科学导论", "teachers": ["张三"],
        "schedules": [{"weeks": "1-16", "day": "3", "time_slot": "3-4"}]}]"#;

    #[test]
    fn test_bare_list() {
        let courses = decode_courses(LIST).unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "计算机科学导论");
    }

    #[test]
    fn test_wrapper_object() {
        let raw = format!(r#"{{"courses": {}}}"#, LIST);
        let courses = decode_courses(&raw).unwrap();
        assert_eq!(courses[0].code, "CS101");
    }

    #[test]
    fn test_fenced_with_language_tag() {
        let raw = format!("```json\n{}\n```", LIST);
        assert_eq!(decode_courses(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_fenced_with_surrounding_prose() {
        let raw = format!("下面是解析结果：\n```\n{{\"courses\": {}}}\n```\n如有问题请告知。", LIST);
        assert_eq!(decode_courses(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_fence_on_same_line() {
        let raw = format!("```{}```", LIST);
        assert_eq!(decode_courses(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_unclosed_fence() {
        let raw = format!("```json\n{}", LIST);
        assert_eq!(decode_courses(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_list_is_valid() {
        assert!(decode_courses("[]").unwrap().is_empty());
        assert!(decode_courses(r#"{"courses": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(decode_courses("   "), Err(DecodeError::Empty)));
        assert!(matches!(decode_courses("```json\n```"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(decode_courses("抱歉，我无法解析"), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_unexpected_shapes() {
        let err = decode_courses(r#"{"data": []}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedShape(_)));
        assert!(err.to_string().contains("data"));

        assert!(matches!(decode_courses("42"), Err(DecodeError::UnexpectedShape(_))));
        assert!(matches!(decode_courses(r#"{"courses": "none"}"#), Err(DecodeError::UnexpectedShape(_))));
    }

    #[test]
    fn test_course_without_name() {
        let err = decode_courses(r#"[{"code": "X"}]"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidCourse(_)));
    }

    #[test]
    fn test_strip_fence_passthrough() {
        assert_eq!(strip_fence("  [1]  "), "[1]");
    }
}
