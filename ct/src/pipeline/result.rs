//! Pipeline outcomes and errors
//!
//! `PipelineResult` is the uniform wire shape handed back to callers. Hard
//! failures (bad input, disabled feature, model unreachable) are
//! `PipelineError`s instead, each with the HTTP status an outer layer should
//! answer with.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::orchestrator::Terminal;
use crate::domain::Course;
use crate::llm::LlmError;

/// Prefix of the message returned when the retry budget is exhausted
pub const CORRECTION_FAILED: &str = "AI自动修正失败";

/// Final outcome of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub courses: Vec<Course>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PipelineResult {
    pub fn succeeded(courses: Vec<Course>) -> Self {
        Self {
            success: true,
            courses,
            message: None,
        }
    }

    /// Best-effort courses plus the report explaining why they were rejected
    pub fn failed(courses: Vec<Course>, report: &str) -> Self {
        Self {
            success: false,
            courses,
            message: Some(format!("{}：\n{}", CORRECTION_FAILED, report)),
        }
    }
}

/// Wrap the orchestrator's terminal state into a result
pub fn aggregate(terminal: Terminal) -> PipelineResult {
    match terminal {
        Terminal::Succeeded { courses, attempts } => {
            debug!(attempts, course_count = courses.len(), "aggregate: succeeded");
            PipelineResult::succeeded(courses)
        }
        Terminal::Failed {
            courses,
            report,
            attempts,
        } => {
            debug!(attempts, course_count = courses.len(), "aggregate: failed");
            PipelineResult::failed(courses, &report)
        }
    }
}

/// Failures that abort a pipeline invocation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("用户输入为空")]
    EmptyInput,

    #[error("too many images: {given} given, at most {max} allowed")]
    TooManyImages { given: usize, max: usize },

    #[error("{0} import is disabled")]
    Disabled(&'static str),

    #[error("AI接口调用失败: {0}")]
    Llm(#[from] LlmError),

    #[error("prompt rendering failed: {0}")]
    Prompt(eyre::Report),
}

impl PipelineError {
    /// HTTP status an outer routing layer should respond with
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::EmptyInput | PipelineError::TooManyImages { .. } => 400,
            PipelineError::Disabled(_) => 403,
            PipelineError::Llm(_) | PipelineError::Prompt(_) => 500,
        }
    }

    /// Response body for this error
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            message: self.to_string(),
        }
    }
}

/// Body sent alongside a non-200 status
///
/// Carries no `courses` field, so clients can tell a hard failure apart from
/// a best-effort result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}
