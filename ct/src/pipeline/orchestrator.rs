//! RetryOrchestrator - bounded self-correction loop
//!
//! Each attempt calls the model once, decodes the answer and checks it for
//! calendar conflicts. A rejected attempt (undecodable or conflicting) turns
//! into a correction prompt for the next attempt until the retry budget is
//! spent. Attempts run strictly one after another because every correction
//! prompt depends on the previous report.
//!
//! Transport failures from the model client are not retried here; they abort
//! the invocation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::decode::decode_courses;
use super::result::PipelineError;
use crate::conflict;
use crate::domain::Course;
use crate::llm::{CompletionRequest, LlmClient, StopReason};
use crate::prompts::{PromptLoader, build_correction_prompt};

/// Correction attempts after the first one
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Prefix of the synthetic report for an undecodable answer
pub const UNPARSEABLE_REPORT: &str = "上一次的输出无法解析为课程数据";

/// Added to the report when the answer stopped at the token limit
pub const TRUNCATED_NOTE: &str =
    "输出达到长度上限被截断。请输出紧凑的 JSON：不要缩进和换行，省略值为空的字段，相同安排的周次合并书写";

/// What one attempt produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The answer decoded into courses
    Decoded(Vec<Course>),
    /// The answer could not be decoded
    Unparseable { reason: String },
}

impl AttemptOutcome {
    pub fn courses(&self) -> Option<&[Course]> {
        match self {
            AttemptOutcome::Decoded(courses) => Some(courses),
            AttemptOutcome::Unparseable { .. } => None,
        }
    }
}

/// One attempt and the report computed against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 0-based attempt index
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Conflict or parse-failure report; empty when the attempt was accepted
    pub report: String,
}

impl AttemptRecord {
    pub fn accepted(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Decoded(_)) && self.report.is_empty()
    }
}

/// Terminal state of the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Succeeded {
        courses: Vec<Course>,
        attempts: u32,
    },
    Failed {
        /// Courses of the most recent attempt that decoded
        courses: Vec<Course>,
        /// Report of the final attempt
        report: String,
        attempts: u32,
    },
}

#[derive(Debug)]
enum State {
    Attempting { attempt: u32, prompt: String },
    Done(Terminal),
}

/// A finished run: terminal state plus every attempt made
#[derive(Debug, Clone)]
pub struct Run {
    pub terminal: Terminal,
    pub history: Vec<AttemptRecord>,
}

/// Drives the extract, check, correct loop against an LLM client
pub struct RetryOrchestrator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_retries: u32,
}

impl RetryOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        debug!("RetryOrchestrator::new: called");
        Self {
            llm,
            prompts,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run the loop to a terminal state
    ///
    /// `base` carries the original prompt as its system prompt and the user's
    /// input as its messages. Every attempt resends the same messages; only
    /// the system prompt changes between attempts.
    pub async fn run(&self, run_id: &str, base: CompletionRequest) -> Result<Run, PipelineError> {
        debug!(%run_id, max_retries = self.max_retries, "RetryOrchestrator::run: called");
        let original_prompt = base.system_prompt.clone();
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut last_courses: Option<Vec<Course>> = None;
        let mut state = State::Attempting {
            attempt: 0,
            prompt: original_prompt.clone(),
        };

        loop {
            state = match state {
                State::Done(terminal) => {
                    debug!(%run_id, attempts = history.len(), "RetryOrchestrator::run: finished");
                    return Ok(Run { terminal, history });
                }
                State::Attempting { attempt, prompt } => {
                    info!(
                        "Run {} attempt {}/{}",
                        run_id,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    let mut request = base.clone();
                    request.system_prompt = prompt;

                    let response = self.llm.complete(request).await.inspect_err(|e| {
                        warn!(%run_id, attempt, error = %e, "RetryOrchestrator::run: model call failed");
                    })?;
                    let truncated = response.stop_reason == StopReason::MaxTokens;
                    if truncated {
                        warn!(
                            %run_id,
                            attempt,
                            input_tokens = response.usage.input_tokens,
                            output_tokens = response.usage.output_tokens,
                            "RetryOrchestrator::run: answer hit the token limit"
                        );
                    }
                    let raw = response.content.unwrap_or_default();
                    let record = evaluate(attempt, &raw, truncated);

                    if let AttemptOutcome::Decoded(courses) = &record.outcome {
                        last_courses = Some(courses.clone());
                    }

                    let next = if record.accepted() {
                        debug!(%run_id, attempt, "RetryOrchestrator::run: attempt accepted");
                        State::Done(Terminal::Succeeded {
                            courses: last_courses.take().unwrap_or_default(),
                            attempts: attempt + 1,
                        })
                    } else if attempt < self.max_retries {
                        debug!(%run_id, attempt, "RetryOrchestrator::run: attempt rejected, building correction");
                        let prompt = build_correction_prompt(
                            &self.prompts,
                            &original_prompt,
                            attempt + 1,
                            record.outcome.courses(),
                            &record.report,
                        )
                        .map_err(PipelineError::Prompt)?;
                        State::Attempting {
                            attempt: attempt + 1,
                            prompt,
                        }
                    } else {
                        warn!(%run_id, attempts = attempt + 1, "RetryOrchestrator::run: retry budget exhausted");
                        State::Done(Terminal::Failed {
                            courses: last_courses.take().unwrap_or_default(),
                            report: record.report.clone(),
                            attempts: attempt + 1,
                        })
                    };

                    history.push(record);
                    next
                }
            };
        }
    }
}

/// Decode and check one answer
fn evaluate(attempt: u32, raw: &str, truncated: bool) -> AttemptRecord {
    debug!(attempt, raw_len = raw.len(), truncated, "evaluate: called");
    match decode_courses(raw) {
        Ok(courses) => {
            let report = conflict::detect(&courses);
            if report.has_conflict() {
                info!("Attempt {} has {} conflicting course pair(s)", attempt + 1, report.len());
            }
            AttemptRecord {
                attempt,
                report: report.render(),
                outcome: AttemptOutcome::Decoded(courses),
            }
        }
        Err(e) => {
            warn!(attempt, error = %e, "evaluate: undecodable answer");
            AttemptRecord {
                attempt,
                report: if truncated {
                    format!("{}：{}。{}", UNPARSEABLE_REPORT, TRUNCATED_NOTE, e)
                } else {
                    format!("{}：{}", UNPARSEABLE_REPORT, e)
                },
                outcome: AttemptOutcome::Unparseable { reason: e.to_string() },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{CompletionResponse, Message, TokenUsage};
    use crate::prompts::UNPARSEABLE_SENTINEL;

    const CLEAN: &str = r#"[
        {"name": "高等数学", "schedules": [{"weeks": "1-16", "day": "1", "time_slot": "1-2"}]},
        {"name": "大学英语", "schedules": [{"weeks": "1-16", "day": "1", "time_slot": "3-4"}]}
    ]"#;

    const CONFLICTING: &str = r#"[
        {"name": "高等数学", "schedules": [{"weeks": "1-16", "day": "1", "time_slot": "1-2"}]},
        {"name": "大学英语", "schedules": [{"weeks": "1-16", "day": "1", "time_slot": "2-3"}]}
    ]"#;

    const CONFLICTING_AGAIN: &str = r#"{"courses": [
        {"name": "高等数学", "schedules": [{"weeks": "3", "day": "2", "time_slot": "1-2"}]},
        {"name": "线性代数", "schedules": [{"weeks": "3", "day": "2", "time_slot": "1-2"}]}
    ]}"#;

    fn orchestrator(client: &Arc<MockLlmClient>) -> RetryOrchestrator {
        RetryOrchestrator::new(client.clone(), Arc::new(PromptLoader::embedded_only())).with_max_retries(2)
    }

    fn base() -> CompletionRequest {
        CompletionRequest::new("ORIGINAL PROMPT", Message::user("课程数据"), 4096)
    }

    #[tokio::test]
    async fn test_clean_first_attempt() {
        let client = Arc::new(MockLlmClient::new(vec![CLEAN]));
        let run = orchestrator(&client).run("t", base()).await.unwrap();

        match run.terminal {
            Terminal::Succeeded { courses, attempts } => {
                assert_eq!(courses.len(), 2);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(client.call_count(), 1);
        assert_eq!(run.history.len(), 1);
        assert!(run.history[0].accepted());
    }

    #[tokio::test]
    async fn test_converges_on_last_attempt() {
        let client = Arc::new(MockLlmClient::new(vec![CONFLICTING, CONFLICTING_AGAIN, CLEAN]));
        let run = orchestrator(&client).run("t", base()).await.unwrap();

        match run.terminal {
            Terminal::Succeeded { courses, attempts } => {
                assert_eq!(attempts, 3);
                assert_eq!(courses[1].schedules[0].time_slot, "3-4");
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let client = Arc::new(MockLlmClient::new(vec![CONFLICTING, CONFLICTING, CONFLICTING_AGAIN]));
        let run = orchestrator(&client).run("t", base()).await.unwrap();

        match run.terminal {
            Terminal::Failed {
                courses,
                report,
                attempts,
            } => {
                assert_eq!(attempts, 3);
                // Courses come from the final attempt
                assert!(courses.iter().any(|c| c.name == "线性代数"));
                assert!(report.contains("'线性代数' 与 '高等数学'"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(client.call_count(), 3);
        assert!(run.history.iter().all(|r| !r.accepted()));
    }

    #[tokio::test]
    async fn test_decode_failure_then_clean() {
        let client = Arc::new(MockLlmClient::new(vec!["抱歉，我无法完成", CLEAN]));
        let run = orchestrator(&client).run("t", base()).await.unwrap();

        assert!(matches!(run.terminal, Terminal::Succeeded { attempts: 2, .. }));
        assert!(matches!(run.history[0].outcome, AttemptOutcome::Unparseable { .. }));
        assert!(run.history[0].report.starts_with(UNPARSEABLE_REPORT));

        let requests = client.requests();
        let second = &requests[1];
        assert!(second.system_prompt.contains(UNPARSEABLE_SENTINEL));
        assert!(second.system_prompt.contains(UNPARSEABLE_REPORT));
    }

    #[tokio::test]
    async fn test_decode_failure_on_last_attempt_keeps_earlier_courses() {
        let client = Arc::new(MockLlmClient::new(vec![CONFLICTING, "not json", "still not json"]));
        let run = orchestrator(&client).run("t", base()).await.unwrap();

        match run.terminal {
            Terminal::Failed { courses, report, .. } => {
                assert_eq!(courses.len(), 2);
                assert!(report.starts_with(UNPARSEABLE_REPORT));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_correction_prompt_carries_report_and_input() {
        let client = Arc::new(MockLlmClient::new(vec![CONFLICTING, CLEAN]));
        orchestrator(&client).run("t", base()).await.unwrap();

        let requests = client.requests();
        assert_eq!(requests[0].system_prompt, "ORIGINAL PROMPT");
        let correction = &requests[1].system_prompt;
        assert!(correction.starts_with("ORIGINAL PROMPT"));
        assert!(correction.contains("- 课程 '大学英语' 与 '高等数学' 存在时间重叠。"));
        assert!(correction.contains("\"time_slot\": \"2-3\""));
        // The user's input is resent unchanged
        assert_eq!(requests[1].messages[0].content.as_text(), Some("课程数据"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let client = Arc::new(MockLlmClient::scripted(vec![
            Ok(CONFLICTING.to_string()),
            Err("gateway timeout".to_string()),
        ]));
        let result = orchestrator(&client).run("t", base()).await;

        assert!(matches!(result, Err(PipelineError::Llm(_))));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let client = Arc::new(MockLlmClient::new(vec![CONFLICTING]));
        let run = orchestrator(&client).with_max_retries(0).run("t", base()).await.unwrap();

        assert!(matches!(run.terminal, Terminal::Failed { attempts: 1, .. }));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_course_list_is_accepted() {
        let client = Arc::new(MockLlmClient::new(vec!["```json\n[]\n```"]));
        let run = orchestrator(&client).run("t", base()).await.unwrap();
        assert_eq!(
            run.terminal,
            Terminal::Succeeded {
                courses: vec![],
                attempts: 1
            }
        );
    }

    #[tokio::test]
    async fn test_truncated_answer_asks_for_compact_output() {
        let cut_off = CompletionResponse {
            content: Some(r#"{"courses": [{"name": "高等数学", "schedules": [{"weeks": "1-"#.to_string()),
            stop_reason: StopReason::MaxTokens,
            usage: TokenUsage {
                input_tokens: 900,
                output_tokens: 8192,
            },
        };
        let client = Arc::new(MockLlmClient::with_responses(vec![
            Ok(cut_off),
            Ok(CompletionResponse::text(CLEAN)),
        ]));
        let run = orchestrator(&client).run("t", base()).await.unwrap();

        assert!(matches!(run.terminal, Terminal::Succeeded { attempts: 2, .. }));
        let first = &run.history[0];
        assert!(matches!(first.outcome, AttemptOutcome::Unparseable { .. }));
        assert!(first.report.starts_with(UNPARSEABLE_REPORT));
        assert!(first.report.contains(TRUNCATED_NOTE));

        let requests = client.requests();
        assert!(requests[1].system_prompt.contains(TRUNCATED_NOTE));
    }

    #[test]
    fn test_untruncated_decode_failure_has_no_truncation_note() {
        let record = evaluate(0, "not json", false);
        assert!(record.report.starts_with(UNPARSEABLE_REPORT));
        assert!(!record.report.contains(TRUNCATED_NOTE));
    }

    #[test]
    fn test_evaluate_conflict_report() {
        let record = evaluate(0, CONFLICTING, false);
        assert!(!record.accepted());
        assert!(record.report.contains("存在时间重叠"));
        assert_eq!(record.outcome.courses().map(|c| c.len()), Some(2));
    }
}
