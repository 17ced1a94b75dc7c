//! coursetable - timetable import with self-correcting extraction
//!
//! Free text or timetable screenshots go to an LLM that extracts a structured
//! course list. The list is checked for calendar conflicts, and conflicting
//! answers are sent back to the model with a correction prompt until the
//! result is clean or the retry budget runs out.
//!
//! # Modules
//!
//! - [`domain`] - Course model and week-set parsing
//! - [`conflict`] - Calendar conflict detection
//! - [`llm`] - LLM client trait and OpenAI-compatible implementation
//! - [`prompts`] - Prompt templates and the correction prompt builder
//! - [`pipeline`] - Retry orchestration and result aggregation
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod conflict;
pub mod domain;
pub mod llm;
pub mod pipeline;
pub mod prompts;

// Re-export commonly used types
pub use config::{Config, LlmConfig, PipelineConfig};
pub use conflict::{ConflictReport, detect};
pub use domain::{Course, ScheduleEntry, TimeSlot, WeekSet};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use pipeline::{Pipeline, PipelineError, PipelineResult, RetryOrchestrator};
pub use prompts::{PromptLoader, build_correction_prompt};
