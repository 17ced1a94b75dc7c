//! Timetable import pipeline
//!
//! Turns free text or timetable screenshots into a conflict-free course list:
//! extraction prompt, model call, decode, conflict check, correction, and the
//! final [`PipelineResult`].

pub mod decode;
mod orchestrator;
mod result;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

pub use decode::{DecodeError, decode_courses, strip_fence};
pub use orchestrator::{
    AttemptOutcome, AttemptRecord, DEFAULT_MAX_RETRIES, RetryOrchestrator, Run, TRUNCATED_NOTE, Terminal,
    UNPARSEABLE_REPORT,
};
pub use result::{CORRECTION_FAILED, ErrorBody, PipelineError, PipelineResult, aggregate};

use crate::config::{Config, LlmConfig, PipelineConfig};
use crate::llm::{CompletionRequest, ContentBlock, LlmClient, Message};
use crate::prompts::PromptLoader;

/// Text sent alongside the images of an image import
const IMAGE_INSTRUCTION: &str = "请解析这些课程表图片中的全部课程。";

#[derive(Serialize)]
struct UserTextContext<'a> {
    user_input: &'a str,
}

/// Entry point for text and image imports
pub struct Pipeline {
    llm_config: LlmConfig,
    config: PipelineConfig,
    prompts: Arc<PromptLoader>,
    orchestrator: RetryOrchestrator,
}

impl Pipeline {
    pub fn new(llm: Arc<dyn LlmClient>, config: &Config) -> Self {
        debug!("Pipeline::new: called");
        let prompts = Arc::new(PromptLoader::new(config.prompts.dir.as_deref()));
        Self::with_prompts(llm, config, prompts)
    }

    pub fn with_prompts(llm: Arc<dyn LlmClient>, config: &Config, prompts: Arc<PromptLoader>) -> Self {
        let orchestrator = RetryOrchestrator::new(llm, prompts.clone()).with_max_retries(config.pipeline.max_retries);
        Self {
            llm_config: config.llm.clone(),
            config: config.pipeline.clone(),
            prompts,
            orchestrator,
        }
    }

    /// Import courses from free text
    pub async fn run_text(&self, user_input: &str) -> Result<PipelineResult, PipelineError> {
        debug!(input_len = user_input.len(), "Pipeline::run_text: called");
        if !self.config.text_enabled {
            return Err(PipelineError::Disabled("text"));
        }
        if user_input.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let system_prompt = self.prompts.load_template("extract").map_err(PipelineError::Prompt)?;
        let user_message = self
            .prompts
            .render("user-text", &UserTextContext { user_input })
            .map_err(PipelineError::Prompt)?;

        let mut request = CompletionRequest::new(system_prompt, Message::user(user_message), self.llm_config.max_tokens);
        request.json_mode = self.llm_config.json_mode;

        self.execute("text", request).await
    }

    /// Import courses from base64 images or data URLs
    ///
    /// Empty entries are ignored before the count is checked.
    pub async fn run_image(&self, images: &[String]) -> Result<PipelineResult, PipelineError> {
        debug!(image_count = images.len(), "Pipeline::run_image: called");
        if !self.config.image_enabled {
            return Err(PipelineError::Disabled("image"));
        }
        let images: Vec<&str> = images.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
        if images.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if images.len() > self.config.max_images {
            return Err(PipelineError::TooManyImages {
                given: images.len(),
                max: self.config.max_images,
            });
        }

        let system_prompt = self
            .prompts
            .load_template("extract-image")
            .map_err(PipelineError::Prompt)?;
        let mut blocks = vec![ContentBlock::text(IMAGE_INSTRUCTION)];
        blocks.extend(images.into_iter().map(|image| ContentBlock::image(image)));

        let mut request =
            CompletionRequest::new(system_prompt, Message::user_blocks(blocks), self.llm_config.max_tokens);
        request.model = Some(self.llm_config.vision_model.clone());

        self.execute("image", request).await
    }

    async fn execute(&self, kind: &str, request: CompletionRequest) -> Result<PipelineResult, PipelineError> {
        let run_id = Uuid::now_v7().to_string();
        info!("Starting {} import run {}", kind, run_id);

        let run = self.orchestrator.run(&run_id, request).await?;
        let result = aggregate(run.terminal);

        info!(
            "Run {} finished: success={} courses={} attempts={}",
            run_id,
            result.success,
            result.courses.len(),
            run.history.len()
        );
        Ok(result)
    }
}
