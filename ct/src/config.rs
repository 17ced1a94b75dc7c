//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Extraction pipeline settings
    pub pipeline: PipelineConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set. Call this before
    /// any command that talks to the model.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.pipeline.max_images == 0 {
            return Err(eyre::eyre!("pipeline.max-images must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: coursetable.yml
        let local_config = PathBuf::from("coursetable.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/coursetable/coursetable.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("coursetable").join("coursetable.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "dashscope", both OpenAI-compatible)
    pub provider: String,

    /// Model used for text extraction
    pub model: String,

    /// Model used for image extraction
    #[serde(rename = "vision-model")]
    pub vision_model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL (the client appends `/v1/chat/completions`)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Request a JSON object response for text extraction
    #[serde(rename = "json-mode")]
    pub json_mode: bool,

    /// Retries for transient HTTP failures inside the client
    #[serde(rename = "transport-retries")]
    pub transport_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "qwen3-coder-plus".to_string(),
            vision_model: "qwen-vl-max".to_string(),
            api_key_env: "DASHSCOPE_API_KEY".to_string(),
            base_url: "https://dashscope.aliyuncs.com/compatible-mode".to_string(),
            max_tokens: 8192,
            timeout_ms: 180_000,
            json_mode: true,
            transport_retries: 2,
        }
    }
}

/// Extraction pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Correction attempts after the first one
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Accept free-text input
    #[serde(rename = "text-enabled")]
    pub text_enabled: bool,

    /// Accept image input
    #[serde(rename = "image-enabled")]
    pub image_enabled: bool,

    /// Maximum images per request
    #[serde(rename = "max-images")]
    pub max_images: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            text_enabled: true,
            image_enabled: true,
            max_images: 9,
        }
    }
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory searched for `{name}.pmt` before the embedded templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}
