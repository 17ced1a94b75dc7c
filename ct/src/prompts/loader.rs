//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Override directory searched before the embedded templates
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `dir` for `{name}.pmt` first
    pub fn new(dir: Option<&Path>) -> Self {
        debug!(?dir, "PromptLoader::new: called");
        let override_dir = dir.filter(|d| d.is_dir()).map(Path::to_path_buf);
        if dir.is_some() && override_dir.is_none() {
            debug!("PromptLoader::new: override directory missing, using embedded prompts");
        }

        Self {
            hbs: engine(),
            override_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: engine(),
            override_dir: None,
        }
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. Override: `{dir}/{name}.pmt`
    /// 2. Embedded fallback
    pub fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
            debug!(?path, "PromptLoader::load_template: not found in override directory");
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}

/// Prompts are plain text, so values are inserted verbatim
fn engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_does_not_escape() {
        let loader = PromptLoader::embedded_only();
        let rendered = loader
            .render("user-text", &json!({ "user_input": "<高等数学> & \"线代\"" }))
            .unwrap();
        assert!(rendered.contains("<高等数学> & \"线代\""));
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.load_template("nonexistent-template").is_err());
    }

    #[test]
    fn test_override_directory_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("extract.pmt"), "自定义提示 {{school}}").unwrap();

        let loader = PromptLoader::new(Some(dir.path()));
        let rendered = loader.render("extract", &json!({ "school": "理工大学" })).unwrap();
        assert_eq!(rendered, "自定义提示 理工大学");

        // Templates missing from the directory still fall back to embedded
        assert!(loader.load_template("correction").unwrap().contains("{{conflict_report}}"));
    }

    #[test]
    fn test_missing_override_directory_falls_back() {
        let loader = PromptLoader::new(Some(Path::new("/nonexistent/prompts")));
        assert!(loader.load_template("extract").is_ok());
    }

    #[test]
    fn test_malformed_override_fails_to_render() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("correction.pmt"), "{{#if}}broken").unwrap();

        let loader = PromptLoader::new(Some(dir.path()));
        assert!(loader.render("correction", &json!({})).is_err());
    }
}
