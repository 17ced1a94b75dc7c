//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files used for timetable
//! extraction and correction.
//!
//! Template loading chain:
//! 1. `{prompts.dir}/{name}.pmt` (configured override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution; values are
//! inserted without HTML escaping.

mod correction;
pub mod embedded;
mod loader;

pub use correction::{UNPARSEABLE_SENTINEL, build_correction_prompt};
pub use loader::PromptLoader;
