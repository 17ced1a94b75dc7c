//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Text extraction system prompt
pub const EXTRACT: &str = include_str!("../../prompts/extract.pmt");

/// Image extraction system prompt
pub const EXTRACT_IMAGE: &str = include_str!("../../prompts/extract-image.pmt");

/// User message wrapping free-text input
pub const USER_TEXT: &str = include_str!("../../prompts/user-text.pmt");

/// Feedback prompt for a rejected attempt
pub const CORRECTION: &str = include_str!("../../prompts/correction.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "extract" => Some(EXTRACT),
        "extract-image" => Some(EXTRACT_IMAGE),
        "user-text" => Some(USER_TEXT),
        "correction" => Some(CORRECTION),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
