//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
///
/// This is the only boundary the extraction pipeline has with the model.
/// Implementations may be nondeterministic; tests substitute a scripted
/// client to make retry scenarios reproducible.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full answer
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
