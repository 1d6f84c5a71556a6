use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse};

/// A uniform chat-completion backend (spec §4.6: Local OpenAI-compatible
/// backend, local model host backend, hosted chat API backend).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}
