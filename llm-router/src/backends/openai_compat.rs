//! Local OpenAI-compatible backend (e.g. an `llama.cpp`/vLLM server exposing
//! `/v1/chat/completions`). Mirrors `OllamaBackend`'s shape but speaks the
//! OpenAI wire format instead of Ollama's.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use super::ollama::map_status_to_error;
use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, Message};

pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompatBackend {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), timeout: Duration::from_secs(timeout_secs) }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Response {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Usage {
    completion_tokens: Option<u32>,
}

#[async_trait]
impl LlmBackend for OpenAiCompatBackend {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = Request {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(%url, "dispatching openai-compatible chat request");

        let response = timeout(self.timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_status_to_error(status, body_text));
        }

        let parsed: Response = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| LlmError::InvalidResponse("no choices returned".into()))?;
        Ok(ChatResponse {
            text: choice.message.content,
            model: parsed.model,
            tokens_used: parsed.usage.and_then(|u| u.completion_tokens),
        })
    }
}
