//! Local model host backend (Ollama), grounded on the teacher's
//! `OllamaClient` in `the_agency`: same `/api/chat` shape, same
//! timeout-wrapped `reqwest::Client`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error};

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse, Message};

pub struct OllamaBackend {
    client: reqwest::Client,
    host: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(host: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: host.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.host.trim_end_matches('/'), endpoint)
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: Message,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions { num_predict: request.max_tokens, temperature: request.temperature },
        };

        let url = self.url("chat");
        debug!(%url, "dispatching ollama chat request");
        let response = timeout(self.timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            error!(%status, "ollama backend returned an error");
            return Err(map_status_to_error(status, body_text));
        }

        let parsed: OllamaChatResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(ChatResponse { text: parsed.message.content, model: parsed.model, tokens_used: parsed.eval_count })
    }
}

pub(crate) fn map_status_to_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status.as_u16() == 429 {
        LlmError::TooManyRequests { hint: Some(body) }
    } else if status.is_server_error() {
        LlmError::ServerError { status: status.as_u16(), body }
    } else {
        LlmError::GenerationFailed(format!("{status}: {body}"))
    }
}
