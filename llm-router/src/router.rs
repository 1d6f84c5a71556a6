//! Dispatches chat requests to a named backend, retrying rate limits and
//! transient server errors per spec §4.6, and capping in-flight calls at
//! `max_workers` (spec §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::backend::LlmBackend;
use crate::error::LlmError;
use crate::types::{ChatRequest, ChatResponse};

const MAX_RATE_LIMIT_RETRIES: u32 = 5;
const MAX_SERVER_ERROR_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_FACTOR: u64 = 2;
const BACKOFF_JITTER: f64 = 0.20;

pub struct LlmRouter {
    backends: HashMap<String, Arc<dyn LlmBackend>>,
    default_backend: String,
    concurrency: Arc<Semaphore>,
}

impl LlmRouter {
    pub fn new(default_backend: impl Into<String>, max_workers: usize) -> Self {
        Self {
            backends: HashMap::new(),
            default_backend: default_backend.into(),
            concurrency: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn LlmBackend>) {
        self.backends.insert(name.into(), backend);
    }

    pub async fn chat(&self, backend_name: Option<&str>, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let name = backend_name.unwrap_or(&self.default_backend);
        let backend = self.backends.get(name).cloned().ok_or_else(|| LlmError::BackendNotConfigured(name.to_string()))?;

        let _permit = self.concurrency.acquire().await.expect("semaphore never closed");
        dispatch_with_retry(backend.as_ref(), &request).await
    }
}

async fn dispatch_with_retry(backend: &dyn LlmBackend, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
    let mut rate_limit_attempts = 0u32;
    let mut server_error_attempts = 0u32;

    loop {
        match backend.chat(request).await {
            Ok(response) => return Ok(response),
            Err(LlmError::TooManyRequests { hint }) => {
                rate_limit_attempts += 1;
                if rate_limit_attempts > MAX_RATE_LIMIT_RETRIES {
                    return Err(LlmError::RateLimited);
                }
                let wait = hint.as_deref().and_then(parse_retry_hint).unwrap_or(Duration::from_secs(1));
                warn!(attempt = rate_limit_attempts, ?wait, "rate limited, backing off");
                tokio::time::sleep(wait).await;
            }
            Err(LlmError::ServerError { status, body }) => {
                server_error_attempts += 1;
                if server_error_attempts > MAX_SERVER_ERROR_RETRIES {
                    return Err(LlmError::ServerError { status, body });
                }
                let wait = exponential_backoff(server_error_attempts);
                debug!(attempt = server_error_attempts, ?wait, status, "server error, retrying");
                tokio::time::sleep(wait).await;
            }
            Err(other) => return Err(other),
        }
    }
}

fn exponential_backoff(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS * BACKOFF_FACTOR.pow(attempt.saturating_sub(1));
    let jitter_span = (base as f64 * BACKOFF_JITTER) as i64;
    let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
    Duration::from_millis((base as i64 + jitter).max(0) as u64)
}

/// Parses a rate-limit hint of the shape `"Please try again in 1m2.5s"`
/// into a sleep duration, adding a 500ms safety margin.
fn parse_retry_hint(hint: &str) -> Option<Duration> {
    let marker = "try again in";
    let idx = hint.find(marker)?;
    let rest = hint[idx + marker.len()..].trim_start();

    let mut minutes = 0f64;
    let mut seconds = 0f64;
    let mut number = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
        } else if ch == 'm' {
            minutes = number.parse().unwrap_or(0.0);
            number.clear();
        } else if ch == 's' {
            seconds = number.parse().unwrap_or(0.0);
            number.clear();
            break;
        } else if !number.is_empty() {
            break;
        }
    }
    if minutes == 0.0 && seconds == 0.0 {
        return None;
    }
    let total = minutes * 60.0 + seconds + 0.5;
    Some(Duration::from_secs_f64(total.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_and_seconds_hint() {
        let d = parse_retry_hint("Please try again in 1m2.5s").unwrap();
        assert!((d.as_secs_f64() - 63.0).abs() < 1e-6);
    }

    #[test]
    fn parses_seconds_only_hint() {
        let d = parse_retry_hint("Please try again in 3.2s").unwrap();
        assert!((d.as_secs_f64() - 3.7).abs() < 1e-6);
    }

    #[test]
    fn unrecognized_hint_returns_none() {
        assert!(parse_retry_hint("no hint here").is_none());
    }
}
