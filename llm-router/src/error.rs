use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("backend '{0}' is not configured")]
    BackendNotConfigured(String),
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("rate limited after exhausting retries")]
    RateLimited,
    #[error("rate limited: {hint:?}")]
    TooManyRequests { hint: Option<String> },
    #[error("server error ({status}): {body}")]
    ServerError { status: u16, body: String },
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("input too large: {reason}")]
    TooLarge { reason: String },
}
