//! Maps component errors onto the stable HTTP kinds from spec §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use chunking_store::StoreError;
use identity::AuthError;
use llm_router::LlmError;
use rag_service::ServiceError;

#[derive(Debug)]
pub enum AppError {
    Unauthenticated,
    Forbidden,
    NotFound(String),
    Validation(String),
    Conflict(String),
    UnsupportedFormat(String),
    NoTextExtracted,
    DecodeError(String),
    TooLarge(String),
    RateLimited,
    BackendUnavailable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "authentication required".to_string(), None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "permission denied".to_string(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::UnsupportedFormat(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::NoTextExtracted => (StatusCode::BAD_REQUEST, "no text could be extracted from this file".to_string(), None),
            AppError::DecodeError(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::TooLarge(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate limited, try again later".to_string(), None),
            AppError::BackendUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };
        (status, Json(ErrorBody { message, error_code: code })).into_response()
    }
}

/// Distinct login error response shape from spec §6: `401 {message, error_code}`.
pub fn login_error_response(status: StatusCode, message: &str, error_code: &'static str) -> Response {
    (status, Json(json!({ "message": message, "error_code": error_code }))).into_response()
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => e.into(),
            ServiceError::Auth(e) => e.into(),
            ServiceError::Llm(e) => e.into(),
            ServiceError::Extract(e) => match e {
                file_chunker::ExtractError::UnsupportedType(t) => AppError::UnsupportedFormat(format!("unsupported file type: {t}")),
                file_chunker::ExtractError::Io { path, source } => AppError::Internal(format!("failed to read {path}: {source}")),
                file_chunker::ExtractError::Parse { format, message } => AppError::DecodeError(format!("failed to parse {format}: {message}")),
            },
            ServiceError::Embed(e) => AppError::Internal(e.to_string()),
            ServiceError::CollectionNotFound(name) => AppError::NotFound(format!("collection not found: {name}")),
            ServiceError::Forbidden => AppError::Forbidden,
            ServiceError::Validation(msg) => AppError::Validation(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CollectionName(e) => AppError::Validation(e.to_string()),
            StoreError::CollectionNotFound(name) => AppError::NotFound(format!("collection not found: {name}")),
            StoreError::AlreadyExists(name) => AppError::Conflict(format!("collection already exists: {name}")),
            StoreError::Db(_) | StoreError::Pool(_) | StoreError::Lexical(_) | StoreError::Metadata(_) => {
                AppError::BackendUnavailable(err.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserNotFound | AuthError::InvalidPassword | AuthError::UserInactive => AppError::Unauthenticated,
            AuthError::UsernameTaken | AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::WeakCredential { reason } => AppError::Validation(reason.to_string()),
            AuthError::SessionNotFound | AuthError::SessionExpired => AppError::Unauthenticated,
            AuthError::Hash(msg) | AuthError::Token(msg) => AppError::Internal(msg),
            AuthError::Store(e) => AppError::BackendUnavailable(e.to_string()),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited | LlmError::TooManyRequests { .. } => AppError::RateLimited,
            LlmError::BackendNotConfigured(name) => AppError::BackendUnavailable(format!("backend '{name}' is not configured")),
            LlmError::Timeout | LlmError::ConnectionFailed(_) | LlmError::ServerError { .. } => AppError::BackendUnavailable(err.to_string()),
            LlmError::TooLarge { reason } => AppError::TooLarge(reason),
            LlmError::GenerationFailed(msg) | LlmError::InvalidResponse(msg) => AppError::Internal(msg),
        }
    }
}
