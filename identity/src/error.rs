use thiserror::Error;

/// Stable error kinds surfaced at the HTTP boundary (spec §7).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("user is not active")]
    UserInactive,
    #[error("invalid password")]
    InvalidPassword,
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already in use")]
    EmailTaken,
    #[error("credential does not meet minimum requirements: {reason}")]
    WeakCredential { reason: &'static str },
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("token error: {0}")]
    Token(String),
    #[error(transparent)]
    Store(#[from] chunking_store::StoreError),
}
