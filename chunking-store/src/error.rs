use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("lexical index error: {0}")]
    Lexical(String),
    #[error("collection name invalid: {0}")]
    CollectionName(#[from] chunk_model::CollectionNameError),
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("collection already exists: {0}")]
    AlreadyExists(String),
}
