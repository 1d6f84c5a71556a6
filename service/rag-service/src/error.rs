use thiserror::Error;

/// Orchestration-level error, the union of every component error this crate
/// wires together. `rag-server` maps this to the stable HTTP kinds in
/// spec §7.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] chunking_store::StoreError),
    #[error(transparent)]
    Auth(#[from] identity::AuthError),
    #[error(transparent)]
    Llm(#[from] llm_router::LlmError),
    #[error(transparent)]
    Extract(#[from] file_chunker::ExtractError),
    #[error(transparent)]
    Embed(#[from] embedding_provider::EmbedderError),
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("permission denied")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
}
