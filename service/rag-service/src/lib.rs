//! Wires the persistence (C3), identity (C8/C9), ingestion (C4), retrieval
//! (C5), and LLM routing/summarization (C6/C7) crates into a single service
//! context that `rag-server`'s HTTP handlers (C10) drive.

pub mod config;
pub mod error;
pub mod ingestor;
pub mod retriever;
pub mod system_messages;

use std::sync::Arc;

use chunking_store::{ChunkRepo, LexicalIndex};
use embedding_provider::embedder::DeterministicEmbedder;
use embedding_provider::{config::ONNX_STDIO_DEFAULTS, pool::BoundedEmbedder, Embedder};
use identity::{AclStore, AuthService};
use llm_router::{backends::OllamaBackend, backends::OpenAiCompatBackend, backends::HostedBackend, LlmRouter, Summarizer};

pub use config::{AppConfig, ConfigError, DbBackend};
pub use error::ServiceError;
pub use ingestor::{IngestReport, Ingestor};
pub use retriever::{RetrievedPassage, Retriever, SourceFilter};
pub use system_messages::{SystemMessageError, SystemMessageStore, SystemMessageTemplate};

const BACKEND_TIMEOUT_SECS: u64 = 60;

/// Top-level service handle: one per process, shared behind an `Arc` by the
/// HTTP layer. Owns the connection pool, the lexical index, the embedder,
/// and the LLM router; `AclStore`/`AuthService`/`Ingestor`/`Retriever` are
/// cheap per-call views borrowed from here rather than stored fields, since
/// they all just wrap `&ChunkRepo` (see `identity`'s lifetime-parameterized
/// types).
pub struct AppContext {
    config: AppConfig,
    repo: ChunkRepo,
    lexical: LexicalIndex,
    embedder: Box<dyn Embedder>,
    router: Arc<LlmRouter>,
    summarizer: Summarizer,
    system_messages: SystemMessageStore,
}

impl AppContext {
    /// Builds the context with the dependency-free deterministic embedder
    /// (spec §4.2: used "when no ONNX model is configured"). Production
    /// deployments that have a real model on disk should use
    /// [`AppContext::with_embedder`] instead, passing an
    /// `embedding_provider::embedder::OnnxStdIoEmbedder`.
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let max_workers = config.max_workers;
        let embedder = DeterministicEmbedder::new(
            ONNX_STDIO_DEFAULTS.embedding_dimension,
            ONNX_STDIO_DEFAULTS.embedding_model_id,
            ONNX_STDIO_DEFAULTS.max_input_tokens,
        )?;
        Self::with_embedder(config, Box::new(BoundedEmbedder::new(embedder, max_workers)))
    }

    pub fn with_embedder(config: AppConfig, embedder: Box<dyn Embedder>) -> Result<Self, ServiceError> {
        let pool = chunking_store::init_pool(&config.db_path.to_string_lossy(), config.max_workers as u32)?;
        let repo = ChunkRepo::new(pool);
        let lexical = LexicalIndex::new_ram()?;
        let router = Arc::new(build_router(&config));
        let summarizer = Summarizer::new(router.clone(), config.default_llm_name.clone(), Some(config.default_llm_name.clone()));
        let system_messages = SystemMessageStore::new(config.system_messages_dir.clone());

        Ok(Self { config, repo, lexical, embedder, router, summarizer, system_messages })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn repo(&self) -> &ChunkRepo {
        &self.repo
    }

    pub fn router(&self) -> &Arc<LlmRouter> {
        &self.router
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    pub fn system_messages(&self) -> &SystemMessageStore {
        &self.system_messages
    }

    pub fn acl(&self) -> AclStore<'_> {
        AclStore::new(&self.repo)
    }

    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(&self.repo, self.config.jwt_secret_key.clone(), self.config.jwt_ttl_hours)
    }

    pub fn ingestor(&self) -> Ingestor<'_> {
        Ingestor::new(&self.repo, &self.lexical, self.embedder.as_ref(), self.config.chunk_size, self.config.chunk_overlap)
    }

    pub fn retriever(&self) -> Retriever<'_> {
        Retriever::new(&self.repo, &self.lexical, self.embedder.as_ref())
    }
}

/// Registers a backend per configured env var (spec §4.6/§6): an Ollama host,
/// a hosted bearer-token API (Groq-style), and/or a local OpenAI-compatible
/// server. None of these are required at startup — an unconfigured backend
/// simply isn't registered, and routing to it fails with
/// `LlmError::BackendNotConfigured`.
fn build_router(config: &AppConfig) -> LlmRouter {
    let mut router = LlmRouter::new(config.default_llm_name.clone(), config.max_workers);

    if let Some(host) = &config.ollama_host {
        router.register("ollama", Arc::new(OllamaBackend::new(host.clone(), BACKEND_TIMEOUT_SECS)));
    }
    if let (Some(key), Some(base_url)) = (&config.groq_api_key, &config.base_url) {
        router.register("hosted", Arc::new(HostedBackend::new(base_url.clone(), key.clone(), BACKEND_TIMEOUT_SECS)));
    }
    if config.groq_api_key.is_none() {
        if let Some(base_url) = &config.base_url {
            router.register("openai-compat", Arc::new(OpenAiCompatBackend::new(base_url.clone(), BACKEND_TIMEOUT_SECS)));
        }
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            db_type: DbBackend::Sqlite,
            db_path: ":memory:".into(),
            jwt_secret_key: "test-only-secret".into(),
            jwt_ttl_hours: 9,
            chunk_size: 2048,
            chunk_overlap: 200,
            doc_num: 5,
            similarity: 0.5,
            filtered_doc_number: 5,
            ollama_host: None,
            groq_api_key: None,
            base_url: None,
            default_llm_name: "ollama".into(),
            llm_model_map: Default::default(),
            max_workers: 4,
            upload_max_bytes: 50 * 1024 * 1024,
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            system_messages_dir: std::env::temp_dir().join("rag-service-test-system-messages"),
        }
    }

    #[test]
    fn context_wires_ingestor_and_retriever_together() {
        let ctx = AppContext::new(test_config()).unwrap();
        let cid = ctx.repo().create_collection("docs", "alice").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "a short note about onboarding steps").unwrap();

        let report = ctx.ingestor().ingest_file(&path, "note.txt", cid).unwrap();
        assert_eq!(report.stored, 1);

        let hits = ctx.retriever().search(&["docs".to_string()], "onboarding steps", &[], 0.0, 5).unwrap();
        assert!(!hits.is_empty());
    }

    #[test]
    fn summarizer_shares_the_context_router() {
        let ctx = AppContext::new(test_config()).unwrap();
        assert_eq!(Arc::strong_count(ctx.router()), 2);
    }
}
