//! Explicit configuration record (spec §9's "Dynamic config objects"
//! redesign flag): every recognized environment variable from spec §6 is
//! named here, loaded once at process start, with typed defaults mirroring
//! `embedding_provider::config::OnnxStdIoDefaults`'s const-defaults pattern.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    Sqlite,
    /// Reserved for a future relational backend; spec's `DB_TYPE=postgres`
    /// maps here but is not implemented (see DESIGN.md Open Question).
    Postgres,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_type: DbBackend,
    pub db_path: PathBuf,
    pub jwt_secret_key: String,
    pub jwt_ttl_hours: i64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub doc_num: usize,
    pub similarity: f32,
    pub filtered_doc_number: usize,
    pub ollama_host: Option<String>,
    pub groq_api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_llm_name: String,
    pub llm_model_map: HashMap<String, String>,
    pub max_workers: usize,
    pub upload_max_bytes: u64,
    pub bind_addr: SocketAddr,
    pub system_messages_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingRequired(&'static str),
}

impl AppConfig {
    /// Loads configuration from the process environment. `JWT_SECRET_KEY`
    /// is the only required variable (spec §6); everything else falls back
    /// to a design-value default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret_key =
            std::env::var("JWT_SECRET_KEY").map_err(|_| ConfigError::MissingRequired("JWT_SECRET_KEY"))?;

        Ok(Self {
            db_type: match std::env::var("DB_TYPE").as_deref() {
                Ok("postgres") => DbBackend::Postgres,
                _ => DbBackend::Sqlite,
            },
            db_path: std::env::var("DB_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("rag.db")),
            jwt_secret_key,
            jwt_ttl_hours: env_parse("JWT_TTL_HOURS", 9),
            chunk_size: env_parse("CHUNK_SIZE", 2048),
            chunk_overlap: env_parse("CHUNK_OVERLAP", 200),
            doc_num: env_parse("DOC_NUM", 5),
            similarity: env_parse("SIMILARITY", 0.5),
            filtered_doc_number: env_parse("FILLTERED_DOC_NUMBER", 5),
            ollama_host: std::env::var("OLLAMA_HOST").ok(),
            groq_api_key: std::env::var("GROQ_API_KEY").ok(),
            base_url: std::env::var("BASE_URL").ok(),
            default_llm_name: std::env::var("DEFAULT_LLMNAME").unwrap_or_else(|_| "ollama".to_string()),
            llm_model_map: HashMap::new(),
            max_workers: env_parse("MAX_WORKERS", 5),
            upload_max_bytes: env_parse("UPLOAD_MAX_BYTES", 50 * 1024 * 1024),
            bind_addr: std::env::var("BIND_ADDR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| "0.0.0.0:8080".parse().unwrap()),
            system_messages_dir: std::env::var("SYSTEM_MESSAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("system_messages")),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_jwt_secret_is_a_hard_error() {
        std::env::remove_var("JWT_SECRET_KEY");
        assert!(matches!(AppConfig::from_env(), Err(ConfigError::MissingRequired("JWT_SECRET_KEY"))));
    }

    #[test]
    fn defaults_match_design_values_when_unset() {
        std::env::set_var("JWT_SECRET_KEY", "test-only-secret");
        std::env::remove_var("CHUNK_SIZE");
        std::env::remove_var("SIMILARITY");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.chunk_size, 2048);
        assert!((cfg.similarity - 0.5).abs() < f32::EPSILON);
        std::env::remove_var("JWT_SECRET_KEY");
    }
}
