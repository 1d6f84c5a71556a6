use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("failed to parse {format} document: {message}")]
    Parse { format: &'static str, message: String },
}
