pub mod hosted;
pub mod ollama;
pub mod openai_compat;

pub use hosted::HostedBackend;
pub use ollama::OllamaBackend;
pub use openai_compat::OpenAiCompatBackend;
