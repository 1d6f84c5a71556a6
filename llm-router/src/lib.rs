//! LLM routing (component C6) and map-reduce summarization (component C7).

pub mod backend;
pub mod backends;
pub mod error;
pub mod router;
pub mod summarizer;
pub mod types;

pub use backend::LlmBackend;
pub use error::LlmError;
pub use router::LlmRouter;
pub use summarizer::{SummarizeEvent, Summarizer};
pub use types::{ChatRequest, ChatResponse, Message, Role};
