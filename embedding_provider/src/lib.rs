//! Maps text to fixed-dimension dense vectors (component C2).
//!
//! Deterministic for identical input, as required by the retriever: the same
//! chunk or query text always embeds to the same vector for a given provider
//! instance. Two backends are offered: a real ONNX Runtime embedder for
//! production models, and a dependency-free deterministic backend used when
//! no ONNX model is configured (tests, offline development).

pub mod config;
pub mod embedder;
pub mod pool;

pub use embedder::{Embedder, EmbedderError, EmbedderInfo, ProviderKind};
