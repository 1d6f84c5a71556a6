use std::path::PathBuf;

use crate::embedder::OnnxStdIoConfig;

/// Default settings for the local ONNX embedder, mirrored by tests and by
/// `rag-service`'s configuration loader.
#[derive(Debug, Clone, Copy)]
pub struct OnnxStdIoDefaults {
    pub model_path: &'static str,
    pub tokenizer_path: &'static str,
    pub runtime_dll_path: &'static str,
    pub embedding_dimension: usize,
    pub max_input_tokens: usize,
    pub embedding_model_id: &'static str,
    pub text_repr_version: &'static str,
}

/// Design value from spec §4.2: dimension 768.
pub const ONNX_STDIO_DEFAULTS: OnnxStdIoDefaults = OnnxStdIoDefaults {
    model_path: "models/embedding/model.onnx",
    tokenizer_path: "models/embedding/tokenizer.json",
    runtime_dll_path: "models/embedding/onnxruntime.so",
    embedding_dimension: 768,
    max_input_tokens: 8192,
    embedding_model_id: "rag-corpus-embedder",
    text_repr_version: "v1",
};

/// Convenience helper to build an [`OnnxStdIoConfig`] from the shared
/// defaults, resolved relative to this crate's directory so it works
/// regardless of the caller's working directory.
pub fn default_stdio_config() -> OnnxStdIoConfig {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    OnnxStdIoConfig {
        model_path: base.join(ONNX_STDIO_DEFAULTS.model_path),
        tokenizer_path: base.join(ONNX_STDIO_DEFAULTS.tokenizer_path),
        runtime_library_path: base.join(ONNX_STDIO_DEFAULTS.runtime_dll_path),
        dimension: ONNX_STDIO_DEFAULTS.embedding_dimension,
        max_input_length: ONNX_STDIO_DEFAULTS.max_input_tokens,
        embedding_model_id: ONNX_STDIO_DEFAULTS.embedding_model_id.into(),
        text_repr_version: ONNX_STDIO_DEFAULTS.text_repr_version.into(),
    }
}
