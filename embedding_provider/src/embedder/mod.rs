use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use ndarray::Array2;
use ort::{Error as OrtError, session::Session, value::Tensor};
use thiserror::Error;
use tokenizers::{Encoding, Tokenizer, TruncationDirection};
use tracing::{debug, warn};

/// Identifies the backing implementation that powers an embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OnnxStdIo,
    Deterministic,
}

/// Static metadata describing a particular embedder instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderInfo {
    pub provider: ProviderKind,
    pub embedding_model_id: String,
    pub dimension: usize,
    pub text_repr_version: String,
}

/// Errors that can be produced by embedder operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmbedderError {
    #[error("invalid embedder configuration: {message}")]
    InvalidConfiguration { message: String },
    #[error("provider failure: {message}")]
    ProviderFailure { message: String },
}

/// Core interface for all embedder implementations (spec §4.2).
///
/// Implementations must be deterministic for identical input and safe to
/// call from multiple concurrent workers; an implementation backed by a
/// non-reentrant model serializes access internally (see `OnnxStdIoEmbedder`,
/// which holds its ONNX session behind a `Mutex`).
pub trait Embedder: Send + Sync {
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;
    fn info(&self) -> &EmbedderInfo;
}

/// Configuration for a local ONNX embedder driven through `ort`.
#[derive(Debug, Clone)]
pub struct OnnxStdIoConfig {
    pub model_path: PathBuf,
    pub runtime_library_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimension: usize,
    pub max_input_length: usize,
    pub embedding_model_id: String,
    pub text_repr_version: String,
}

/// ONNX-based embedder that executes models through the ONNX Runtime shared library.
#[derive(Debug)]
pub struct OnnxStdIoEmbedder {
    info: EmbedderInfo,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    pad_id: i64,
    max_input_length: usize,
}

#[derive(Debug)]
struct PreparedBatch {
    input_ids: Tensor<i64>,
    attention_mask: Tensor<i64>,
    attention_rows: Vec<Vec<i64>>,
}

static ORT_RUNTIME_PATH: OnceLock<PathBuf> = OnceLock::new();

impl OnnxStdIoEmbedder {
    pub fn new(config: OnnxStdIoConfig) -> Result<Self, EmbedderError> {
        if config.dimension == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "dimension must be greater than zero".into(),
            });
        }
        if config.max_input_length == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "max_input_length must be greater than zero".into(),
            });
        }

        let runtime_library_path =
            resolve_existing_path(&config.runtime_library_path, "ONNX Runtime shared library")?;
        ensure_ort_initialized(&runtime_library_path)?;

        let model_path = resolve_existing_path(&config.model_path, "ONNX model")?;
        let tokenizer_path = resolve_existing_path(&config.tokenizer_path, "tokenizer config")?;

        let session = Session::builder()
            .map_err(|err| map_ort_error("create session builder", err))?
            .commit_from_file(&model_path)
            .map_err(|err| map_ort_error("load ONNX model", err))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|err| map_tokenizer_error("load tokenizer", err))?;

        let pad_id = tokenizer
            .token_to_id("<pad>")
            .or_else(|| tokenizer.token_to_id("[PAD]"))
            .ok_or_else(|| EmbedderError::InvalidConfiguration {
                message: format!(
                    "tokenizer `{}` does not declare a pad token",
                    tokenizer_path.display()
                ),
            })? as i64;

        let info = EmbedderInfo {
            provider: ProviderKind::OnnxStdIo,
            embedding_model_id: config.embedding_model_id,
            dimension: config.dimension,
            text_repr_version: config.text_repr_version,
        };

        Ok(Self {
            info,
            session: Mutex::new(session),
            tokenizer,
            pad_id,
            max_input_length: config.max_input_length,
        })
    }

    /// Tokenize and truncate to `max_input_length` rather than failing
    /// (spec §4.2: "Truncates inputs that exceed a backend-imposed token
    /// limit rather than failing").
    fn prepare_encodings(&self, texts: &[&str]) -> Result<Vec<Encoding>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut encodings = texts
            .iter()
            .map(|t| self.tokenizer.encode(*t, true))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| map_tokenizer_error("tokenize inputs", err))?;

        for enc in &mut encodings {
            if enc.len() > self.max_input_length {
                debug!(original_len = enc.len(), max = self.max_input_length, "truncating embedder input");
                enc.truncate(self.max_input_length, 0, TruncationDirection::Right);
            }
        }
        Ok(encodings)
    }

    fn build_input_tensors(&self, encodings: &[Encoding]) -> Result<PreparedBatch, EmbedderError> {
        let batch = encodings.len();
        let seq_len = encodings.iter().map(Encoding::len).max().unwrap_or(0);

        let mut input_ids = Array2::<i64>::zeros((batch, seq_len));
        let mut attention_mask = Array2::<i64>::zeros((batch, seq_len));
        let mut attention_rows = Vec::with_capacity(batch);

        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();

            for (col, (&id, &m)) in ids.iter().zip(mask.iter()).enumerate() {
                input_ids[(row, col)] = id as i64;
                attention_mask[(row, col)] = m as i64;
            }
            for col in ids.len()..seq_len {
                input_ids[(row, col)] = self.pad_id;
                attention_mask[(row, col)] = 0;
            }
            attention_rows.push((0..seq_len).map(|i| attention_mask[(row, i)]).collect::<Vec<i64>>());
        }

        let input_ids = Tensor::from_array(input_ids).map_err(|err| map_ort_error("prepare input_ids", err))?;
        let attention_mask =
            Tensor::from_array(attention_mask).map_err(|err| map_ort_error("prepare attention_mask", err))?;

        Ok(PreparedBatch { input_ids, attention_mask, attention_rows })
    }

    fn run_session(
        &self,
        input_ids: Tensor<i64>,
        attention_mask: Tensor<i64>,
    ) -> Result<(Vec<f32>, usize, usize, usize), EmbedderError> {
        let mut session = self.session.lock().expect("embedder session mutex poisoned");
        let outputs = session
            .run(ort::inputs![input_ids, attention_mask])
            .map_err(|err| map_ort_error("execute ONNX session", err))?;

        let output = &outputs[0];
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|err| map_ort_error("extract output tensor", err))?;

        if shape.len() != 3 {
            return Err(EmbedderError::ProviderFailure {
                message: format!("model output must be rank-3 [batch, seq_len, hidden], got shape {:?}", shape),
            });
        }

        let batch: usize = shape[0].try_into().unwrap();
        let seq_len: usize = shape[1].try_into().unwrap();
        let hidden: usize = shape[2].try_into().unwrap();
        Ok((data.to_vec(), batch, seq_len, hidden))
    }

    fn mean_pool(&self, data: &[f32], attention_rows: &[Vec<i64>], seq_len: usize, hidden: usize) -> Vec<Vec<f32>> {
        let batch = attention_rows.len();
        let mut results = Vec::with_capacity(batch);
        for b in 0..batch {
            let mut sum = vec![0f32; hidden];
            let mut count = 0f32;
            for t in 0..seq_len {
                if attention_rows[b][t] == 1 {
                    let base = (b * seq_len + t) * hidden;
                    for h in 0..hidden {
                        sum[h] += data[base + h];
                    }
                    count += 1.0;
                }
            }
            if count > 0.0 {
                for v in &mut sum {
                    *v /= count;
                }
            }
            results.push(sum);
        }
        results
    }
}

impl Embedder for OnnxStdIoEmbedder {
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let encodings = self.prepare_encodings(&[text])?;
        let prepared = self.build_input_tensors(&encodings)?;
        let (raw_data, batch, seq_len, hidden) = self.run_session(prepared.input_ids, prepared.attention_mask)?;
        if batch != 1 {
            return Err(EmbedderError::ProviderFailure {
                message: format!("model returned unexpected batch size {batch}, expected 1"),
            });
        }
        let pooled = self.mean_pool(&raw_data, &prepared.attention_rows, seq_len, hidden);
        let vector = pooled.into_iter().next().unwrap_or_default();
        if vector.len() != self.info.dimension {
            return Err(EmbedderError::ProviderFailure {
                message: format!(
                    "pooled embedding dimension {} does not match configured dimension {}",
                    vector.len(),
                    self.info.dimension
                ),
            });
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self.prepare_encodings(texts)?;
        let prepared = self.build_input_tensors(&encodings)?;
        let expected_seq_len = encodings.iter().map(Encoding::len).max().unwrap_or(0);
        let (raw_data, batch, seq_len_from_model, hidden) =
            self.run_session(prepared.input_ids, prepared.attention_mask)?;

        if batch != prepared.attention_rows.len() || seq_len_from_model != expected_seq_len {
            return Err(EmbedderError::ProviderFailure {
                message: "model output shape did not match prepared batch".into(),
            });
        }
        Ok(self.mean_pool(&raw_data, &prepared.attention_rows, expected_seq_len, hidden))
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}

/// Dependency-free deterministic embedder: hashes text into a pseudo-random
/// but stable vector. Used as the default backend when no ONNX model is
/// configured (offline development, tests, and any caller that only needs a
/// stable embedding space rather than a specific pretrained model).
#[derive(Debug, Clone)]
pub struct DeterministicEmbedder {
    info: EmbedderInfo,
    max_input_length: usize,
    base_seed: u64,
}

impl DeterministicEmbedder {
    pub fn new(dimension: usize, embedding_model_id: impl Into<String>, max_input_length: usize) -> Result<Self, EmbedderError> {
        if dimension == 0 {
            return Err(EmbedderError::InvalidConfiguration { message: "dimension must be greater than zero".into() });
        }
        if max_input_length == 0 {
            return Err(EmbedderError::InvalidConfiguration { message: "max_input_length must be greater than zero".into() });
        }
        let embedding_model_id = embedding_model_id.into();
        let base_seed = compute_seed(&embedding_model_id, dimension);
        Ok(Self {
            info: EmbedderInfo {
                provider: ProviderKind::Deterministic,
                embedding_model_id,
                dimension,
                text_repr_version: "v1".into(),
            },
            max_input_length,
            base_seed,
        })
    }

    fn truncated(&self, text: &str) -> String {
        let char_count = text.chars().count();
        if char_count <= self.max_input_length {
            return text.to_string();
        }
        warn!(char_count, max = self.max_input_length, "truncating embedder input");
        text.chars().take(self.max_input_length).collect()
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.info.dimension);
        for index in 0..self.info.dimension {
            let mut hasher = DefaultHasher::new();
            self.base_seed.hash(&mut hasher);
            index.hash(&mut hasher);
            text.hash(&mut hasher);
            out.push(normalize_hash(hasher.finish()));
        }
        out
    }
}

impl Embedder for DeterministicEmbedder {
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        Ok(self.generate(&self.truncated(text)))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}

fn ensure_ort_initialized(runtime_library_path: &Path) -> Result<(), EmbedderError> {
    if let Some(existing) = ORT_RUNTIME_PATH.get() {
        if !paths_equal(existing, runtime_library_path) {
            return Err(EmbedderError::InvalidConfiguration {
                message: format!(
                    "ONNX Runtime already initialized with library `{}`; cannot reinitialize with `{}`",
                    existing.display(),
                    runtime_library_path.display()
                ),
            });
        }
    } else {
        let _ = ORT_RUNTIME_PATH.set(runtime_library_path.to_path_buf());
    }

    ort::init_from(runtime_library_path.to_string_lossy().to_string())
        .with_name("rag-corpus-service")
        .commit()
        .map_err(|err| map_ort_error("initialize ONNX Runtime environment", err))?;
    Ok(())
}

fn resolve_existing_path(path: &Path, description: &str) -> Result<PathBuf, EmbedderError> {
    fs::metadata(path).map_err(|_| EmbedderError::InvalidConfiguration {
        message: format!("{description} `{}` does not exist", path.display()),
    })?;
    path.canonicalize().map_err(|err| EmbedderError::ProviderFailure {
        message: format!("failed to canonicalize {description} `{}`: {err}", path.display()),
    })
}

fn map_ort_error(context: &str, err: OrtError) -> EmbedderError {
    EmbedderError::ProviderFailure { message: format!("{context} failed: {err}") }
}

fn map_tokenizer_error(context: &str, err: tokenizers::Error) -> EmbedderError {
    EmbedderError::ProviderFailure { message: format!("{context} failed: {err}") }
}

fn compute_seed(embedding_model_id: &str, dimension: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    embedding_model_id.hash(&mut hasher);
    dimension.hash(&mut hasher);
    hasher.finish()
}

fn normalize_hash(value: u64) -> f32 {
    const SCALE: f64 = 2.0;
    let normalized = (value as f64) / (u64::MAX as f64);
    (normalized * SCALE - 1.0) as f32
}

fn paths_equal(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_embedder_is_stable() {
        let e = DeterministicEmbedder::new(16, "test-model", 4096).unwrap();
        let a = e.embed_one("hello world").unwrap();
        let b = e.embed_one("hello world").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn deterministic_embedder_differs_for_different_text() {
        let e = DeterministicEmbedder::new(16, "test-model", 4096).unwrap();
        let a = e.embed_one("hello world").unwrap();
        let b = e.embed_one("goodbye world").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_embedder_truncates_rather_than_fails() {
        let e = DeterministicEmbedder::new(8, "test-model", 4).unwrap();
        let long = "a".repeat(1000);
        let result = e.embed_one(&long);
        assert!(result.is_ok());
    }

    #[test]
    fn embed_batch_matches_individual_embeddings() {
        let e = DeterministicEmbedder::new(8, "test-model", 4096).unwrap();
        let inputs = ["alpha", "beta"];
        let batch = e.embed_batch(&inputs).unwrap();
        for (text, vec) in inputs.iter().zip(batch.iter()) {
            assert_eq!(&e.embed_one(text).unwrap(), vec);
        }
    }
}
