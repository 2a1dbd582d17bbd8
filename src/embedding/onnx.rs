//! ONNX-based embedding generation.
//!
//! This module runs the registry's sentence-transformer models locally with
//! ONNX Runtime. It requires the `builtin-embeddings` feature to be enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use raglens::embedding::onnx::OnnxEmbedding;
//! use raglens::EmbeddingModel;
//!
//! OnnxEmbedding::download_model(EmbeddingModel::MiniLm, None)?;
//! let service = OnnxEmbedding::load(EmbeddingModel::MiniLm, None)?;
//! let embedding = service.embed("Hello, world!")?;
//! assert_eq!(embedding.len(), 384);
//! ```
//!
//! # Architecture
//!
//! ```text
//! Text → Tokenize → ONNX Inference → Mean Pool → L2 Normalize → Embedding
//! ```
//!
//! Inference is CPU-intensive; [`EmbedderCache`](super::EmbedderCache) makes
//! sure each model is loaded once per process.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::embedding::{l2_normalize, EmbeddingModel, EmbeddingService};
use crate::error::{RagLensError, Result};
use crate::types::Embedding;

/// File names expected in each model directory
const MODEL_FILENAME: &str = "model.onnx";
const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// ONNX-based embedding service.
///
/// The model and tokenizer are loaded eagerly at construction time, so a
/// missing file surfaces as `ModelLoad` when the model is first selected,
/// not halfway through an ingestion.
pub struct OnnxEmbedding {
    /// Wrapped in Mutex because `Session::run()` requires `&mut self`,
    /// but `EmbeddingService` uses `&self` for shared access.
    session: Mutex<Session>,

    /// Immutable after loading, so no Mutex needed.
    tokenizer: Tokenizer,

    model: EmbeddingModel,

    /// BERT-style graphs take segment ids; MPNet graphs don't.
    uses_token_type_ids: bool,
}

impl OnnxEmbedding {
    /// Loads `model` from `root/<short name>/`, or from the platform cache
    /// directory when `root` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `ModelLoad` if model files are missing or cannot be loaded.
    pub fn load(model: EmbeddingModel, root: Option<&Path>) -> Result<Self> {
        let model_dir = model_dir(model, root);

        info!(
            model = %model,
            model_dir = %model_dir.display(),
            "Loading ONNX embedding model"
        );

        Self::load_from_dir(model, &model_dir)
    }

    /// Downloads `model.onnx` and `tokenizer.json` from the HuggingFace Hub.
    ///
    /// Files that already exist are left alone. Returns the model directory.
    pub fn download_model(model: EmbeddingModel, root: Option<&Path>) -> Result<PathBuf> {
        let dir = model_dir(model, root);

        std::fs::create_dir_all(&dir).map_err(|e| {
            RagLensError::model_load(
                model.identifier(),
                format!("failed to create model directory {}: {e}", dir.display()),
            )
        })?;

        let base = format!("https://huggingface.co/{}/resolve/main", model.identifier());
        let model_path = dir.join(MODEL_FILENAME);
        let tokenizer_path = dir.join(TOKENIZER_FILENAME);

        if !model_path.exists() {
            let url = format!("{base}/onnx/{MODEL_FILENAME}");
            info!(url = %url, dest = %model_path.display(), "Downloading ONNX model");
            download_file(model, &url, &model_path)?;
        }

        if !tokenizer_path.exists() {
            let url = format!("{base}/{TOKENIZER_FILENAME}");
            info!(url = %url, dest = %tokenizer_path.display(), "Downloading tokenizer");
            download_file(model, &url, &tokenizer_path)?;
        }

        info!(dir = %dir.display(), "Model files ready");
        Ok(dir)
    }

    fn load_from_dir(model: EmbeddingModel, model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILENAME);
        let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

        if !model_path.exists() {
            return Err(RagLensError::model_load(
                model.identifier(),
                format!(
                    "model file not found: {}. Download with OnnxEmbedding::download_model",
                    model_path.display()
                ),
            ));
        }
        if !tokenizer_path.exists() {
            return Err(RagLensError::model_load(
                model.identifier(),
                format!("tokenizer file not found: {}", tokenizer_path.display()),
            ));
        }

        let session = create_session(model, &model_path)?;
        let tokenizer = load_tokenizer(model, &tokenizer_path)?;
        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        debug!(
            dimension = model.dimension(),
            max_length = model.max_length(),
            uses_token_type_ids,
            "ONNX embedding model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model,
            uses_token_type_ids,
        })
    }

    /// Runs one padded batch of `[batch_size, max_len]` tensors.
    fn run_batch(
        &self,
        input_ids: Vec<i64>,
        attention_mask: Vec<i64>,
        batch_size: usize,
        max_len: usize,
    ) -> Result<Vec<Embedding>> {
        let shape_err = |e: ndarray::ShapeError| {
            RagLensError::embedding(format!("Tensor shape error: {e}"))
        };
        let tensor_err =
            |e: ort::Error| RagLensError::embedding(format!("Tensor creation failed: {e}"));

        let ids_array =
            Array2::from_shape_vec((batch_size, max_len), input_ids).map_err(shape_err)?;
        let mask_array = Array2::from_shape_vec((batch_size, max_len), attention_mask.clone())
            .map_err(shape_err)?;

        let ids_tensor = ort::value::Tensor::from_array(ids_array).map_err(tensor_err)?;
        let mask_tensor = ort::value::Tensor::from_array(mask_array).map_err(tensor_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| RagLensError::embedding(format!("Session lock poisoned: {e}")))?;

        let outputs = if self.uses_token_type_ids {
            let type_array = Array2::from_shape_vec((batch_size, max_len), vec![0i64; batch_size * max_len])
                .map_err(shape_err)?;
            let type_tensor = ort::value::Tensor::from_array(type_array).map_err(tensor_err)?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])
        }
        .map_err(|e| RagLensError::embedding(format!("ONNX inference failed: {e}")))?;

        // [batch_size, max_len, dim]
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RagLensError::embedding(format!("Output extraction failed: {e}")))?;

        let dim = self.model.dimension();
        let mut results = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let text_mask: Vec<u32> = (0..max_len)
                .map(|j| attention_mask[i * max_len + j] as u32)
                .collect();

            let offset = i * max_len * dim;
            let text_data = data
                .get(offset..offset + max_len * dim)
                .ok_or_else(|| RagLensError::embedding("Model output shorter than expected"))?;

            let pooled = mean_pool_raw(text_data, &text_mask, dim, max_len);
            results.push(l2_normalize(&pooled));
        }

        Ok(results)
    }
}

impl EmbeddingService for OnnxEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut batch = self.embed_batch(&[text])?;
        batch
            .pop()
            .ok_or_else(|| RagLensError::embedding("Model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(RagLensError::embedding(format!(
                "Cannot embed empty text (input {i})"
            )));
        }

        let encodings: Vec<_> = texts
            .iter()
            .map(|t| self.tokenizer.encode(*t, true))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RagLensError::embedding(format!("Tokenization failed: {e}")))?;

        let max_length = self.model.max_length();

        // Pad to the longest sequence in the batch
        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len().min(max_length))
            .max()
            .unwrap_or(0);

        let batch_size = texts.len();
        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];

        for (i, enc) in encodings.iter().enumerate() {
            let ids = enc.get_ids();
            let mask = enc.get_attention_mask();
            let len = ids.len().min(max_length);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        self.run_batch(input_ids, attention_mask, batch_size, max_len)
    }

    fn dimension(&self) -> usize {
        self.model.dimension()
    }
}

/// Creates an ONNX Runtime session with optimized settings.
fn create_session(model: EmbeddingModel, model_path: &Path) -> Result<Session> {
    let load_err = |e: ort::Error| RagLensError::model_load(model.identifier(), e.to_string());

    Session::builder()
        .map_err(load_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_err)?
        .commit_from_file(model_path)
        .map_err(|e| {
            RagLensError::model_load(
                model.identifier(),
                format!("failed to load ONNX model from {}: {e}", model_path.display()),
            )
        })
}

/// Loads a HuggingFace tokenizer and truncates to the model's max length.
fn load_tokenizer(model: EmbeddingModel, tokenizer_path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
        RagLensError::model_load(
            model.identifier(),
            format!("failed to load tokenizer from {}: {e}", tokenizer_path.display()),
        )
    })?;

    tokenizer
        .with_truncation(Some(tokenizers::TruncationParams {
            max_length: model.max_length(),
            strategy: tokenizers::TruncationStrategy::LongestFirst,
            ..Default::default()
        }))
        .map_err(|e| {
            RagLensError::model_load(model.identifier(), format!("failed to set truncation: {e}"))
        })?;

    // Padding is done by hand in embed_batch()
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

/// `root/<short name>`, defaulting `root` to the platform cache directory.
///
/// - Linux: `~/.cache/raglens/models/{name}/`
/// - macOS: `~/Library/Caches/raglens/models/{name}/`
/// - Windows: `{LOCALAPPDATA}/raglens/models/{name}/`
fn model_dir(model: EmbeddingModel, root: Option<&Path>) -> PathBuf {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("raglens")
            .join("models"),
    };
    root.join(model.short_name())
}

/// Attention-weighted average of token embeddings.
///
/// `data` is `[seq_len, dim]` in row-major order; only tokens with
/// mask=1 contribute.
fn mean_pool_raw(data: &[f32], attention_mask: &[u32], dim: usize, seq_len: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut mask_sum = 0.0f32;

    for (t, &mask_val) in attention_mask.iter().enumerate().take(seq_len) {
        let weight = mask_val as f32;
        mask_sum += weight;
        let offset = t * dim;
        for d in 0..dim {
            pooled[d] += data[offset + d] * weight;
        }
    }

    if mask_sum > 0.0 {
        for val in &mut pooled {
            *val /= mask_sum;
        }
    }

    pooled
}

fn download_file(model: EmbeddingModel, url: &str, dest: &Path) -> Result<()> {
    let response = ureq::get(url).call().map_err(|e| {
        RagLensError::model_load(model.identifier(), format!("download failed for {url}: {e}"))
    })?;

    let mut reader = response.into_body().into_reader();
    let mut file = std::fs::File::create(dest).map_err(|e| {
        RagLensError::model_load(
            model.identifier(),
            format!("failed to create file {}: {e}", dest.display()),
        )
    })?;

    std::io::copy(&mut reader, &mut file).map_err(|e| {
        RagLensError::model_load(
            model.identifier(),
            format!("failed to write to {}: {e}", dest.display()),
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_uniform_mask() {
        let data = vec![
            1.0, 2.0, 3.0, // token 0
            5.0, 6.0, 7.0, // token 1
        ];
        let pooled = mean_pool_raw(&data, &[1, 1], 3, 2);
        assert!((pooled[0] - 3.0).abs() < 1e-6);
        assert!((pooled[1] - 4.0).abs() < 1e-6);
        assert!((pooled[2] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_partial_mask() {
        let data = vec![
            1.0, 2.0, 3.0, // token 0 (real)
            99.0, 99.0, 99.0, // token 1 (padding)
        ];
        let pooled = mean_pool_raw(&data, &[1, 0], 3, 2);
        assert_eq!(pooled, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mean_pool_zero_mask() {
        let pooled = mean_pool_raw(&[99.0, 99.0, 99.0], &[0], 3, 1);
        assert_eq!(pooled, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_model_dir_uses_short_name() {
        let dir = model_dir(EmbeddingModel::MpNet, Some(Path::new("/models")));
        assert_eq!(dir, PathBuf::from("/models/all-mpnet-base-v2"));
    }

    #[test]
    fn test_load_missing_files_is_model_load_error() {
        let result = OnnxEmbedding::load(EmbeddingModel::MiniLm, Some(Path::new("/nonexistent")));
        let err = result.err().unwrap();
        assert!(err.is_model_load());
        assert!(err.to_string().contains("not found"), "Error: {err}");
    }

    #[test]
    fn test_onnx_embedding_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OnnxEmbedding>();
    }
}
