//! Local sentence embeddings with ONNX Runtime.
//!
//! Loads a sentence-transformers model (e.g. paraphrase-multilingual-MiniLM,
//! all-MiniLM-L6-v2) and produces mean-pooled, L2-normalized vectors. The
//! model directory must contain `model.onnx` and `tokenizer.json`.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::error::EmbedError;
use crate::service::{EmbeddingService, normalize};

/// Longest input in tokens. Complaints are short; longer text is truncated.
const MAX_SEQ_LEN: usize = 256;

/// Sentence embedding generator using ONNX Runtime.
///
/// Produces normalized vectors suitable for cosine similarity against the
/// anchor centroids.
pub struct Embedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

impl Embedder {
    /// Load an embedding model from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?.commit_from_file(&model_path)?;

        // Embedding dimension from the model's output shape.
        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        // Truncate long complaints to the model's max length.
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        // Pad every input in a batch to the same length.
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        info!(dim, model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            session,
            tokenizer,
            dim,
        })
    }

    /// Embedding dimensionality (384 for the MiniLM family).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// One normalized vector per input text.
    pub fn embed_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let batch_size = texts.len();

        // Tokenize all texts.
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat input tensors: [batch_size, seq_len].
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            let tokens = encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids());
            for (j, ((&id, &mask), &tid)) in tokens.enumerate() {
                input_ids[row + j] = i64::from(id);
                attention_mask[row + j] = i64::from(mask);
                token_type_ids[row + j] = i64::from(tid);
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))?;
        let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
        // Run inference.
        let outputs = self.session.run(ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
            "token_type_ids" => type_tensor,
        ])?;

        // Token embeddings: [batch_size, seq_len, dim].
        let (output_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == batch_size && dims[2] as usize == self.dim,
            "unexpected output shape {dims:?}, expected [{batch_size}, {seq_len}, {}]",
            self.dim
        );
        let out_len = dims[1] as usize;

        // Mean pooling over the attention mask.
        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.dim];
            let mut weight = 0.0f32;
            for j in 0..out_len.min(seq_len) {
                let m = attention_mask[i * seq_len + j] as f32;
                if m > 0.0 {
                    let offset = (i * out_len + j) * self.dim;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += data[offset + d] * m;
                    }
                    weight += m;
                }
            }
            // Average, then normalize to unit length.
            if weight > 0.0 {
                for p in &mut pooled {
                    *p /= weight;
                }
            }
            normalize(&mut pooled);
            embeddings.push(pooled);
        }
        Ok(embeddings)
    }
}

fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

/// [`EmbeddingService`] over a local [`Embedder`]. Inference runs on the
/// blocking thread pool; one batch at a time.
pub struct OnnxEmbeddingService {
    embedder: Arc<Mutex<Embedder>>,
    model_id: String,
}

impl OnnxEmbeddingService {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let embedder = Embedder::load(model_dir)?;
        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());
        Ok(Self {
            model_id: format!("onnx:{name}:{}", embedder.dim()),
            embedder: Arc::new(Mutex::new(embedder)),
        })
    }
}

#[async_trait]
impl EmbeddingService for OnnxEmbeddingService {
    fn ready(&self) -> bool {
        true
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The session sits behind one mutex, so extra concurrent calls only queue.
    fn max_concurrency(&self) -> usize {
        1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let embedder = Arc::clone(&self.embedder);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            embedder
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .embed_batch(&refs)
                .map_err(|e| EmbedError::Failed(e.to_string()))
        })
        .await
        .map_err(|e| EmbedError::Failed(format!("embedding task: {e}")))?
    }
}
