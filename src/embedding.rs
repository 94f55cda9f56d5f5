//! Embedding backends and vector utilities.
//!
//! The [`Embedder`] trait is the seam between the pipeline and the hosted
//! embedding services. Concrete implementations:
//! - **[`HuggingFaceEmbedder`]** — the Hugging Face Inference API
//!   feature-extraction pipeline (sentence-transformers models).
//! - **[`OpenAiEmbedder`]** — the OpenAI embeddings API.
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not
//!   configured.
//!
//! The same embedder must be used for both indexing and query embedding —
//! vectors from different models are not comparable. The model tag is
//! persisted next to every stored vector and checked at query time.
//!
//! Vector utilities:
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB encoding
//!   for SQLite storage
//! - [`cosine_similarity`] / [`cosine_distance`] — the similarity metric
//!   used for nearest-neighbor ranking

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::http::post_json_with_retry;

/// A sentence-embedding backend.
///
/// `embed_batch` is order-preserving: `output[i]` is the vector for
/// `texts[i]`. Implementations perform one backend call per invocation;
/// partitioning long inputs is the caller's job (see [`embed_in_batches`]).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier persisted next to each stored vector
    /// (e.g. `"sentence-transformers/all-MiniLM-L6-v2"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a sequence of texts in consecutive chunks of at most `batch_size`,
/// concatenating the results in input order.
///
/// Chunking bounds peak request size; order preservation holds regardless
/// of the batch size used. Any chunk failure fails the whole call — there
/// is no partial result. `on_progress` is invoked after each chunk with
/// `(texts_done, texts_total)`.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut all = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let vectors = embedder.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(Error::EmbeddingBackend(format!(
                "backend returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            )));
        }
        all.extend(vectors);
        on_progress(all.len(), texts.len());
    }

    Ok(all)
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed_batch(&[text.to_string()]).await?;
    if vectors.is_empty() {
        return Err(Error::EmbeddingBackend(
            "backend returned no vector for the query".to_string(),
        ));
    }
    Ok(vectors.swap_remove(0))
}

/// Create the configured [`Embedder`].
///
/// | Config value | Backend |
/// |--------------|---------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"huggingface"` | [`HuggingFaceEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "huggingface" => Ok(Box::new(HuggingFaceEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => Err(Error::EmbeddingBackend(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Disabled backend ============

/// A no-op backend that always errors. Used when `embedding.provider` is
/// `"disabled"`; lets the rest of the CLI work without credentials.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingBackend(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Hugging Face backend ============

/// Hugging Face Inference API backend.
///
/// Calls the hosted feature-extraction pipeline for the configured
/// sentence-transformers model. `wait_for_model` is set so cold model loads
/// block instead of erroring.
pub struct HuggingFaceEmbedder {
    model: String,
    dims: usize,
    token: String,
    max_retries: u32,
    timeout: Duration,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::EmbeddingBackend("embedding.model required for huggingface provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            Error::EmbeddingBackend("embedding.dims required for huggingface provider".to_string())
        })?;
        let token = config.api_token.clone().ok_or_else(|| {
            Error::EmbeddingBackend("HF_TOKEN not set in the environment".to_string())
        })?;

        Ok(Self {
            model,
            dims,
            token,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://api-inference.huggingface.co/pipeline/feature-extraction/{}",
            self.model
        )
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::EmbeddingBackend(e.to_string()))?;

        let body = serde_json::json!({
            "inputs": texts,
            "options": { "wait_for_model": true },
        });

        let json = post_json_with_retry(
            &client,
            &self.endpoint(),
            Some(&self.token),
            &body,
            self.max_retries,
        )
        .await
        .map_err(Error::EmbeddingBackend)?;

        parse_nested_vectors(&json, texts.len(), self.dims)
    }
}

/// Parse the feature-extraction response: one fixed-width float array per
/// input sentence.
fn parse_nested_vectors(
    json: &serde_json::Value,
    expected_count: usize,
    expected_dims: usize,
) -> Result<Vec<Vec<f32>>> {
    let rows = json.as_array().ok_or_else(|| {
        Error::EmbeddingBackend("malformed response: expected a JSON array".to_string())
    })?;

    if rows.len() != expected_count {
        return Err(Error::EmbeddingBackend(format!(
            "malformed response: expected {} vectors, found {}",
            expected_count,
            rows.len()
        )));
    }

    let mut vectors = Vec::with_capacity(rows.len());
    for row in rows {
        let values = row.as_array().ok_or_else(|| {
            Error::EmbeddingBackend("malformed response: vector is not an array".to_string())
        })?;
        let vec: Vec<f32> = values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| {
                        Error::EmbeddingBackend(
                            "malformed response: non-numeric vector element".to_string(),
                        )
                    })
            })
            .collect::<Result<_>>()?;
        if vec.len() != expected_dims {
            return Err(Error::EmbeddingBackend(format!(
                "malformed response: expected {} dims, found {}",
                expected_dims,
                vec.len()
            )));
        }
        vectors.push(vec);
    }

    Ok(vectors)
}

// ============ OpenAI backend ============

/// OpenAI embeddings API backend (`POST /v1/embeddings`).
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::EmbeddingBackend("embedding.model required for openai provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            Error::EmbeddingBackend("embedding.dims required for openai provider".to_string())
        })?;
        let api_key = config.api_token.clone().ok_or_else(|| {
            Error::EmbeddingBackend("OPENAI_API_KEY not set in the environment".to_string())
        })?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::EmbeddingBackend(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = post_json_with_retry(
            &client,
            "https://api.openai.com/v1/embeddings",
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await
        .map_err(Error::EmbeddingBackend)?;

        parse_openai_response(&json, texts.len(), self.dims)
    }
}

/// Extract `data[].embedding` arrays, reordered by the response's `index`
/// field so the output always matches input order.
fn parse_openai_response(
    json: &serde_json::Value,
    expected_count: usize,
    expected_dims: usize,
) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        Error::EmbeddingBackend("malformed response: missing data array".to_string())
    })?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for item in data {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(indexed.len());
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::EmbeddingBackend("malformed response: missing embedding".to_string())
            })?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        if vec.len() != expected_dims {
            return Err(Error::EmbeddingBackend(format!(
                "malformed response: expected {} dims, found {}",
                expected_dims,
                vec.len()
            )));
        }
        indexed.push((index, vec));
    }

    if indexed.len() != expected_count {
        return Err(Error::EmbeddingBackend(format!(
            "malformed response: expected {} vectors, found {}",
            expected_count,
            indexed.len()
        )));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB of little-endian `f32` bytes
/// (`vec.len() × 4` bytes), the storage format of the `embeddings` column.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Inverse of [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance: `1 - cosine_similarity`, in `[0.0, 2.0]`.
/// Nearest-neighbor ranking orders by ascending distance.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - f64::from(cosine_similarity(a, b))
}

// ============ Test doubles ============
