//! Embedding backend trait and vector helpers.
//!
//! The `EmbedderBackend` trait abstracts over batch embedding generation.
//! Implementations:
//! - `OpenAiEmbedder`: OpenAI-compatible `/v1/embeddings` over blocking HTTP
//! - test fakes in the crates that consume it

use goalmap_core::Result;
use ndarray::Array1;

/// Result of one batch embedding call.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// One vector per input text, in input order.
    pub vectors: Vec<Array1<f32>>,
    /// Input tokens billed for the call.
    pub tokens: usize,
}

/// Trait for embedding backends.
///
/// Calls are blocking; the batch runner issues them one at a time.
pub trait EmbedderBackend: Send + Sync {
    /// Model identifier used for pricing (e.g. `text-embedding-3-large`).
    fn model(&self) -> &str;

    /// Embed a batch of texts. The returned vectors preserve input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<EmbeddingBatch>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<(Array1<f32>, usize)> {
        let batch = self.embed_batch(&[text])?;
        let tokens = batch.tokens;
        batch
            .vectors
            .into_iter()
            .next()
            .map(|v| (v, tokens))
            .ok_or_else(|| goalmap_core::Error::Provider("Empty embedding response".into()))
    }
}

/// Scale `v` to unit length. Zero vectors are returned unchanged.
pub fn normalize(v: &Array1<f32>) -> Array1<f32> {
    let norm = v.dot(v).sqrt();
    if norm < 1e-9 {
        v.clone()
    } else {
        v / norm
    }
}

/// Cosine similarity of two vectors; 0.0 for empty, zero, or mismatched inputs.
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let na = a.dot(a).sqrt();
    let nb = b.dot(b).sqrt();
    if na < 1e-9 || nb < 1e-9 {
        return 0.0;
    }
    a.dot(b) / (na * nb)
}
