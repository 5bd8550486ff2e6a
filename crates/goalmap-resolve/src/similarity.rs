//! Similarity strategies: embedding cosine (with chunking) and TF-IDF cosine.
//!
//! Exactly one strategy is active per run. Both return one value per
//! candidate, in candidate order.

use std::collections::HashMap;
use std::sync::Arc;

use goalmap_core::{Error, Result};
use goalmap_infer::{cosine_similarity, normalize, EmbedderBackend, Usage, UsageMeter};
use goalmap_ingest::{tfidf_terms, Document, TokenChunker};
use goalmap_store::MatchMethod;
use ndarray::Array1;
use tracing::debug;

use crate::catalog::Objective;

/// Similarities for one document against its candidates.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScores {
    pub values: Vec<f64>,
    pub usage: Usage,
    /// Number of text windows embedded (0 for lexical).
    pub chunks: usize,
}

/// Objective vectors produced when a catalog is built.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveEncoding {
    pub vectors: Option<Vec<Array1<f32>>>,
    pub usage: Usage,
}

/// Trait for similarity strategies.
pub trait SimilarityProvider: Send + Sync {
    /// Method tag recorded on objective matches.
    fn method(&self) -> MatchMethod;

    /// Precompute whatever the strategy needs per objective.
    fn encode_objectives(&self, texts: &[&str]) -> Result<ObjectiveEncoding>;

    /// One similarity per candidate.
    fn similarities(&self, document: &Document, candidates: &[&Objective]) -> Result<SimilarityScores>;
}

/// Embedding strategy: max cosine over document chunks per objective.
pub struct EmbeddingSimilarity {
    embedder: Arc<dyn EmbedderBackend>,
    chunker: TokenChunker,
    meter: Arc<UsageMeter>,
}

impl EmbeddingSimilarity {
    pub fn new(embedder: Arc<dyn EmbedderBackend>, chunker: TokenChunker, meter: Arc<UsageMeter>) -> Self {
        Self {
            embedder,
            chunker,
            meter,
        }
    }
}

impl SimilarityProvider for EmbeddingSimilarity {
    fn method(&self) -> MatchMethod {
        MatchMethod::Embedding
    }

    fn encode_objectives(&self, texts: &[&str]) -> Result<ObjectiveEncoding> {
        let batch = self.embedder.embed_batch(texts)?;
        let usage = self.meter.record(batch.tokens);
        Ok(ObjectiveEncoding {
            vectors: Some(batch.vectors.iter().map(normalize).collect()),
            usage,
        })
    }

    fn similarities(&self, document: &Document, candidates: &[&Objective]) -> Result<SimilarityScores> {
        let chunks = self.chunker.chunk(&document.text);
        if chunks.len() > 1 {
            debug!(
                "Document {} split into {} chunks (~{} tokens)",
                document.source_id,
                chunks.len(),
                self.chunker.estimate_tokens(&document.text)
            );
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let batch = self.embedder.embed_batch(&texts)?;
        let usage = self.meter.record(batch.tokens);
        if batch.vectors.len() != chunks.len() {
            return Err(Error::Provider(format!(
                "Expected {} chunk embeddings, got {}",
                chunks.len(),
                batch.vectors.len()
            )));
        }

        let mut values = Vec::with_capacity(candidates.len());
        for objective in candidates {
            let target = objective.embedding.as_ref().ok_or_else(|| {
                Error::Internal(format!("Objective {} has no embedding", objective.id))
            })?;
            let best = batch
                .vectors
                .iter()
                .map(|v| cosine_similarity(v, target) as f64)
                .fold(f64::NEG_INFINITY, f64::max);
            values.push(if best.is_finite() { best } else { 0.0 });
        }

        Ok(SimilarityScores {
            values,
            usage,
            chunks: chunks.len(),
        })
    }
}

/// Default TF-IDF vocabulary cap.
pub const DEFAULT_MAX_FEATURES: usize = 500;

/// Lexical strategy: TF-IDF over {document, candidates}, cosine similarity.
pub struct LexicalSimilarity {
    max_features: usize,
}

impl LexicalSimilarity {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features: max_features.max(1),
        }
    }
}

impl Default for LexicalSimilarity {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FEATURES)
    }
}

impl SimilarityProvider for LexicalSimilarity {
    fn method(&self) -> MatchMethod {
        MatchMethod::Tfidf
    }

    fn encode_objectives(&self, _texts: &[&str]) -> Result<ObjectiveEncoding> {
        Ok(ObjectiveEncoding::default())
    }

    fn similarities(&self, document: &Document, candidates: &[&Objective]) -> Result<SimilarityScores> {
        let mut corpus: Vec<&str> = Vec::with_capacity(candidates.len() + 1);
        corpus.push(&document.text);
        corpus.extend(candidates.iter().map(|o| o.text.as_str()));

        let vectors = tfidf_vectors(&corpus, self.max_features);
        let doc_vec = &vectors[0];
        let values = vectors[1..]
            .iter()
            .map(|v| if doc_vec.is_empty() { 0.0 } else { doc_vec.dot(v) })
            .collect();

        Ok(SimilarityScores {
            values,
            usage: Usage::default(),
            chunks: 0,
        })
    }
}

/// L2-normalized TF-IDF vectors for `corpus`.
///
/// Vocabulary: the `max_features` most frequent terms (ties by term order).
/// IDF: `ln((1 + n) / (1 + df)) + 1`.
pub fn tfidf_vectors(corpus: &[&str], max_features: usize) -> Vec<Array1<f64>> {
    let tokenized: Vec<Vec<String>> = corpus.iter().map(|t| tfidf_terms(t)).collect();

    let mut frequency: HashMap<&str, usize> = HashMap::new();
    let mut df: HashMap<&str, usize> = HashMap::new();
    for terms in &tokenized {
        let mut seen: Vec<&str> = Vec::new();
        for term in terms {
            *frequency.entry(term.as_str()).or_insert(0) += 1;
            if !seen.contains(&term.as_str()) {
                seen.push(term.as_str());
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut vocabulary: Vec<(&str, usize)> = frequency.into_iter().collect();
    vocabulary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    vocabulary.truncate(max_features);
    vocabulary.sort_by(|a, b| a.0.cmp(b.0));
    let index: HashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(i, (term, _))| (*term, i))
        .collect();

    let n = corpus.len() as f64;
    let idf: Vec<f64> = vocabulary
        .iter()
        .map(|(term, _)| {
            let d = df.get(term).copied().unwrap_or(0) as f64;
            ((1.0 + n) / (1.0 + d)).ln() + 1.0
        })
        .collect();

    tokenized
        .iter()
        .map(|terms| {
            let mut v = Array1::<f64>::zeros(vocabulary.len());
            for term in terms {
                if let Some(&i) = index.get(term.as_str()) {
                    v[i] += 1.0;
                }
            }
            for (i, w) in idf.iter().enumerate() {
                v[i] *= w;
            }
            let norm = v.dot(&v).sqrt();
            if norm > 0.0 {
                v /= norm;
            }
            v
        })
        .collect()
}
