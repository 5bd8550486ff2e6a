//! Provider handles injected into the batch runner.

use std::sync::Arc;

use goalmap_core::{GoalMapConfig, Result};
use goalmap_infer::{create_embedder, create_fallback_classifier, FallbackClassifier, UsageMeter};
use goalmap_ingest::TokenChunker;
use goalmap_resolve::{DocumentMatcher, EmbeddingSimilarity, LexicalSimilarity, SimilarityProvider};
use goalmap_store::{CheckpointStore, MatchResultStore};
use tracing::info;

use crate::sources::{DocumentSource, ObjectiveSource};

/// Matching and fallback services plus the run's usage meter.
pub struct Providers {
    pub matcher: DocumentMatcher,
    pub fallback: FallbackClassifier,
    pub meter: Arc<UsageMeter>,
}

impl Providers {
    pub fn new(matcher: DocumentMatcher, fallback: FallbackClassifier, meter: Arc<UsageMeter>) -> Self {
        Self {
            matcher,
            fallback,
            meter,
        }
    }

    /// Select the similarity strategy once: embeddings when a provider is
    /// configured, TF-IDF otherwise.
    pub fn from_config(config: &GoalMapConfig) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;

        let meter = Arc::new(match &embedder {
            Some(e) => UsageMeter::new(e.model(), &config.embedding.pricing),
            None => UsageMeter::free(),
        });

        let similarity: Arc<dyn SimilarityProvider> = match &embedder {
            Some(e) => Arc::new(EmbeddingSimilarity::new(
                e.clone(),
                TokenChunker::new(&config.chunking),
                meter.clone(),
            )),
            None => Arc::new(LexicalSimilarity::default()),
        };
        info!("Similarity strategy: {}", similarity.method().as_str());

        let matcher = DocumentMatcher::new(similarity, &config.scoring);
        let fallback = create_fallback_classifier(&config.fallback, embedder);

        Ok(Self::new(matcher, fallback, meter))
    }
}

/// Checkpoint and result persistence.
#[derive(Clone)]
pub struct Stores {
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub results: Arc<dyn MatchResultStore>,
}

impl Stores {
    /// Use one backend for both concerns.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CheckpointStore + MatchResultStore + 'static,
    {
        Self {
            checkpoints: store.clone(),
            results: store,
        }
    }
}

/// External document and objective sources.
#[derive(Clone)]
pub struct Sources {
    pub documents: Arc<dyn DocumentSource>,
    pub objectives: Arc<dyn ObjectiveSource>,
}
