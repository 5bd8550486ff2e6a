//! GoalMap Infer: embedding providers, usage metering, zero-shot fallback.
//!
//! Provides the `EmbedderBackend` trait for generating embeddings.
//! When an API key is configured, `OpenAiEmbedder` calls an OpenAI-compatible
//! `/embeddings` endpoint. Without one, no embedder is built and matching
//! falls back to TF-IDF.

pub mod embedder;
pub mod fallback;
pub mod openai;
pub mod usage;
pub mod zero_shot;

pub use embedder::{cosine_similarity, normalize, EmbedderBackend, EmbeddingBatch};
pub use fallback::{ClassifierFactory, FallbackClassifier, FallbackMethod, FallbackOutcome};
pub use openai::OpenAiEmbedder;
pub use usage::{Usage, UsageMeter};
pub use zero_shot::{
    EmbeddingZeroShot, KeywordZeroShot, ZeroShotClassifier, ZeroShotPrediction,
};

use std::sync::Arc;

use goalmap_core::{EmbeddingConfig, Error, FallbackConfig, FallbackStrategy, Result};

/// Create the configured embedder, or `None` when embeddings are disabled.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Option<Arc<dyn EmbedderBackend>>> {
    if !config.is_enabled() {
        tracing::info!("No embedding provider configured. Using TF-IDF similarity.");
        return Ok(None);
    }
    let embedder = OpenAiEmbedder::new(config)?;
    tracing::info!("Using OpenAI embedder (model={})", config.model);
    Ok(Some(Arc::new(embedder)))
}

/// Create the fallback classifier for `config`.
///
/// The backend itself is not built until the first non-empty document needs it.
pub fn create_fallback_classifier(
    config: &FallbackConfig,
    embedder: Option<Arc<dyn EmbedderBackend>>,
) -> FallbackClassifier {
    let strategy = match (config.strategy, embedder.is_some()) {
        (FallbackStrategy::Auto, true) => FallbackStrategy::Embedding,
        (FallbackStrategy::Auto, false) => FallbackStrategy::Keyword,
        (s, _) => s,
    };

    match strategy {
        FallbackStrategy::Disabled => FallbackClassifier::disabled(config),
        FallbackStrategy::Keyword => {
            let default_label = config.default_label.clone();
            FallbackClassifier::new(
                config,
                Box::new(move || {
                    Ok(Box::new(KeywordZeroShot::new(&default_label)) as Box<dyn ZeroShotClassifier>)
                }),
            )
        }
        FallbackStrategy::Embedding | FallbackStrategy::Auto => {
            let labels = config.labels.clone();
            FallbackClassifier::new(
                config,
                Box::new(move || {
                    let embedder = embedder.clone().ok_or_else(|| {
                        Error::Config("embedding fallback requires an embedding provider".into())
                    })?;
                    Ok(Box::new(EmbeddingZeroShot::new(embedder, &labels)?)
                        as Box<dyn ZeroShotClassifier>)
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_key_means_no_embedder() {
        let config = EmbeddingConfig::default();
        assert!(create_embedder(&config).unwrap().is_none());
    }

    #[test]
    fn test_keyword_fallback_without_embedder() {
        let classifier = create_fallback_classifier(&FallbackConfig::default(), None);
        let out = classifier.classify("Bump lodash version via dependabot");
        assert_eq!(out.label, "dependency-updates");
        assert_eq!(out.method, FallbackMethod::ZeroShot);
    }

    #[test]
    fn test_embedding_fallback_without_embedder_degrades() {
        let config = FallbackConfig {
            strategy: FallbackStrategy::Embedding,
            ..Default::default()
        };
        let classifier = create_fallback_classifier(&config, None);
        let out = classifier.classify("Bump lodash");
        assert_eq!(out, classifier.default_outcome());
    }
}
