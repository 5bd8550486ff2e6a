//! Document matcher: prune, measure similarity, score, decide.

use std::sync::Arc;

use goalmap_core::{Result, ScoringConfig};
use goalmap_ingest::Document;
use goalmap_store::MatchMethod;
use tracing::debug;

use crate::catalog::{ObjectiveCatalog, ObjectiveInput};
use crate::hybrid::HybridScorer;
use crate::pruner::CandidatePruner;
use crate::similarity::SimilarityProvider;
use crate::types::*;

/// Matches documents against a user's catalog with one similarity strategy.
pub struct DocumentMatcher {
    similarity: Arc<dyn SimilarityProvider>,
    pruner: CandidatePruner,
    scorer: HybridScorer,
}

impl DocumentMatcher {
    pub fn new(similarity: Arc<dyn SimilarityProvider>, scoring: &ScoringConfig) -> Self {
        Self {
            similarity,
            pruner: CandidatePruner::new(scoring.strong_acronym_max_len),
            scorer: HybridScorer::new(scoring.clone()),
        }
    }

    /// Method tag for objective matches produced by this matcher.
    pub fn method(&self) -> MatchMethod {
        self.similarity.method()
    }

    /// Build the catalog for `user` with this matcher's strategy.
    pub fn build_catalog(&self, user: &str, rows: Vec<ObjectiveInput>) -> Result<ObjectiveCatalog> {
        ObjectiveCatalog::build(user, rows, self.similarity.as_ref())
    }

    /// Match one non-empty document.
    pub fn match_document(&self, document: &Document, catalog: &ObjectiveCatalog) -> Result<MatchDecision> {
        let pruned = self.pruner.prune(document, catalog);
        let scores = self.similarity.similarities(document, &pruned.candidates)?;
        let ranked = self.scorer.rank(document, &pruned.candidates, &scores.values);
        let decision = self.scorer.decide(&ranked);

        debug!(
            "{}: {:?} (filter={}, candidates={}, top={:?})",
            document.source_id,
            decision,
            pruned.filter.as_str(),
            ranked.len(),
            ranked.first().map(|c| c.score)
        );

        Ok(MatchDecision {
            decision,
            ranked,
            filter: pruned.filter,
            usage: scores.usage,
            chunks: scores.chunks,
        })
    }
}
