//! Hybrid scorer and decision gate.
//!
//! ```text
//! score = embed_weight * similarity
//!       + lexical_weight * jaccard(doc_keywords, objective_keywords)
//!       + min(acronym_boost_max, acronym_boost_per_match * shared_acronyms)
//! ```
//!
//! The boost sits on top of weights that sum to 1, so scores can exceed 1.
//! A document is attributed only when the best score clears the score
//! threshold and leads the runner-up by at least the margin threshold.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use goalmap_core::ScoringConfig;
use goalmap_ingest::Document;

use crate::catalog::Objective;
use crate::types::*;

/// Jaccard index of two sets; 0.0 when both are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Scorer combining similarity, keyword overlap, and acronym boost.
#[derive(Debug, Clone)]
pub struct HybridScorer {
    config: ScoringConfig,
}

impl HybridScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Acronym boost for `shared` matching acronyms.
    pub fn acronym_boost(&self, shared: usize) -> f64 {
        (self.config.acronym_boost_per_match * shared as f64).min(self.config.acronym_boost_max)
    }

    /// Hybrid score from its components.
    pub fn combine(&self, similarity: f64, lexical: f64, shared_acronyms: usize) -> f64 {
        self.config.embed_weight * similarity
            + self.config.lexical_weight * lexical
            + self.acronym_boost(shared_acronyms)
    }

    /// Score one objective against a document.
    pub fn score(&self, similarity: f64, document: &Document, objective: &Objective) -> ScoredCandidate {
        let lexical = jaccard(&document.keywords, &objective.keywords);
        let shared_acronyms = document.acronyms.intersection(&objective.acronyms).count();
        ScoredCandidate {
            index: objective.index,
            similarity,
            lexical,
            shared_acronyms,
            acronym_boost: self.acronym_boost(shared_acronyms),
            score: self.combine(similarity, lexical, shared_acronyms),
        }
    }

    /// Score all candidates and sort best first (ties: lower catalog index first).
    pub fn rank(
        &self,
        document: &Document,
        candidates: &[&Objective],
        similarities: &[f64],
    ) -> Vec<ScoredCandidate> {
        let mut ranked: Vec<ScoredCandidate> = candidates
            .iter()
            .zip(similarities)
            .map(|(objective, &similarity)| self.score(similarity, document, objective))
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.index.cmp(&b.index))
        });
        ranked
    }

    /// Apply the score + margin gate to a ranked list.
    pub fn decide(&self, ranked: &[ScoredCandidate]) -> Decision {
        let Some(best) = ranked.first() else {
            return Decision::Reject {
                reason: RejectReason::NoCandidates,
                best_score: 0.0,
                margin: 0.0,
            };
        };
        let margin = match ranked.get(1) {
            Some(second) => best.score - second.score,
            None => 1.0,
        }
        .clamp(0.0, 1.0);

        if best.score < self.config.score_threshold {
            return Decision::Reject {
                reason: RejectReason::LowScore,
                best_score: best.score,
                margin,
            };
        }
        if margin < self.config.margin_threshold {
            return Decision::Reject {
                reason: RejectReason::LowMargin,
                best_score: best.score,
                margin,
            };
        }

        Decision::Accept {
            index: best.index,
            confidence: best.score.clamp(0.0, 1.0),
            margin,
        }
    }
}

impl Default for HybridScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ObjectiveCatalog, ObjectiveInput};
    use crate::similarity::LexicalSimilarity;

    fn catalog(texts: &[&str]) -> ObjectiveCatalog {
        let rows = texts.iter().map(|t| ObjectiveInput::new(t, "")).collect();
        ObjectiveCatalog::build("alice", rows, &LexicalSimilarity::default()).unwrap()
    }

    fn candidate(index: usize, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            index,
            similarity: score,
            lexical: 0.0,
            shared_acronyms: 0,
            acronym_boost: 0.0,
            score,
        }
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<String> = ["esr", "rollout"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["esr", "cost"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_combine_defaults() {
        let scorer = HybridScorer::default();
        let s = scorer.combine(0.5, 0.25, 1);
        assert!((s - (0.88 * 0.5 + 0.12 * 0.25 + 0.08)).abs() < 1e-12);
        // Boost caps at 0.24.
        assert!((scorer.acronym_boost(10) - 0.24).abs() < 1e-12);
        // Boost can push past 1.0.
        assert!(scorer.combine(1.0, 1.0, 3) > 1.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = HybridScorer::default();
        let catalog = catalog(&["ESR migration rollout"]);
        let doc = Document::from_text("pr-1", "ESR rollout for the migration".into());
        let a = scorer.score(0.42, &doc, &catalog.objectives()[0]);
        let b = scorer.score(0.42, &doc, &catalog.objectives()[0]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_score_is_monotone_in_each_signal() {
        let scorer = HybridScorer::default();
        let steps: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        for &base in &steps {
            for w in steps.windows(2) {
                assert!(scorer.combine(w[1], base, 1) >= scorer.combine(w[0], base, 1));
                assert!(scorer.combine(base, w[1], 1) >= scorer.combine(base, w[0], 1));
            }
            for n in 0..6 {
                assert!(scorer.combine(base, base, n + 1) >= scorer.combine(base, base, n));
            }
        }
    }

    #[test]
    fn test_lexical_tiebreak() {
        let scorer = HybridScorer::default();
        let catalog = catalog(&[
            "Payment gateway retries hardening",
            "Quarterly hiring plan",
        ]);
        let doc = Document::from_text("pr-1", "Add payment gateway retries".into());
        let candidates: Vec<&Objective> = catalog.objectives().iter().collect();
        let ranked = scorer.rank(&doc, &candidates, &[0.5, 0.5]);
        assert_eq!(ranked[0].index, 0);
        assert!(ranked[0].score > ranked[1].score);
        assert_eq!(ranked[1].lexical, 0.0);
    }

    #[test]
    fn test_rank_ties_prefer_lower_index() {
        let scorer = HybridScorer::default();
        let catalog = catalog(&["alpha", "beta"]);
        let doc = Document::from_text("pr-1", "gamma".into());
        let candidates: Vec<&Objective> = catalog.objectives().iter().collect();
        let ranked = scorer.rank(&doc, &candidates, &[0.6, 0.6]);
        assert_eq!(ranked[0].index, 0);
        assert_eq!(scorer.decide(&ranked), Decision::Reject {
            reason: RejectReason::LowMargin,
            best_score: ranked[0].score,
            margin: 0.0,
        });
    }

    #[test]
    fn test_gate_requires_score_and_margin() {
        let scorer = HybridScorer::default();
        let cases = [
            (0.30, 0.00, false), // low score
            (0.32, 0.10, false), // low score, wide margin
            (0.90, 0.88, false), // high score, near tie
            (0.50, 0.46, true),
            (0.34, 0.00, true),
        ];
        for (s1, s2, accept) in cases {
            let d = scorer.decide(&[candidate(0, s1), candidate(1, s2)]);
            assert_eq!(d.is_accept(), accept, "s1={} s2={}", s1, s2);
        }
    }

    #[test]
    fn test_gate_property_sweep() {
        let scorer = HybridScorer::default();
        let cfg = scorer.config().clone();
        for i in 0..=60 {
            for j in 0..=i {
                let s1 = i as f64 / 50.0;
                let s2 = j as f64 / 50.0;
                let d = scorer.decide(&[candidate(0, s1), candidate(1, s2)]);
                if s1 < cfg.score_threshold || (s1 - s2) < cfg.margin_threshold {
                    assert!(!d.is_accept(), "s1={} s2={}", s1, s2);
                }
            }
        }
    }

    #[test]
    fn test_single_candidate_margin_is_one() {
        let scorer = HybridScorer::default();
        match scorer.decide(&[candidate(3, 1.2)]) {
            Decision::Accept {
                index,
                confidence,
                margin,
            } => {
                assert_eq!(index, 3);
                assert_eq!(confidence, 1.0);
                assert_eq!(margin, 1.0);
            }
            other => panic!("expected accept, got {:?}", other),
        }
    }

    #[test]
    fn test_no_candidates() {
        let d = HybridScorer::default().decide(&[]);
        assert!(matches!(
            d,
            Decision::Reject {
                reason: RejectReason::NoCandidates,
                ..
            }
        ));
    }
}
