//! Resolver types.

use goalmap_infer::Usage;
use goalmap_store::CandidateFilter;
use serde::Serialize;

/// Score breakdown for one candidate objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredCandidate {
    /// Catalog index of the objective.
    pub index: usize,
    pub similarity: f64,
    /// Keyword Jaccard overlap.
    pub lexical: f64,
    pub shared_acronyms: usize,
    pub acronym_boost: f64,
    pub score: f64,
}

/// Why the gate rejected a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoCandidates,
    LowScore,
    LowMargin,
}

/// Outcome of the score + margin gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Accept {
        index: usize,
        /// Best score clamped to [0, 1].
        confidence: f64,
        /// Best minus runner-up, clamped to [0, 1]; 1.0 for a single candidate.
        margin: f64,
    },
    Reject {
        reason: RejectReason,
        best_score: f64,
        margin: f64,
    },
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept { .. })
    }
}

/// Full result of matching one document against a catalog.
#[derive(Debug, Clone, Serialize)]
pub struct MatchDecision {
    pub decision: Decision,
    /// Candidates ranked best first.
    pub ranked: Vec<ScoredCandidate>,
    pub filter: CandidateFilter,
    pub usage: Usage,
    pub chunks: usize,
}
