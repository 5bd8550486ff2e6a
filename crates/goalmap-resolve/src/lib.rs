//! Resolvers: attribute a document to one of a user's objectives.
//!
//! The catalog is built once per user; each document is pruned by acronym,
//! scored with one similarity strategy plus keyword and acronym signals, and
//! either accepted as an objective match or handed back for fallback.

pub mod catalog;
pub mod hybrid;
pub mod matcher;
pub mod pruner;
pub mod similarity;
pub mod types;

pub use catalog::{forward_fill, Objective, ObjectiveCatalog, ObjectiveInput};
pub use hybrid::{jaccard, HybridScorer};
pub use matcher::DocumentMatcher;
pub use pruner::{CandidatePruner, PrunedCandidates};
pub use similarity::{
    tfidf_vectors, EmbeddingSimilarity, LexicalSimilarity, ObjectiveEncoding, SimilarityProvider,
    SimilarityScores,
};
pub use types::*;
