//! GoalMap Ingest: document composition, term extraction, long-document chunking.

pub mod chunking;
pub mod extract;

pub use chunking::{estimate_tokens, TextChunk, TokenChunker};
pub use extract::{
    compose_text, extract_acronyms, extract_keywords, tfidf_terms, truncate_chars, Document,
    DocumentFragments,
};
