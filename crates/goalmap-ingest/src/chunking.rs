//! Token-window chunking for long documents.
//!
//! Token counts are estimated from character counts (no tokenizer is loaded).
//! Documents whose estimate exceeds the embedding input limit are split into
//! overlapping windows; the number of windows is bounded so a pathological
//! document cannot multiply embedding cost without limit.

use goalmap_core::ChunkingConfig;
use tracing::debug;

/// A window of the document text with character positions.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

/// Splits text into overlapping token windows.
#[derive(Debug, Clone)]
pub struct TokenChunker {
    pub max_tokens: usize,
    pub chunk_tokens: usize,
    pub overlap_tokens: usize,
    pub max_chunks: usize,
    pub chars_per_token: usize,
}

impl TokenChunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            chunk_tokens: config.chunk_tokens,
            overlap_tokens: config.overlap_tokens,
            max_chunks: config.max_chunks.max(1),
            chars_per_token: config.chars_per_token.max(1),
        }
    }

    /// Rough token estimate (`chars / chars_per_token`).
    pub fn estimate_tokens(&self, text: &str) -> usize {
        estimate_tokens(text, self.chars_per_token)
    }

    /// Whether `text` is over the single-request limit.
    pub fn needs_chunking(&self, text: &str) -> bool {
        self.estimate_tokens(text) > self.max_tokens
    }

    /// Split `text` into windows. Text within the limit comes back as one chunk.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        if !self.needs_chunking(text) {
            return vec![TextChunk {
                text: text.to_string(),
                chunk_index: 0,
                start_char: 0,
                end_char: text.chars().count(),
            }];
        }

        // Byte offset of every char, plus the end of the string.
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let total_chars = offsets.len();
        offsets.push(text.len());

        let window = self.chunk_tokens * self.chars_per_token;
        let step = self.chunk_tokens.saturating_sub(self.overlap_tokens).max(1) * self.chars_per_token;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < total_chars && chunks.len() < self.max_chunks {
            let end = (start + window).min(total_chars);
            chunks.push(TextChunk {
                text: text[offsets[start]..offsets[end]].to_string(),
                chunk_index: chunks.len(),
                start_char: start,
                end_char: end,
            });
            if end == total_chars {
                break;
            }
            start += step;
        }

        if chunks.last().is_some_and(|c| c.end_char < total_chars) {
            debug!(
                "Chunk limit {} reached, {} trailing chars not embedded",
                self.max_chunks,
                total_chars - chunks.last().map(|c| c.end_char).unwrap_or(0)
            );
        }

        chunks
    }
}

impl Default for TokenChunker {
    fn default() -> Self {
        Self::new(&ChunkingConfig::default())
    }
}

/// Rough token estimate for `text`.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    text.chars().count() / chars_per_token.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_chunker() -> TokenChunker {
        TokenChunker::new(&ChunkingConfig {
            max_tokens: 10,
            chunk_tokens: 8,
            overlap_tokens: 2,
            max_chunks: 4,
            chars_per_token: 1,
        })
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TokenChunker::default();
        let chunks = chunker.chunk("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].end_char, 13);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("abcdefgh", 4), 2);
        assert_eq!(estimate_tokens("", 4), 0);
        let chunker = TokenChunker::default();
        assert!(!chunker.needs_chunking(&"x".repeat(32_000)));
        assert!(chunker.needs_chunking(&"x".repeat(32_004)));
    }

    #[test]
    fn test_windows_overlap() {
        let chunker = small_chunker();
        let text = "abcdefghijklmnopqrst"; // 20 chars
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].text, "abcdefgh");
        assert_eq!(chunks[1].start_char, 6);
        assert_eq!(chunks[1].text, "ghijklmn");
        // Last window reaches the end of the text.
        assert_eq!(chunks.last().unwrap().end_char, 20);
    }

    #[test]
    fn test_chunk_count_bounded() {
        let chunker = small_chunker();
        let text = "z".repeat(500);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.last().unwrap().end_char < 500);
    }

    #[test]
    fn test_multibyte_text() {
        let chunker = small_chunker();
        let text = "ééééééééééééééé"; // 15 two-byte chars
        let chunks = chunker.chunk(text);
        assert_eq!(chunks[0].text.chars().count(), 8);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[test]
    fn test_document_cap_gates_chunking() {
        use crate::extract::{compose_text, DocumentFragments};
        use goalmap_core::FeatureLimits;

        let fragments = DocumentFragments {
            title: "t".repeat(10_000),
            body: "b".repeat(10_000),
            comments: vec!["c".repeat(20_000); 4],
            ..Default::default()
        };
        let chunker = TokenChunker::default();

        let capped = compose_text(&fragments, &FeatureLimits::default());
        assert!(!chunker.needs_chunking(&capped));

        let raised = FeatureLimits {
            max_document_chars: 40_000,
            max_fragment_chars: 20_000,
            ..Default::default()
        };
        let long = compose_text(&fragments, &raised);
        assert!(chunker.needs_chunking(&long));
        assert_eq!(chunker.chunk(&long).len(), 2);
    }

    #[test]
    fn test_default_chunk_sizes() {
        let chunker = TokenChunker::default();
        let text = "w".repeat(40_000);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.len(), 28_000);
        assert_eq!(chunks[1].start_char, 26_800);
        assert_eq!(chunks[1].end_char, 40_000);
    }
}
