//! Document feature extraction.
//!
//! Composes the bounded classification text of a work artifact from its raw
//! fragments (title, body, comments, filenames, diff snippets) and derives the
//! acronym and keyword sets used by the pruner and the hybrid scorer.

pub mod terms;

use std::collections::BTreeSet;

use goalmap_core::FeatureLimits;
use serde::{Deserialize, Serialize};

pub use terms::{extract_acronyms, extract_keywords, tfidf_terms, STOP_WORDS};

/// Raw text fragments of one artifact, as delivered by the document source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentFragments {
    pub title: String,
    pub body: String,
    pub comments: Vec<String>,
    pub filenames: Vec<String>,
    pub diffs: Vec<String>,
}

/// A document ready for scoring. Built per classification call, never persisted.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_id: String,
    pub text: String,
    pub acronyms: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
}

impl Document {
    /// Compose the document text under `limits` and derive its term sets.
    pub fn build(source_id: &str, fragments: &DocumentFragments, limits: &FeatureLimits) -> Self {
        let text = compose_text(fragments, limits);
        Self::from_text(source_id, text)
    }

    /// Wrap already-composed text.
    pub fn from_text(source_id: &str, text: String) -> Self {
        let acronyms = extract_acronyms(&text);
        let keywords = extract_keywords(&text);
        Self {
            source_id: source_id.to_string(),
            text,
            acronyms,
            keywords,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Acronyms short enough to be trusted for candidate pruning.
    pub fn strong_acronyms(&self, max_len: usize) -> BTreeSet<&str> {
        self.acronyms
            .iter()
            .filter(|a| a.chars().count() <= max_len)
            .map(|a| a.as_str())
            .collect()
    }
}

/// Join fragments in title, body, comments, filenames, diffs order.
///
/// Each fragment is capped on its own (diffs more tightly than prose), blank
/// fragments are dropped, and the joined text is trimmed and capped overall.
pub fn compose_text(fragments: &DocumentFragments, limits: &FeatureLimits) -> String {
    let mut parts: Vec<&str> = Vec::new();

    let prose = [fragments.title.as_str(), fragments.body.as_str()]
        .into_iter()
        .chain(fragments.comments.iter().map(String::as_str))
        .chain(fragments.filenames.iter().map(String::as_str));
    for part in prose {
        let capped = truncate_chars(part, limits.max_fragment_chars);
        if !capped.trim().is_empty() {
            parts.push(capped);
        }
    }
    for diff in &fragments.diffs {
        let capped = truncate_chars(diff, limits.max_diff_chars);
        if !capped.trim().is_empty() {
            parts.push(capped);
        }
    }

    let joined = parts.join("\n");
    truncate_chars(joined.trim(), limits.max_document_chars).to_string()
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> FeatureLimits {
        FeatureLimits::default()
    }

    #[test]
    fn test_compose_order_and_joining() {
        let fragments = DocumentFragments {
            title: "Add ESR failover".into(),
            body: "Retries on timeout".into(),
            comments: vec!["LGTM".into(), "".into()],
            filenames: vec!["src/esr.rs".into()],
            diffs: vec!["+ retry()".into()],
        };
        let text = compose_text(&fragments, &limits());
        assert_eq!(
            text,
            "Add ESR failover\nRetries on timeout\nLGTM\nsrc/esr.rs\n+ retry()"
        );
    }

    #[test]
    fn test_diff_cap() {
        let fragments = DocumentFragments {
            diffs: vec!["x".repeat(2000)],
            ..Default::default()
        };
        let text = compose_text(&fragments, &limits());
        assert_eq!(text.len(), 800);
    }

    #[test]
    fn test_overall_cap() {
        let fragments = DocumentFragments {
            comments: (0..10).map(|_| "y".repeat(4000)).collect(),
            ..Default::default()
        };
        let text = compose_text(&fragments, &limits());
        assert_eq!(text.chars().count(), 20_000);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 2), "hé");
        assert_eq!(truncate_chars(s, 100), s);
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_empty_fragments_give_empty_document() {
        let doc = Document::build("pr-1", &DocumentFragments::default(), &limits());
        assert!(doc.is_empty());
        assert!(doc.acronyms.is_empty());
        assert!(doc.keywords.is_empty());
    }

    #[test]
    fn test_document_term_sets() {
        let doc = Document::from_text("pr-2", "Implemented ESR failover retry logic".into());
        assert!(doc.acronyms.contains("ESR"));
        assert!(doc.keywords.contains("failover"));
        assert!(doc.keywords.contains("esr"));
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_strong_acronyms_filter_length() {
        let doc = Document::from_text("pr-3", "ESR and KUBERNETES rollout".into());
        let strong = doc.strong_acronyms(8);
        assert!(strong.contains("ESR"));
        assert!(!strong.contains("KUBERNETES"));
    }
}
