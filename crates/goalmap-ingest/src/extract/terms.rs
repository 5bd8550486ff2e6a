//! Term extraction: acronyms, keywords, and TF-IDF tokens.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// All-caps tokens of 2–10 characters (leading letter, then letters or digits).
static ACRONYM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][A-Z0-9]{1,9}\b").expect("static acronym pattern"));

static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static keyword pattern"));

/// Word tokens of two or more characters, as used by the lexical vector space.
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("static word pattern"));

/// Minimum keyword length.
pub const MIN_KEYWORD_LEN: usize = 3;

/// English stop words removed before building TF-IDF vectors.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
    "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
    "during", "each", "few", "for", "from", "further", "had", "has", "have", "having",
    "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "if", "in",
    "into", "is", "it", "its", "itself", "just", "may", "me", "might", "more", "most",
    "must", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "shall",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "upon", "us", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "would", "you", "your", "yours", "yourself", "yourselves",
];

static STOP_SET: Lazy<BTreeSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());

/// Acronym set of `text`.
pub fn extract_acronyms(text: &str) -> BTreeSet<String> {
    ACRONYM_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Lowercase alphanumeric tokens of at least [`MIN_KEYWORD_LEN`] characters.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    KEYWORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| t.len() >= MIN_KEYWORD_LEN)
        .map(str::to_string)
        .collect()
}

/// Lowercased word tokens with stop words removed, in text order (duplicates kept).
pub fn tfidf_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !STOP_SET.contains(*t))
        .map(str::to_string)
        .collect()
}
