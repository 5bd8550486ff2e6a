//! Zero-shot classifiers over a caller-supplied label set.
//!
//! - `EmbeddingZeroShot`: embeds one hypothesis sentence per label and takes a
//!   softmax over cosine similarities with the text.
//! - `KeywordZeroShot`: counts lexicon hits per label; needs no provider.

use std::collections::HashMap;
use std::sync::Arc;

use goalmap_core::{Error, Result};
use goalmap_ingest::extract_keywords;
use ndarray::Array1;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::embedder::{cosine_similarity, EmbedderBackend};

/// Best label and its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroShotPrediction {
    pub label: String,
    pub score: f64,
    /// Provider tokens spent on the text (0 for local classifiers).
    pub tokens: usize,
}

/// Trait for zero-shot classification backends.
pub trait ZeroShotClassifier: Send + Sync {
    fn classify(&self, text: &str, labels: &[String]) -> Result<ZeroShotPrediction>;
}

/// Softmax temperature for cosine similarities (which live in a narrow band).
const SOFTMAX_TEMPERATURE: f64 = 0.05;

/// Hypothesis sentence for a label.
pub fn hypothesis(label: &str) -> String {
    format!("This change is about {}.", label.replace(['-', '_'], " "))
}

/// Zero-shot classification by embedding similarity to label hypotheses.
pub struct EmbeddingZeroShot {
    embedder: Arc<dyn EmbedderBackend>,
    label_vectors: Mutex<HashMap<String, Array1<f32>>>,
}

impl EmbeddingZeroShot {
    /// Embed the hypotheses for `labels` up front.
    pub fn new(embedder: Arc<dyn EmbedderBackend>, labels: &[String]) -> Result<Self> {
        let classifier = Self {
            embedder,
            label_vectors: Mutex::new(HashMap::new()),
        };
        classifier.ensure_labels(labels)?;
        Ok(classifier)
    }

    fn ensure_labels(&self, labels: &[String]) -> Result<()> {
        let missing: Vec<&String> = {
            let cached = self.label_vectors.lock();
            labels.iter().filter(|l| !cached.contains_key(*l)).collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        let hypotheses: Vec<String> = missing.iter().map(|l| hypothesis(l)).collect();
        let refs: Vec<&str> = hypotheses.iter().map(String::as_str).collect();
        let batch = self.embedder.embed_batch(&refs)?;
        if batch.vectors.len() != missing.len() {
            return Err(Error::Classifier(format!(
                "Expected {} label embeddings, got {}",
                missing.len(),
                batch.vectors.len()
            )));
        }
        debug!("Embedded {} label hypotheses", missing.len());

        let mut cached = self.label_vectors.lock();
        for (label, vector) in missing.into_iter().zip(batch.vectors) {
            cached.insert(label.clone(), vector);
        }
        Ok(())
    }
}

impl ZeroShotClassifier for EmbeddingZeroShot {
    fn classify(&self, text: &str, labels: &[String]) -> Result<ZeroShotPrediction> {
        if labels.is_empty() {
            return Err(Error::Classifier("No labels".into()));
        }
        self.ensure_labels(labels)?;
        let (text_vec, tokens) = self.embedder.embed(text)?;

        let cached = self.label_vectors.lock();
        let sims: Vec<f64> = labels
            .iter()
            .map(|l| {
                cached
                    .get(l)
                    .map(|v| cosine_similarity(&text_vec, v) as f64)
                    .unwrap_or(0.0)
            })
            .collect();
        let mut prediction = best_of(labels, &softmax(&sims, SOFTMAX_TEMPERATURE));
        prediction.tokens = tokens;
        Ok(prediction)
    }
}

/// Label → indicative keywords.
static LEXICON: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    m.insert(
        "cleanup",
        &[
            "cleanup", "clean", "remove", "removed", "removes", "unused", "dead", "delete",
            "deleted", "lint", "linter", "typo", "typos", "format", "formatting", "tidy",
            "deprecated", "obsolete", "whitespace", "leftover",
        ],
    );
    m.insert(
        "dependency-updates",
        &[
            "bump", "bumps", "bumped", "upgrade", "upgrades", "upgraded", "dependency",
            "dependencies", "deps", "version", "versions", "renovate", "dependabot",
            "lockfile", "package", "requirements", "npm", "cargo", "pom", "gradle",
        ],
    );
    m.insert(
        "refactoring",
        &[
            "refactor", "refactoring", "refactored", "rename", "renamed", "extract",
            "extracted", "restructure", "restructured", "simplify", "simplified",
            "reorganize", "reorganized", "move", "moved", "split", "decouple", "modularize",
        ],
    );
    m
});

/// Baseline weight of the label that wins when nothing matches.
const DEFAULT_LABEL_PRIOR: f64 = 0.5;
/// Smoothing added to every label.
const SMOOTHING: f64 = 0.1;

/// Lexicon-based zero-shot classifier.
pub struct KeywordZeroShot {
    default_label: String,
}

impl KeywordZeroShot {
    pub fn new(default_label: &str) -> Self {
        Self {
            default_label: default_label.to_string(),
        }
    }

    fn hits(label: &str, keywords: &std::collections::BTreeSet<String>) -> usize {
        match LEXICON.get(label) {
            Some(words) => words.iter().filter(|w| keywords.contains(**w)).count(),
            // Unknown labels match on their own words.
            None => extract_keywords(label)
                .iter()
                .filter(|w| keywords.contains(*w))
                .count(),
        }
    }
}

impl ZeroShotClassifier for KeywordZeroShot {
    fn classify(&self, text: &str, labels: &[String]) -> Result<ZeroShotPrediction> {
        if labels.is_empty() {
            return Err(Error::Classifier("No labels".into()));
        }
        let keywords = extract_keywords(text);
        let weights: Vec<f64> = labels
            .iter()
            .map(|l| {
                let prior = if *l == self.default_label {
                    DEFAULT_LABEL_PRIOR
                } else {
                    0.0
                };
                Self::hits(l, &keywords) as f64 + prior + SMOOTHING
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let probs: Vec<f64> = weights.iter().map(|w| w / total).collect();
        Ok(best_of(labels, &probs))
    }
}

/// Temperature-scaled softmax.
pub fn softmax(values: &[f64], temperature: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let t = if temperature > 0.0 { temperature } else { 1.0 };
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| ((v - max) / t).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Highest-probability label; ties go to the earlier label.
fn best_of(labels: &[String], probs: &[f64]) -> ZeroShotPrediction {
    let mut best = 0;
    for (i, p) in probs.iter().enumerate() {
        if *p > probs[best] {
            best = i;
        }
    }
    ZeroShotPrediction {
        label: labels[best].clone(),
        score: probs[best],
        tokens: 0,
    }
}
