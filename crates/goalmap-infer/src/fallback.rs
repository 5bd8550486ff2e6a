//! Fallback classification for documents the decision gate rejects.
//!
//! The zero-shot backend is built on first use. Every failure path (factory
//! error, call error, out-of-set label, non-finite score) answers with the
//! default label at confidence 1.0 so one document can never abort a batch.

use goalmap_core::{FallbackConfig, Result};
use goalmap_ingest::truncate_chars;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::zero_shot::ZeroShotClassifier;

/// Builds the zero-shot backend. Called at most once per `FallbackClassifier`.
pub type ClassifierFactory = Box<dyn Fn() -> Result<Box<dyn ZeroShotClassifier>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMethod {
    /// The zero-shot backend answered.
    ZeroShot,
    /// Deterministic default label.
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    pub label: String,
    pub confidence: f64,
    pub method: FallbackMethod,
    pub tokens: usize,
}

pub struct FallbackClassifier {
    labels: Vec<String>,
    default_label: String,
    max_chars: usize,
    factory: Option<ClassifierFactory>,
    classifier: OnceCell<Option<Box<dyn ZeroShotClassifier>>>,
}

impl FallbackClassifier {
    pub fn new(config: &FallbackConfig, factory: ClassifierFactory) -> Self {
        Self {
            labels: config.labels.clone(),
            default_label: config.default_label.clone(),
            max_chars: config.max_chars,
            factory: Some(factory),
            classifier: OnceCell::new(),
        }
    }

    /// A classifier that always answers with the default label.
    pub fn disabled(config: &FallbackConfig) -> Self {
        Self {
            labels: config.labels.clone(),
            default_label: config.default_label.clone(),
            max_chars: config.max_chars,
            factory: None,
            classifier: OnceCell::new(),
        }
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    /// Whether the backend has been built (successfully or not).
    pub fn is_initialized(&self) -> bool {
        self.classifier.get().is_some()
    }

    pub fn default_outcome(&self) -> FallbackOutcome {
        FallbackOutcome {
            label: self.default_label.clone(),
            confidence: 1.0,
            method: FallbackMethod::Default,
            tokens: 0,
        }
    }

    fn backend(&self) -> Option<&dyn ZeroShotClassifier> {
        self.classifier
            .get_or_init(|| {
                let factory = self.factory.as_ref()?;
                match factory() {
                    Ok(classifier) => {
                        info!("Fallback classifier ready ({} labels)", self.labels.len());
                        Some(classifier)
                    }
                    Err(e) => {
                        warn!("Fallback classifier unavailable, using default label: {}", e);
                        None
                    }
                }
            })
            .as_deref()
    }

    /// Best label for `text`, or the default label on any failure.
    pub fn classify(&self, text: &str) -> FallbackOutcome {
        if text.trim().is_empty() || self.labels.is_empty() {
            return self.default_outcome();
        }
        let Some(backend) = self.backend() else {
            return self.default_outcome();
        };

        let input = truncate_chars(text, self.max_chars);
        match backend.classify(input, &self.labels) {
            Ok(prediction) if !self.labels.contains(&prediction.label) => {
                warn!("Zero-shot returned unknown label '{}'", prediction.label);
                self.default_outcome()
            }
            Ok(prediction) if !prediction.score.is_finite() => {
                warn!("Zero-shot returned non-finite score for '{}'", prediction.label);
                self.default_outcome()
            }
            Ok(prediction) => {
                debug!("Zero-shot: {} ({:.3})", prediction.label, prediction.score);
                FallbackOutcome {
                    label: prediction.label,
                    confidence: prediction.score.clamp(0.0, 1.0),
                    method: FallbackMethod::ZeroShot,
                    tokens: prediction.tokens,
                }
            }
            Err(e) => {
                warn!("Zero-shot classification failed: {}", e);
                self.default_outcome()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_shot::ZeroShotPrediction;
    use goalmap_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        label: &'static str,
        score: f64,
        calls: Arc<AtomicUsize>,
        seen_len: Arc<AtomicUsize>,
    }

    impl ZeroShotClassifier for Fixed {
        fn classify(&self, text: &str, _labels: &[String]) -> Result<ZeroShotPrediction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_len.store(text.chars().count(), Ordering::SeqCst);
            Ok(ZeroShotPrediction {
                label: self.label.to_string(),
                score: self.score,
                tokens: 7,
            })
        }
    }

    struct Failing;

    impl ZeroShotClassifier for Failing {
        fn classify(&self, _text: &str, _labels: &[String]) -> Result<ZeroShotPrediction> {
            Err(Error::Classifier("model crashed".into()))
        }
    }

    struct Probe {
        builds: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
        seen_len: Arc<AtomicUsize>,
    }

    fn fixed(label: &'static str, score: f64) -> (FallbackClassifier, Probe) {
        let probe = Probe {
            builds: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            seen_len: Arc::new(AtomicUsize::new(0)),
        };
        let (builds, calls, seen_len) = (
            probe.builds.clone(),
            probe.calls.clone(),
            probe.seen_len.clone(),
        );
        let classifier = FallbackClassifier::new(
            &FallbackConfig::default(),
            Box::new(move || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Fixed {
                    label,
                    score,
                    calls: calls.clone(),
                    seen_len: seen_len.clone(),
                }) as Box<dyn ZeroShotClassifier>)
            }),
        );
        (classifier, probe)
    }

    #[test]
    fn test_empty_text_makes_no_calls() {
        let (classifier, probe) = fixed("cleanup", 0.9);
        let out = classifier.classify("   ");
        assert_eq!(out, classifier.default_outcome());
        assert_eq!(out.label, "no-classification");
        assert_eq!(out.confidence, 1.0);
        assert_eq!(out.tokens, 0);
        assert_eq!(probe.builds.load(Ordering::SeqCst), 0);
        assert!(!classifier.is_initialized());
    }

    #[test]
    fn test_lazy_init_runs_once() {
        let (classifier, probe) = fixed("refactoring", 0.8);
        let a = classifier.classify("rename modules");
        let b = classifier.classify("move files");
        assert_eq!(a.label, "refactoring");
        assert_eq!(a.method, FallbackMethod::ZeroShot);
        assert_eq!(a.tokens, 7);
        assert_eq!(b.confidence, 0.8);
        assert_eq!(probe.builds.load(Ordering::SeqCst), 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_input_truncated() {
        let (classifier, probe) = fixed("cleanup", 0.5);
        classifier.classify(&"a".repeat(10_000));
        assert_eq!(probe.seen_len.load(Ordering::SeqCst), 4000);
    }

    #[test]
    fn test_failed_init_degrades_and_is_not_retried() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let classifier = FallbackClassifier::new(
            &FallbackConfig::default(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Config("no model".into()))
            }),
        );
        assert_eq!(classifier.classify("text").confidence, 1.0);
        assert_eq!(classifier.classify("more").label, "no-classification");
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_failure_degrades() {
        let classifier = FallbackClassifier::new(
            &FallbackConfig::default(),
            Box::new(|| Ok(Box::new(Failing) as Box<dyn ZeroShotClassifier>)),
        );
        let out = classifier.classify("bump deps");
        assert_eq!(out.method, FallbackMethod::Default);
        assert_eq!(out.confidence, 1.0);
    }

    #[test]
    fn test_unknown_label_degrades() {
        let (classifier, _) = fixed("feature-work", 0.99);
        assert_eq!(classifier.classify("text"), classifier.default_outcome());
    }

    #[test]
    fn test_score_clamped() {
        let (classifier, _) = fixed("cleanup", 1.7);
        assert_eq!(classifier.classify("text").confidence, 1.0);
        let (classifier, _) = fixed("cleanup", f64::NAN);
        assert_eq!(classifier.classify("text").method, FallbackMethod::Default);
    }

    #[test]
    fn test_disabled() {
        let classifier = FallbackClassifier::disabled(&FallbackConfig::default());
        assert_eq!(classifier.classify("bump deps"), classifier.default_outcome());
    }
}
