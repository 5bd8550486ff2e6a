//! Configuration and data directory management.
//!
//! Everything tunable about a run lives in [`GoalMapConfig`]: scoring weights and
//! thresholds, the embedding backend, chunking windows, document caps, the fallback
//! label set and batch limits. Values are read from `goalmap.json` in the data
//! directory; any missing section falls back to its defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Paths to all GoalMap data locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database holding checkpoints and match results (`data/goalmap.db`).
    pub db_file: PathBuf,
    /// Per-user objective lists (`data/objectives/`).
    pub objectives: PathBuf,
    /// Per-(task type, user) document listings (`data/tasks/`).
    pub tasks: PathBuf,
    /// Downloaded document fragments (`data/documents/`).
    pub documents: PathBuf,
    /// Users to process (`data/users.json`).
    pub users_file: PathBuf,
    /// Run configuration (`data/goalmap.json`).
    pub config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db_file: root.join("goalmap.db"),
            objectives: root.join("objectives"),
            tasks: root.join("tasks"),
            documents: root.join("documents"),
            users_file: root.join("users.json"),
            config_file: root.join("goalmap.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.objectives)?;
        std::fs::create_dir_all(&self.tasks)?;
        std::fs::create_dir_all(&self.documents)?;
        Ok(())
    }
}

/// Hybrid score weights and the accept/reject gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub embed_weight: f64,
    pub lexical_weight: f64,
    pub acronym_boost_per_match: f64,
    pub acronym_boost_max: f64,
    pub score_threshold: f64,
    pub margin_threshold: f64,
    /// Acronyms longer than this are ignored by the candidate pruner.
    pub strong_acronym_max_len: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            embed_weight: 0.88,
            lexical_weight: 0.12,
            acronym_boost_per_match: 0.08,
            acronym_boost_max: 0.24,
            score_threshold: 0.33,
            margin_threshold: 0.03,
            strong_acronym_max_len: 8,
        }
    }
}

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI when an API key is available, otherwise disabled.
    Auto,
    #[serde(rename = "openai")]
    OpenAi,
    Disabled,
}

/// Embedding backend settings and pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    /// Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// USD per one million input tokens, keyed by model name.
    pub pricing: BTreeMap<String, f64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let mut pricing = BTreeMap::new();
        pricing.insert("text-embedding-3-large".to_string(), 0.13);
        pricing.insert("text-embedding-3-small".to_string(), 0.02);
        pricing.insert("text-embedding-ada-002".to_string(), 0.10);
        Self {
            provider: EmbeddingProviderKind::Auto,
            model: "text-embedding-3-large".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            max_retries: 3,
            pricing,
        }
    }
}

impl EmbeddingConfig {
    /// Whether an embedding backend should be constructed at all.
    pub fn is_enabled(&self) -> bool {
        match self.provider {
            EmbeddingProviderKind::Disabled => false,
            EmbeddingProviderKind::OpenAi => true,
            EmbeddingProviderKind::Auto => self.api_key.as_deref().is_some_and(|k| !k.is_empty()),
        }
    }
}

/// Long-document splitting for the embedding strategy (all sizes in tokens).
///
/// Only takes effect when `features.max_document_chars` is raised above
/// `max_tokens * chars_per_token`; the default document cap stays below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Documents estimated above this are chunked.
    pub max_tokens: usize,
    pub chunk_tokens: usize,
    pub overlap_tokens: usize,
    pub max_chunks: usize,
    /// Characters per token used by the estimator.
    pub chars_per_token: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            chunk_tokens: 7000,
            overlap_tokens: 300,
            max_chunks: 8,
            chars_per_token: 4,
        }
    }
}

/// Character caps applied while composing document text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureLimits {
    pub max_document_chars: usize,
    pub max_fragment_chars: usize,
    pub max_diff_chars: usize,
}

impl Default for FeatureLimits {
    fn default() -> Self {
        Self {
            max_document_chars: 20_000,
            max_fragment_chars: 5_000,
            max_diff_chars: 800,
        }
    }
}

/// Zero-shot backend used when the decision gate rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    /// Embedding-backed when an embedder exists, keyword lexicon otherwise.
    Auto,
    Embedding,
    Keyword,
    /// Always answer with the default label.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub strategy: FallbackStrategy,
    pub labels: Vec<String>,
    pub default_label: String,
    pub max_chars: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            strategy: FallbackStrategy::Auto,
            labels: vec![
                "cleanup".to_string(),
                "dependency-updates".to_string(),
                "refactoring".to_string(),
                "no-classification".to_string(),
            ],
            default_label: "no-classification".to_string(),
            max_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub task_types: Vec<String>,
    /// New classifications allowed per user per invocation.
    pub max_documents_per_user: usize,
    pub force_recalculate: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            task_types: vec!["authored".to_string(), "reviewer".to_string()],
            max_documents_per_user: 10,
            force_recalculate: false,
        }
    }
}

/// Top-level GoalMap configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalMapConfig {
    pub scoring: ScoringConfig,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub features: FeatureLimits,
    pub fallback: FallbackConfig,
    pub batch: BatchConfig,
}

impl GoalMapConfig {
    /// Load `config_path` if present, apply environment overrides, validate.
    pub fn load(config_path: &Path) -> Result<Self> {
        let mut config: GoalMapConfig = match std::fs::read_to_string(config_path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", config_path.display());
                GoalMapConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables as fallback for secrets, and as override for run flags.
    pub fn apply_env(&mut self) {
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if let Ok(v) = std::env::var("GOALMAP_FORCE_RECALCULATE") {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.batch.force_recalculate = true,
                "0" | "false" | "no" => self.batch.force_recalculate = false,
                other => warn!("Ignoring GOALMAP_FORCE_RECALCULATE={}", other),
            }
        }
    }

    /// Reject settings that would make scoring or chunking meaningless.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        for (name, v) in [
            ("embed_weight", s.embed_weight),
            ("lexical_weight", s.lexical_weight),
            ("acronym_boost_per_match", s.acronym_boost_per_match),
            ("acronym_boost_max", s.acronym_boost_max),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::Config(format!("scoring.{} must be >= 0, got {}", name, v)));
            }
        }
        for (name, v) in [
            ("score_threshold", s.score_threshold),
            ("margin_threshold", s.margin_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("scoring.{} must be in [0, 1], got {}", name, v)));
            }
        }

        let c = &self.chunking;
        if c.chunk_tokens == 0 || c.max_chunks == 0 || c.chars_per_token == 0 {
            return Err(Error::Config(
                "chunking.chunk_tokens, max_chunks and chars_per_token must be > 0".into(),
            ));
        }
        if c.overlap_tokens >= c.chunk_tokens {
            return Err(Error::Config(format!(
                "chunking.overlap_tokens ({}) must be smaller than chunk_tokens ({})",
                c.overlap_tokens, c.chunk_tokens
            )));
        }

        let f = &self.fallback;
        if f.labels.is_empty() {
            return Err(Error::Config("fallback.labels must not be empty".into()));
        }
        if f.default_label.trim().is_empty() {
            return Err(Error::Config("fallback.default_label must not be empty".into()));
        }
        if self.batch.task_types.is_empty() {
            return Err(Error::Config("batch.task_types must not be empty".into()));
        }
        Ok(())
    }

    /// USD per million tokens for `model`.
    ///
    /// Unknown models are priced by size class: names containing `large` use the
    /// large-model rate, everything else the small-model rate.
    pub fn price_per_million(&self, model: &str) -> f64 {
        price_per_million(&self.embedding.pricing, model)
    }
}

/// Pricing lookup shared by the config and the usage meter.
pub fn price_per_million(pricing: &BTreeMap<String, f64>, model: &str) -> f64 {
    if let Some(p) = pricing.get(model) {
        return *p;
    }
    if model.contains("large") {
        0.13
    } else {
        0.02
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GoalMapConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scoring.embed_weight, 0.88);
        assert_eq!(config.scoring.lexical_weight, 0.12);
        assert_eq!(config.batch.task_types, vec!["authored", "reviewer"]);
        assert_eq!(config.fallback.default_label, "no-classification");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let raw = r#"{ "scoring": { "score_threshold": 0.5 }, "batch": { "force_recalculate": true } }"#;
        let config: GoalMapConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.scoring.score_threshold, 0.5);
        assert_eq!(config.scoring.margin_threshold, 0.03);
        assert!(config.batch.force_recalculate);
        assert_eq!(config.batch.max_documents_per_user, 10);
        assert_eq!(config.chunking.max_tokens, 8000);
    }

    #[test]
    fn test_validate_rejects_bad_overlap() {
        let mut config = GoalMapConfig::default();
        config.chunking.overlap_tokens = config.chunking.chunk_tokens;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = GoalMapConfig::default();
        config.scoring.lexical_weight = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = GoalMapConfig::default();
        config.scoring.margin_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pricing_lookup() {
        let config = GoalMapConfig::default();
        assert_eq!(config.price_per_million("text-embedding-3-small"), 0.02);
        assert_eq!(config.price_per_million("text-embedding-3-large"), 0.13);
        assert_eq!(config.price_per_million("custom-large-v2"), 0.13);
        assert_eq!(config.price_per_million("mini"), 0.02);
    }

    #[test]
    fn test_embedding_enabled() {
        let mut e = EmbeddingConfig::default();
        assert!(!e.is_enabled());
        e.api_key = Some("sk-test".into());
        assert!(e.is_enabled());
        e.provider = EmbeddingProviderKind::Disabled;
        assert!(!e.is_enabled());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goalmap.json");
        std::fs::write(&path, r#"{ "fallback": { "max_chars": 1000 } }"#).unwrap();
        let config = GoalMapConfig::load(&path).unwrap();
        assert_eq!(config.fallback.max_chars, 1000);
        assert_eq!(config.fallback.labels.len(), 4);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GoalMapConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.scoring.score_threshold, 0.33);
    }

    #[test]
    fn test_data_paths_created() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        assert!(paths.objectives.is_dir());
        assert!(paths.tasks.is_dir());
        assert!(paths.documents.is_dir());
        assert_eq!(paths.db_file, dir.path().join("goalmap.db"));
    }
}
