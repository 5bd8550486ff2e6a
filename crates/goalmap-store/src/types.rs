//! Data types for match results and checkpoints.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Objective reference carried by a match, self-contained for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveRef {
    pub id: String,
    /// Position in the user's catalog.
    pub index: usize,
    pub text: String,
}

/// What a document was attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "classification_type", rename_all = "snake_case")]
pub enum MatchOutcome {
    ObjectiveMatch {
        objective: ObjectiveRef,
        confidence: f64,
        margin: f64,
    },
    FallbackCategory {
        label: String,
        confidence: f64,
    },
}

impl MatchOutcome {
    pub fn classification_type(&self) -> &'static str {
        match self {
            MatchOutcome::ObjectiveMatch { .. } => "objective_match",
            MatchOutcome::FallbackCategory { .. } => "fallback_category",
        }
    }
}

/// How a result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Objective match, embedding similarity.
    Embedding,
    /// Objective match, TF-IDF similarity.
    Tfidf,
    /// Fallback label from the zero-shot classifier.
    ZeroShot,
    /// Deterministic default label.
    Default,
    /// Provider failure; low-confidence default label.
    Error,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Embedding => "embedding",
            MatchMethod::Tfidf => "tfidf",
            MatchMethod::ZeroShot => "zero_shot",
            MatchMethod::Default => "default",
            MatchMethod::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "embedding" => Some(MatchMethod::Embedding),
            "tfidf" => Some(MatchMethod::Tfidf),
            "zero_shot" => Some(MatchMethod::ZeroShot),
            "default" => Some(MatchMethod::Default),
            "error" => Some(MatchMethod::Error),
            _ => None,
        }
    }
}

/// Whether acronym pruning narrowed the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateFilter {
    Acronym,
    #[default]
    None,
}

impl CandidateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateFilter::Acronym => "acronym",
            CandidateFilter::None => "none",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "acronym" => CandidateFilter::Acronym,
            _ => CandidateFilter::None,
        }
    }
}

/// One persisted classification, keyed by (user, document_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub user: String,
    pub document_id: String,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
    pub method: MatchMethod,
    pub tokens: usize,
    pub cost_usd: f64,
    pub candidate_filter: CandidateFilter,
    pub created_at: i64,
}

impl MatchResult {
    pub fn confidence(&self) -> f64 {
        match &self.outcome {
            MatchOutcome::ObjectiveMatch { confidence, .. }
            | MatchOutcome::FallbackCategory { confidence, .. } => *confidence,
        }
    }

    pub fn is_objective_match(&self) -> bool {
        matches!(self.outcome, MatchOutcome::ObjectiveMatch { .. })
    }

    /// Objective id for matches, category label for fallbacks.
    pub fn target(&self) -> &str {
        match &self.outcome {
            MatchOutcome::ObjectiveMatch { objective, .. } => &objective.id,
            MatchOutcome::FallbackCategory { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::NotStarted => "not_started",
            CheckpointStatus::InProgress => "in_progress",
            CheckpointStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(CheckpointStatus::NotStarted),
            "in_progress" => Some(CheckpointStatus::InProgress),
            "completed" => Some(CheckpointStatus::Completed),
            _ => None,
        }
    }
}

/// Progress marker for one (user, task_type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub user: String,
    pub task_type: String,
    pub status: CheckpointStatus,
    /// Index of the next unprocessed document.
    pub current_row: usize,
    pub matched_count: usize,
    pub skipped_count: usize,
    pub cumulative_cost_usd: f64,
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn new(user: &str, task_type: &str) -> Self {
        Self {
            user: user.to_string(),
            task_type: task_type.to_string(),
            status: CheckpointStatus::NotStarted,
            current_row: 0,
            matched_count: 0,
            skipped_count: 0,
            cumulative_cost_usd: 0.0,
            updated_at: now_millis(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CheckpointStatus::Completed
    }
}

/// Store-level statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub checkpoints: usize,
    pub completed_checkpoints: usize,
    pub match_results: usize,
    pub objective_matches: usize,
    pub fallback_results: usize,
    pub total_cost_usd: f64,
}
