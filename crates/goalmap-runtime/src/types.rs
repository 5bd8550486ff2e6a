//! Runtime types.

use goalmap_store::{CheckpointStatus, MatchMethod, MatchResult};
use serde::Serialize;

/// Outcome of one (user, task_type) unit in one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_type: String,
    pub total_documents: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub status: CheckpointStatus,
    /// Newly persisted results.
    pub classified: usize,
    pub objective_matches: usize,
    pub fallbacks: usize,
    pub errors: usize,
    pub skipped: usize,
    /// Documents whose text was not available yet.
    pub unavailable: usize,
    pub tokens: usize,
    pub cost_usd: f64,
    /// Stopped early because the per-user cap was used up.
    pub cap_reached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskReport {
    pub fn new(task_type: &str, total_documents: usize, start_row: usize, status: CheckpointStatus) -> Self {
        Self {
            task_type: task_type.to_string(),
            total_documents,
            start_row,
            end_row: start_row,
            status,
            classified: 0,
            objective_matches: 0,
            fallbacks: 0,
            errors: 0,
            skipped: 0,
            unavailable: 0,
            tokens: 0,
            cost_usd: 0.0,
            cap_reached: false,
            error: None,
        }
    }

    /// Count a newly persisted result.
    pub fn record(&mut self, result: &MatchResult) {
        self.classified += 1;
        if result.is_objective_match() {
            self.objective_matches += 1;
        } else if result.method == MatchMethod::Error {
            self.errors += 1;
        } else {
            self.fallbacks += 1;
        }
        self.tokens += result.tokens;
        self.cost_usd += result.cost_usd;
    }
}

/// Per-user outcome.
#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user: String,
    pub tasks: Vec<TaskReport>,
    /// Set when the user was skipped (e.g. no objectives).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
    /// Tokens and cost of building the objective catalog.
    pub catalog_tokens: usize,
    pub catalog_cost_usd: f64,
}

impl UserReport {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            tasks: Vec::new(),
            skipped_reason: None,
            catalog_tokens: 0,
            catalog_cost_usd: 0.0,
        }
    }

    pub fn classified(&self) -> usize {
        self.tasks.iter().map(|t| t.classified).sum()
    }

    pub fn cost_usd(&self) -> f64 {
        self.catalog_cost_usd + self.tasks.iter().map(|t| t.cost_usd).sum::<f64>()
    }

    pub fn tokens(&self) -> usize {
        self.catalog_tokens + self.tasks.iter().map(|t| t.tokens).sum::<usize>()
    }
}

/// Outcome of one runner invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub users: Vec<UserReport>,
}

impl RunReport {
    fn tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.users.iter().flat_map(|u| u.tasks.iter())
    }

    pub fn classified(&self) -> usize {
        self.tasks().map(|t| t.classified).sum()
    }

    pub fn objective_matches(&self) -> usize {
        self.tasks().map(|t| t.objective_matches).sum()
    }

    pub fn fallbacks(&self) -> usize {
        self.tasks().map(|t| t.fallbacks).sum()
    }

    pub fn errors(&self) -> usize {
        self.tasks().map(|t| t.errors).sum()
    }

    pub fn skipped(&self) -> usize {
        self.tasks().map(|t| t.skipped).sum()
    }

    pub fn tokens(&self) -> usize {
        self.users.iter().map(|u| u.tokens()).sum()
    }

    pub fn cost_usd(&self) -> f64 {
        self.users.iter().map(|u| u.cost_usd()).sum()
    }

    /// Whether every reported task is completed.
    pub fn all_completed(&self) -> bool {
        self.tasks().all(|t| t.status == CheckpointStatus::Completed)
    }
}
