//! Database schema SQL.

/// Checkpoints and match results, one row per key.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoints (
    user TEXT NOT NULL,
    task_type TEXT NOT NULL,
    status TEXT NOT NULL,
    current_row INTEGER NOT NULL DEFAULT 0,
    matched_count INTEGER NOT NULL DEFAULT 0,
    skipped_count INTEGER NOT NULL DEFAULT 0,
    cumulative_cost_usd REAL NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user, task_type)
);

CREATE TABLE IF NOT EXISTS match_results (
    user TEXT NOT NULL,
    document_id TEXT NOT NULL,
    classification_type TEXT NOT NULL,
    objective_id TEXT,
    objective_index INTEGER,
    objective_text TEXT,
    category_label TEXT,
    confidence REAL NOT NULL,
    margin REAL,
    method TEXT NOT NULL,
    tokens INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0,
    candidate_filter TEXT NOT NULL DEFAULT 'none',
    created_at INTEGER NOT NULL,
    PRIMARY KEY (user, document_id)
);

CREATE INDEX IF NOT EXISTS idx_match_results_user ON match_results(user);
CREATE INDEX IF NOT EXISTS idx_match_results_type ON match_results(classification_type);
"#;
