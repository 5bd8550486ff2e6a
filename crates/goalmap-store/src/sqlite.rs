//! SQLite-backed checkpoint and match-result store.
//!
//! Every write is a single UPSERT so a crash between documents loses at most
//! the document in flight.

use std::path::{Path, PathBuf};

use goalmap_core::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::schema::SCHEMA_SQL;
use crate::traits::{CheckpointStore, MatchResultStore};
use crate::types::*;

/// SQLite store for checkpoints and match results.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the database file at `db_file`.
    pub fn open(db_file: impl AsRef<Path>) -> Result<Self> {
        let db_file = db_file.as_ref();
        if let Some(parent) = db_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
        }

        let conn = Self::create_connection(db_file)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_file.to_path_buf(),
        };

        let stats = store.stats()?;
        info!(
            "SqliteStore initialized: {} checkpoints, {} match results, path={}",
            stats.checkpoints,
            stats.match_results,
            store.db_path.display()
        );

        Ok(store)
    }

    /// In-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Counts across both tables.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |sql: &str| -> Result<usize> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n.max(0) as usize)
                .map_err(|e| Error::Database(e.to_string()))
        };

        let checkpoints = count("SELECT COUNT(*) FROM checkpoints")?;
        let completed_checkpoints =
            count("SELECT COUNT(*) FROM checkpoints WHERE status = 'completed'")?;
        let match_results = count("SELECT COUNT(*) FROM match_results")?;
        let objective_matches = count(
            "SELECT COUNT(*) FROM match_results WHERE classification_type = 'objective_match'",
        )?;
        let total_cost_usd: f64 = conn
            .query_row(
                "SELECT COALESCE(SUM(cost_usd), 0.0) FROM match_results",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(StoreStats {
            checkpoints,
            completed_checkpoints,
            match_results,
            objective_matches,
            fallback_results: match_results - objective_matches,
            total_cost_usd,
        })
    }

    // ---------------------------------------------------------------
    // Row mapping
    // ---------------------------------------------------------------

    fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCheckpoint> {
        Ok(RawCheckpoint {
            user: row.get("user")?,
            task_type: row.get("task_type")?,
            status: row.get("status")?,
            current_row: row.get("current_row")?,
            matched_count: row.get("matched_count")?,
            skipped_count: row.get("skipped_count")?,
            cumulative_cost_usd: row.get("cumulative_cost_usd")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_match_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMatchResult> {
        Ok(RawMatchResult {
            user: row.get("user")?,
            document_id: row.get("document_id")?,
            classification_type: row.get("classification_type")?,
            objective_id: row.get("objective_id")?,
            objective_index: row.get("objective_index")?,
            objective_text: row.get("objective_text")?,
            category_label: row.get("category_label")?,
            confidence: row.get("confidence")?,
            margin: row.get("margin")?,
            method: row.get("method")?,
            tokens: row.get("tokens")?,
            cost_usd: row.get("cost_usd")?,
            candidate_filter: row.get("candidate_filter")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Checkpoint row before validation.
struct RawCheckpoint {
    user: String,
    task_type: String,
    status: String,
    current_row: i64,
    matched_count: i64,
    skipped_count: i64,
    cumulative_cost_usd: f64,
    updated_at: i64,
}

impl RawCheckpoint {
    fn validate(self) -> Result<Checkpoint> {
        let corrupt = |reason: String| Error::CorruptCheckpoint {
            user: self.user.clone(),
            task_type: self.task_type.clone(),
            reason,
        };
        let status = CheckpointStatus::parse(&self.status)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", self.status)))?;
        let count = |name: &str, v: i64| {
            usize::try_from(v).map_err(|_| corrupt(format!("negative {}: {}", name, v)))
        };
        let current_row = count("current_row", self.current_row)?;
        let matched_count = count("matched_count", self.matched_count)?;
        let skipped_count = count("skipped_count", self.skipped_count)?;
        if !self.cumulative_cost_usd.is_finite() || self.cumulative_cost_usd < 0.0 {
            return Err(corrupt(format!("invalid cost {}", self.cumulative_cost_usd)));
        }

        Ok(Checkpoint {
            status,
            current_row,
            matched_count,
            skipped_count,
            cumulative_cost_usd: self.cumulative_cost_usd,
            updated_at: self.updated_at,
            user: self.user,
            task_type: self.task_type,
        })
    }
}

/// Match-result row before validation.
struct RawMatchResult {
    user: String,
    document_id: String,
    classification_type: String,
    objective_id: Option<String>,
    objective_index: Option<i64>,
    objective_text: Option<String>,
    category_label: Option<String>,
    confidence: f64,
    margin: Option<f64>,
    method: String,
    tokens: i64,
    cost_usd: f64,
    candidate_filter: String,
    created_at: i64,
}

impl RawMatchResult {
    fn validate(self) -> Result<MatchResult> {
        let invalid = |what: &str| {
            Error::Storage(format!(
                "Invalid match result {}/{}: {}",
                self.user, self.document_id, what
            ))
        };
        let method = MatchMethod::parse(&self.method).ok_or_else(|| invalid("method"))?;
        let outcome = match self.classification_type.as_str() {
            "objective_match" => MatchOutcome::ObjectiveMatch {
                objective: ObjectiveRef {
                    id: self.objective_id.clone().ok_or_else(|| invalid("objective_id"))?,
                    index: self
                        .objective_index
                        .and_then(|i| usize::try_from(i).ok())
                        .ok_or_else(|| invalid("objective_index"))?,
                    text: self.objective_text.clone().unwrap_or_default(),
                },
                confidence: self.confidence,
                margin: self.margin.unwrap_or(0.0),
            },
            "fallback_category" => MatchOutcome::FallbackCategory {
                label: self.category_label.clone().ok_or_else(|| invalid("category_label"))?,
                confidence: self.confidence,
            },
            _ => return Err(invalid("classification_type")),
        };

        Ok(MatchResult {
            outcome,
            method,
            tokens: self.tokens.max(0) as usize,
            cost_usd: self.cost_usd,
            candidate_filter: CandidateFilter::parse(&self.candidate_filter),
            created_at: self.created_at,
            user: self.user,
            document_id: self.document_id,
        })
    }
}

impl CheckpointStore for SqliteStore {
    fn load_checkpoint(&self, user: &str, task_type: &str) -> Result<Option<Checkpoint>> {
        let conn = self.conn.lock();
        let raw = conn
            .prepare_cached("SELECT * FROM checkpoints WHERE user = ?1 AND task_type = ?2")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![user, task_type], Self::row_to_checkpoint)
            .optional()
            .map_err(|e| Error::CorruptCheckpoint {
                user: user.to_string(),
                task_type: task_type.to_string(),
                reason: e.to_string(),
            })?;
        raw.map(RawCheckpoint::validate).transpose()
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO checkpoints
                (user, task_type, status, current_row, matched_count, skipped_count,
                 cumulative_cost_usd, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user, task_type) DO UPDATE SET
                status = excluded.status,
                current_row = excluded.current_row,
                matched_count = excluded.matched_count,
                skipped_count = excluded.skipped_count,
                cumulative_cost_usd = excluded.cumulative_cost_usd,
                updated_at = excluded.updated_at",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            checkpoint.user,
            checkpoint.task_type,
            checkpoint.status.as_str(),
            checkpoint.current_row as i64,
            checkpoint.matched_count as i64,
            checkpoint.skipped_count as i64,
            checkpoint.cumulative_cost_usd,
            checkpoint.updated_at,
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    fn delete_checkpoint(&self, user: &str, task_type: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "DELETE FROM checkpoints WHERE user = ?1 AND task_type = ?2",
                params![user, task_type],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM checkpoints ORDER BY user, task_type")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_checkpoint)
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut checkpoints = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| Error::Database(e.to_string()))?;
            match raw.validate() {
                Ok(cp) => checkpoints.push(cp),
                Err(e) => tracing::warn!("Skipping unreadable checkpoint: {}", e),
            }
        }
        Ok(checkpoints)
    }
}

impl MatchResultStore for SqliteStore {
    fn has_result(&self, user: &str, document_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .prepare_cached("SELECT 1 FROM match_results WHERE user = ?1 AND document_id = ?2")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![user, document_id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    fn get_result(&self, user: &str, document_id: &str) -> Result<Option<MatchResult>> {
        let conn = self.conn.lock();
        let raw = conn
            .prepare_cached("SELECT * FROM match_results WHERE user = ?1 AND document_id = ?2")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![user, document_id], Self::row_to_match_result)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        raw.map(RawMatchResult::validate).transpose()
    }

    fn put_result(&self, result: &MatchResult) -> Result<()> {
        let (objective_id, objective_index, objective_text, category_label, confidence, margin) =
            match &result.outcome {
                MatchOutcome::ObjectiveMatch {
                    objective,
                    confidence,
                    margin,
                } => (
                    Some(objective.id.as_str()),
                    Some(objective.index as i64),
                    Some(objective.text.as_str()),
                    None,
                    *confidence,
                    Some(*margin),
                ),
                MatchOutcome::FallbackCategory { label, confidence } => {
                    (None, None, None, Some(label.as_str()), *confidence, None)
                }
            };

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO match_results
                (user, document_id, classification_type, objective_id, objective_index,
                 objective_text, category_label, confidence, margin, method, tokens,
                 cost_usd, candidate_filter, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(user, document_id) DO UPDATE SET
                classification_type = excluded.classification_type,
                objective_id = excluded.objective_id,
                objective_index = excluded.objective_index,
                objective_text = excluded.objective_text,
                category_label = excluded.category_label,
                confidence = excluded.confidence,
                margin = excluded.margin,
                method = excluded.method,
                tokens = excluded.tokens,
                cost_usd = excluded.cost_usd,
                candidate_filter = excluded.candidate_filter,
                created_at = excluded.created_at",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            result.user,
            result.document_id,
            result.outcome.classification_type(),
            objective_id,
            objective_index,
            objective_text,
            category_label,
            confidence,
            margin,
            result.method.as_str(),
            result.tokens as i64,
            result.cost_usd,
            result.candidate_filter.as_str(),
            result.created_at,
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    fn list_results(&self, user: &str) -> Result<Vec<MatchResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM match_results WHERE user = ?1 ORDER BY document_id")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![user], Self::row_to_match_result)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.map(|row| {
            row.map_err(|e| Error::Database(e.to_string()))
                .and_then(RawMatchResult::validate)
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("goalmap.db")).unwrap();
        (store, dir)
    }

    fn objective_match(user: &str, doc: &str) -> MatchResult {
        MatchResult {
            user: user.into(),
            document_id: doc.into(),
            outcome: MatchOutcome::ObjectiveMatch {
                objective: ObjectiveRef {
                    id: "alice-okr-0".into(),
                    index: 0,
                    text: "ESR migration | Roll out ESR".into(),
                },
                confidence: 0.71,
                margin: 0.2,
            },
            method: MatchMethod::Embedding,
            tokens: 120,
            cost_usd: 0.0000156,
            candidate_filter: CandidateFilter::Acronym,
            created_at: now_millis(),
        }
    }

    #[test]
    fn test_checkpoint_roundtrip_and_upsert() {
        let (store, _dir) = test_store();
        assert!(store.load_checkpoint("alice", "authored").unwrap().is_none());

        let mut cp = Checkpoint::new("alice", "authored");
        cp.status = CheckpointStatus::InProgress;
        cp.current_row = 3;
        cp.matched_count = 2;
        cp.skipped_count = 1;
        cp.cumulative_cost_usd = 0.5;
        store.save_checkpoint(&cp).unwrap();

        cp.current_row = 4;
        store.save_checkpoint(&cp).unwrap();

        let loaded = store.load_checkpoint("alice", "authored").unwrap().unwrap();
        assert_eq!(loaded, cp);
        assert_eq!(store.list_checkpoints().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_checkpoint() {
        let (store, _dir) = test_store();
        store.save_checkpoint(&Checkpoint::new("bob", "reviewer")).unwrap();
        assert!(store.delete_checkpoint("bob", "reviewer").unwrap());
        assert!(!store.delete_checkpoint("bob", "reviewer").unwrap());
        assert!(store.load_checkpoint("bob", "reviewer").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_status_reported() {
        let (store, _dir) = test_store();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO checkpoints (user, task_type, status, updated_at)
                 VALUES ('carol', 'authored', 'half-done', 0)",
                [],
            )
            .unwrap();
        let err = store.load_checkpoint("carol", "authored").unwrap_err();
        assert!(matches!(err, Error::CorruptCheckpoint { .. }));
        // Listing skips it instead of failing.
        assert!(store.list_checkpoints().unwrap().is_empty());
    }

    #[test]
    fn test_negative_row_is_corrupt() {
        let (store, _dir) = test_store();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO checkpoints (user, task_type, status, current_row, updated_at)
                 VALUES ('dave', 'authored', 'in_progress', -2, 0)",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.load_checkpoint("dave", "authored"),
            Err(Error::CorruptCheckpoint { .. })
        ));
    }

    #[test]
    fn test_match_result_roundtrip() {
        let (store, _dir) = test_store();
        let result = objective_match("alice", "pr-7");
        assert!(!store.has_result("alice", "pr-7").unwrap());
        store.put_result(&result).unwrap();
        assert!(store.has_result("alice", "pr-7").unwrap());
        assert!(!store.has_result("bob", "pr-7").unwrap());
        assert_eq!(store.get_result("alice", "pr-7").unwrap().unwrap(), result);
    }

    #[test]
    fn test_put_result_overwrites() {
        let (store, _dir) = test_store();
        store.put_result(&objective_match("alice", "pr-7")).unwrap();

        let fallback = MatchResult {
            outcome: MatchOutcome::FallbackCategory {
                label: "cleanup".into(),
                confidence: 0.6,
            },
            method: MatchMethod::ZeroShot,
            tokens: 0,
            cost_usd: 0.0,
            candidate_filter: CandidateFilter::None,
            ..objective_match("alice", "pr-7")
        };
        store.put_result(&fallback).unwrap();

        let results = store.list_results("alice").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], fallback);
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = test_store();
        store.put_result(&objective_match("alice", "pr-1")).unwrap();
        store.put_result(&objective_match("alice", "pr-2")).unwrap();
        let mut cp = Checkpoint::new("alice", "authored");
        cp.status = CheckpointStatus::Completed;
        store.save_checkpoint(&cp).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.match_results, 2);
        assert_eq!(stats.objective_matches, 2);
        assert_eq!(stats.fallback_results, 0);
        assert_eq!(stats.completed_checkpoints, 1);
        assert!(stats.total_cost_usd > 0.0);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("goalmap.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_checkpoint(&Checkpoint::new("alice", "authored")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.load_checkpoint("alice", "authored").unwrap().is_some());
    }
}
