//! Storage interfaces consumed by the batch runner.

use goalmap_core::Result;

use crate::types::{Checkpoint, MatchResult};

/// Durable progress markers keyed by (user, task_type).
///
/// Saved separately from the match result of the same document. If a process
/// dies between the two writes, the resumed run finds the result and counts
/// the document in `skipped_count` rather than `matched_count`.
pub trait CheckpointStore: Send + Sync {
    /// `Ok(None)` when no checkpoint exists; `Err(CorruptCheckpoint)` when the
    /// stored record cannot be interpreted.
    fn load_checkpoint(&self, user: &str, task_type: &str) -> Result<Option<Checkpoint>>;

    /// Insert or replace.
    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Returns whether a checkpoint was removed.
    fn delete_checkpoint(&self, user: &str, task_type: &str) -> Result<bool>;

    /// All readable checkpoints, ordered by (user, task_type).
    fn list_checkpoints(&self) -> Result<Vec<Checkpoint>>;
}

/// Match results keyed by (user, document_id). Presence is the skip signal.
pub trait MatchResultStore: Send + Sync {
    fn has_result(&self, user: &str, document_id: &str) -> Result<bool>;

    fn get_result(&self, user: &str, document_id: &str) -> Result<Option<MatchResult>>;

    /// Insert or overwrite.
    fn put_result(&self, result: &MatchResult) -> Result<()>;

    /// Results for `user`, ordered by document id.
    fn list_results(&self, user: &str) -> Result<Vec<MatchResult>>;
}
