//! In-memory store with the same semantics as `SqliteStore`.

use std::collections::BTreeMap;

use goalmap_core::Result;
use parking_lot::Mutex;

use crate::traits::{CheckpointStore, MatchResultStore};
use crate::types::{Checkpoint, MatchResult, StoreStats};

type Key = (String, String);

fn key(a: &str, b: &str) -> Key {
    (a.to_string(), b.to_string())
}

#[derive(Default)]
pub struct MemoryStore {
    checkpoints: Mutex<BTreeMap<Key, Checkpoint>>,
    results: Mutex<BTreeMap<Key, MatchResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        let checkpoints = self.checkpoints.lock();
        let results = self.results.lock();
        let objective_matches = results.values().filter(|r| r.is_objective_match()).count();
        StoreStats {
            checkpoints: checkpoints.len(),
            completed_checkpoints: checkpoints.values().filter(|c| c.is_completed()).count(),
            match_results: results.len(),
            objective_matches,
            fallback_results: results.len() - objective_matches,
            total_cost_usd: results.values().map(|r| r.cost_usd).sum(),
        }
    }
}

impl CheckpointStore for MemoryStore {
    fn load_checkpoint(&self, user: &str, task_type: &str) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.lock().get(&key(user, task_type)).cloned())
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.checkpoints.lock().insert(
            key(&checkpoint.user, &checkpoint.task_type),
            checkpoint.clone(),
        );
        Ok(())
    }

    fn delete_checkpoint(&self, user: &str, task_type: &str) -> Result<bool> {
        Ok(self.checkpoints.lock().remove(&key(user, task_type)).is_some())
    }

    fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        Ok(self.checkpoints.lock().values().cloned().collect())
    }
}

impl MatchResultStore for MemoryStore {
    fn has_result(&self, user: &str, document_id: &str) -> Result<bool> {
        Ok(self.results.lock().contains_key(&key(user, document_id)))
    }

    fn get_result(&self, user: &str, document_id: &str) -> Result<Option<MatchResult>> {
        Ok(self.results.lock().get(&key(user, document_id)).cloned())
    }

    fn put_result(&self, result: &MatchResult) -> Result<()> {
        self.results
            .lock()
            .insert(key(&result.user, &result.document_id), result.clone());
        Ok(())
    }

    fn list_results(&self, user: &str) -> Result<Vec<MatchResult>> {
        Ok(self
            .results
            .lock()
            .iter()
            .filter(|((u, _), _)| u == user)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    #[test]
    fn test_memory_store_semantics() {
        let store = MemoryStore::new();
        let mut cp = Checkpoint::new("alice", "authored");
        cp.current_row = 2;
        store.save_checkpoint(&cp).unwrap();
        assert_eq!(store.load_checkpoint("alice", "authored").unwrap(), Some(cp));
        assert!(store.load_checkpoint("alice", "reviewer").unwrap().is_none());

        let result = MatchResult {
            user: "alice".into(),
            document_id: "pr-2".into(),
            outcome: MatchOutcome::FallbackCategory {
                label: "refactoring".into(),
                confidence: 0.4,
            },
            method: MatchMethod::ZeroShot,
            tokens: 0,
            cost_usd: 0.0,
            candidate_filter: CandidateFilter::None,
            created_at: 0,
        };
        store.put_result(&result).unwrap();
        assert!(store.has_result("alice", "pr-2").unwrap());
        assert_eq!(store.list_results("alice").unwrap(), vec![result]);
        assert!(store.list_results("bob").unwrap().is_empty());

        let stats = store.stats();
        assert_eq!(stats.fallback_results, 1);
        assert!(store.delete_checkpoint("alice", "authored").unwrap());
    }
}
