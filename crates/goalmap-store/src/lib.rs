//! GoalMap Store: checkpoints and match results (SQLite or in-memory).

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CheckpointStore, MatchResultStore};
pub use types::*;
