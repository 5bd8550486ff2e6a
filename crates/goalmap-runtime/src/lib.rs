//! Runtime: checkpointed, cost-tracked batch attribution.
//!
//! `BatchRunner` walks each user's documents per task type, resumes from the
//! stored checkpoint, and persists one `MatchResult` per classified document.

pub mod orchestrator;
pub mod providers;
pub mod sources;
pub mod types;

pub use orchestrator::BatchRunner;
pub use providers::{Providers, Sources, Stores};
pub use sources::{DocumentSource, ObjectiveSource};
pub use types::*;
