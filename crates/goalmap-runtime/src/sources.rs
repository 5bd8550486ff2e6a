//! Document and objective sources consumed by the batch runner.

use goalmap_core::Result;
use goalmap_ingest::DocumentFragments;
use goalmap_resolve::ObjectiveInput;

/// Where documents and their text come from.
pub trait DocumentSource: Send + Sync {
    /// Ordered document ids for (user, task_type). Order must be stable across runs.
    fn list_documents(&self, user: &str, task_type: &str) -> Result<Vec<String>>;

    /// Raw fragments of a document; `Ok(None)` when the text is not available yet.
    fn document_fragments(&self, document_id: &str) -> Result<Option<DocumentFragments>>;
}

/// Where a user's objectives come from.
pub trait ObjectiveSource: Send + Sync {
    /// Ordered objective rows for `user`; empty when the user has none.
    fn objectives(&self, user: &str) -> Result<Vec<ObjectiveInput>>;
}
