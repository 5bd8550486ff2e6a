//! JSON file-backed document and objective sources.
//!
//! Layout under the data directory:
//! - `objectives/{user}.json`: array of `{ "id"?, "title", "child_item" }`
//! - `tasks/{task_type}_{user}.json`: ordered array of document ids
//! - `documents/{id}.json`: document fragments; absent until downloaded
//! - `users.json`: array of usernames

use std::path::{Path, PathBuf};

use goalmap_core::{DataPaths, Result};
use goalmap_ingest::DocumentFragments;
use goalmap_resolve::ObjectiveInput;
use goalmap_runtime::{DocumentSource, ObjectiveSource};
use serde::de::DeserializeOwned;
use tracing::debug;

pub struct FileSources {
    paths: DataPaths,
}

impl FileSources {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }

    fn task_path(&self, user: &str, task_type: &str) -> PathBuf {
        self.paths
            .tasks
            .join(format!("{}_{}.json", file_stem(task_type), file_stem(user)))
    }

    fn document_path(&self, document_id: &str) -> PathBuf {
        self.paths.documents.join(format!("{}.json", file_stem(document_id)))
    }

    fn objectives_path(&self, user: &str) -> PathBuf {
        self.paths.objectives.join(format!("{}.json", file_stem(user)))
    }
}

impl DocumentSource for FileSources {
    fn list_documents(&self, user: &str, task_type: &str) -> Result<Vec<String>> {
        Ok(read_json(&self.task_path(user, task_type))?.unwrap_or_default())
    }

    fn document_fragments(&self, document_id: &str) -> Result<Option<DocumentFragments>> {
        read_json(&self.document_path(document_id))
    }
}

impl ObjectiveSource for FileSources {
    fn objectives(&self, user: &str) -> Result<Vec<ObjectiveInput>> {
        Ok(read_json(&self.objectives_path(user))?.unwrap_or_default())
    }
}

/// Users listed in `users.json`; empty when the file is missing.
pub fn load_users(path: &Path) -> Result<Vec<String>> {
    Ok(read_json(path)?.unwrap_or_default())
}

/// Parse a JSON file, `Ok(None)` when it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} not found", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Ids like `org/repo#12` map to one flat file name.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> (tempfile::TempDir, FileSources) {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path()).unwrap();
        (dir, FileSources::new(paths))
    }

    #[test]
    fn test_missing_files_are_empty() {
        let (_dir, sources) = sources();
        assert!(sources.list_documents("alice", "authored").unwrap().is_empty());
        assert!(sources.objectives("alice").unwrap().is_empty());
        assert!(sources.document_fragments("pr-1").unwrap().is_none());
    }

    #[test]
    fn test_reads_layout() {
        let (dir, sources) = sources();
        let root = dir.path();
        std::fs::write(root.join("tasks/authored_alice.json"), r#"["org/repo#2", "org/repo#1"]"#).unwrap();
        std::fs::write(
            root.join("documents/org_repo#2.json"),
            r#"{"title": "Add ESR failover", "diffs": ["+ retry()"]}"#,
        )
        .unwrap();
        std::fs::write(
            root.join("objectives/alice.json"),
            r#"[{"title": "Reliability", "child_item": "ESR failover"}, {"id": "k-2", "title": "", "child_item": "Cost"}]"#,
        )
        .unwrap();

        let docs = sources.list_documents("alice", "authored").unwrap();
        assert_eq!(docs, vec!["org/repo#2", "org/repo#1"]);

        let fragments = sources.document_fragments("org/repo#2").unwrap().unwrap();
        assert_eq!(fragments.title, "Add ESR failover");
        assert_eq!(fragments.diffs.len(), 1);
        assert!(fragments.comments.is_empty());
        assert!(sources.document_fragments("org/repo#1").unwrap().is_none());

        let objectives = sources.objectives("alice").unwrap();
        assert_eq!(objectives.len(), 2);
        assert_eq!(objectives[1].id.as_deref(), Some("k-2"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let (dir, sources) = sources();
        std::fs::write(dir.path().join("objectives/bob.json"), "{not json").unwrap();
        assert!(sources.objectives("bob").is_err());
    }

    #[test]
    fn test_load_users() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        assert!(load_users(&path).unwrap().is_empty());
        std::fs::write(&path, r#"["alice", "bob"]"#).unwrap();
        assert_eq!(load_users(&path).unwrap(), vec!["alice", "bob"]);
    }
}
